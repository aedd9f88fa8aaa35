//! Latest-metadata work unit.

use std::sync::Arc;

use crate::executor::{RetryPolicy, Work, WorkError};
use crate::provider::{LatestInfo, MetadataSource};
use crate::BoxFuture;

/// Work unit querying the latest available image timestamp.
///
/// Runs through the same executor as tile units, so a flaky metadata
/// endpoint gets the same attempt budget and cooldown.
pub struct MetadataWork {
    source: Arc<dyn MetadataSource>,
    retry_policy: RetryPolicy,
}

impl MetadataWork {
    pub fn new(source: Arc<dyn MetadataSource>, retry_policy: RetryPolicy) -> Self {
        Self {
            source,
            retry_policy,
        }
    }
}

impl Work for MetadataWork {
    type Output = LatestInfo;

    fn name(&self) -> &str {
        "latest metadata"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy.clone()
    }

    fn execute(&self) -> BoxFuture<'_, Result<LatestInfo, WorkError>> {
        Box::pin(async move { Ok(self.source.latest().await?) })
    }
}
