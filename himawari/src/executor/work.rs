//! Work trait and related types.
//!
//! A work unit is one retryable operation: fetch the latest metadata, fetch a
//! tile, or fetch an overlay tile. Units know how to execute themselves and
//! how many attempts they are allowed; the [`Worker`](super::Worker) owns the
//! retry loop around them.
//!
//! # Example
//!
//! ```ignore
//! use himawari::executor::{Work, WorkError, RetryPolicy};
//! use himawari::BoxFuture;
//!
//! struct Ping;
//!
//! impl Work for Ping {
//!     type Output = ();
//!
//!     fn name(&self) -> &str { "ping" }
//!     fn retry_policy(&self) -> RetryPolicy { RetryPolicy::fixed(3, Duration::ZERO) }
//!
//!     fn execute(&self) -> BoxFuture<'_, Result<(), WorkError>> {
//!         Box::pin(async { Ok(()) })
//!     }
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use super::policy::RetryPolicy;
use crate::cache::ServiceCacheError;
use crate::provider::ProviderError;
use crate::BoxFuture;

/// A single retryable unit of work.
///
/// `execute` must be safe to call repeatedly: every call starts from scratch
/// and leaves the unit ready for another attempt. Errors are returned, never
/// swallowed; the worker decides whether another attempt follows.
pub trait Work: Send + Sync + 'static {
    /// Value produced by a successful attempt.
    type Output: Send + 'static;

    /// Short name for logging, e.g. `tile 8d_20160102034000_1_2`.
    fn name(&self) -> &str;

    /// Retry policy for this unit.
    ///
    /// The default is a single attempt.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::None
    }

    /// Maximum number of attempts, including the first.
    fn max_attempts(&self) -> u32 {
        self.retry_policy().max_attempts()
    }

    /// Runs one attempt.
    fn execute(&self) -> BoxFuture<'_, Result<Self::Output, WorkError>>;
}

/// Error returned by a single attempt of a work unit.
#[derive(Debug, Error)]
pub enum WorkError {
    /// Remote source failed (network, status code, malformed response).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Payload was retrieved but is not a valid image.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Local cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] ServiceCacheError),

    /// The attempt exceeded its time budget.
    #[error("attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl WorkError {
    /// Returns true if the payload arrived but could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<image::ImageError> for WorkError {
    fn from(e: image::ImageError) -> Self {
        WorkError::Decode(e.to_string())
    }
}
