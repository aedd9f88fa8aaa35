//! Image acquisition pipeline.
//!
//! ```text
//! FetchingMetadata → CheckingExistingOutput → FetchingTiles → Assembling → Persisting → Done
//!                              │                                                        ▲
//!                              └──────────── output already present ────────────────────┘
//! ```
//!
//! Metadata and tiles are fetched through the executor: one [`MetadataWork`]
//! for the timestamp, then one [`TileWork`] per grid cell submitted to a
//! single [`Manager`]. Assembly starts only after every tile unit is terminal
//! and all of them succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::error::{AcquireError, TileFailure};
use super::output::{image_file_name, output_exists, persist_png};
use super::state::{AcquisitionRun, AcquisitionState};
use crate::assemble::Canvas;
use crate::cache::{Cache, DiskCache};
use crate::coord::{ImageTimestamp, Level, TileIdentity};
use crate::executor::{Manager, ProgressCallback, RetryPolicy};
use crate::provider::{
    HimawariProvider, LatestInfo, MetadataSource, ReqwestClient, SourceConfig, TileSource,
};
use crate::tasks::{DecodedTile, MetadataWork, TileWork};

/// Default per-attempt time budget, enforced on top of the HTTP timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;

/// Default maximum number of concurrent HTTP requests.
pub const DEFAULT_HTTP_PARALLEL: usize = 32;

/// Subdirectory of the cache directory holding per-tile cache entries.
pub const TILE_CACHE_SUBDIR: &str = "tiles";

/// Default cache and output directory, `<tmp>/himawari`.
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("himawari")
}

/// Tuning for an [`ImageAcquirer`].
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Directory receiving composed images and overlays.
    pub output_dir: PathBuf,
    /// Attempt budget for every work unit.
    pub retry_policy: RetryPolicy,
    /// Per-attempt time budget. `None` disables it.
    pub attempt_timeout: Option<Duration>,
    /// Maximum concurrent HTTP requests across tile units. 0 means unlimited.
    pub http_parallel: usize,
    /// Delete per-tile cache entries after an image is persisted.
    pub purge_tiles: bool,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            output_dir: default_cache_dir(),
            retry_policy: RetryPolicy::standard(),
            attempt_timeout: Some(Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS)),
            http_parallel: DEFAULT_HTTP_PARALLEL,
            purge_tiles: true,
        }
    }
}

impl AcquireConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_http_parallel(mut self, parallel: usize) -> Self {
        self.http_parallel = parallel;
        self
    }

    pub fn with_purge_tiles(mut self, purge: bool) -> Self {
        self.purge_tiles = purge;
        self
    }
}

/// Runs acquisitions against explicit collaborators.
///
/// An acquirer holds no per-run state; concurrent acquisitions for different
/// levels or timestamps are independent.
pub struct ImageAcquirer {
    metadata: Arc<dyn MetadataSource>,
    tiles: Arc<dyn TileSource>,
    cache: Arc<dyn Cache>,
    config: AcquireConfig,
    progress: Option<ProgressCallback>,
}

impl ImageAcquirer {
    /// Creates an acquirer from its collaborators.
    ///
    /// # Arguments
    ///
    /// * `metadata` - Source of the latest image timestamp
    /// * `tiles` - Source of tile payloads; its tile size sets the canvas geometry
    /// * `cache` - Tile payload cache
    /// * `config` - Output directory, retry and concurrency settings
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        tiles: Arc<dyn TileSource>,
        cache: Arc<dyn Cache>,
        config: AcquireConfig,
    ) -> Self {
        Self {
            metadata,
            tiles,
            cache,
            config,
            progress: None,
        }
    }

    /// Acquirer over the Himawari archive with a disk cache under `cache_dir`.
    ///
    /// Composed images land in `cache_dir`; tile entries in
    /// `cache_dir/tiles`.
    pub fn himawari(
        cache_dir: &Path,
        source: SourceConfig,
        http_timeout: Duration,
        config: AcquireConfig,
    ) -> Result<Self, AcquireError> {
        let client = ReqwestClient::with_timeout(http_timeout)?;
        let provider = Arc::new(HimawariProvider::new(client, source));
        let cache = Arc::new(DiskCache::new(cache_dir.join(TILE_CACHE_SUBDIR)));

        Ok(Self::new(
            provider.clone(),
            provider,
            cache,
            config.with_output_dir(cache_dir),
        ))
    }

    /// Reports tile progress as `(completed, total)`.
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    /// Path an image for `(level, timestamp)` is persisted to.
    pub fn image_path(&self, level: Level, timestamp: ImageTimestamp) -> PathBuf {
        self.config
            .output_dir
            .join(image_file_name(level, timestamp))
    }

    /// Queries the latest image timestamp through the executor.
    pub async fn latest_timestamp(&self) -> Result<LatestInfo, AcquireError> {
        let mut manager = Manager::new().with_attempt_timeout(self.config.attempt_timeout);
        manager.submit(MetadataWork::new(
            Arc::clone(&self.metadata),
            self.config.retry_policy.clone(),
        ));

        let report = manager.await_all().await;
        let panicked = report.panicked() > 0;
        let outcome = report.into_outcomes().into_iter().next();

        match outcome {
            Some(outcome) if outcome.is_success() => match outcome.output {
                Some(latest) => Ok(latest),
                None => Err(AcquireError::MetadataUnavailable {
                    attempts: outcome.attempts,
                    reason: "no output".to_string(),
                }),
            },
            Some(outcome) => Err(AcquireError::MetadataUnavailable {
                attempts: outcome.attempts,
                reason: outcome
                    .last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no attempts allowed".to_string()),
            }),
            None => Err(AcquireError::MetadataUnavailable {
                attempts: 0,
                reason: if panicked {
                    "metadata task panicked".to_string()
                } else {
                    "metadata task lost".to_string()
                },
            }),
        }
    }

    /// Acquires the latest image at `level`.
    ///
    /// Returns the existing output without fetching any tile when the latest
    /// image was already persisted.
    pub async fn acquire_image(&self, level: Level) -> Result<PathBuf, AcquireError> {
        let mut run = AcquisitionRun::new("image", level, AcquisitionState::FetchingMetadata);
        let latest = self.latest_timestamp().await?;
        info!(level = %level, timestamp = %latest.timestamp, "Latest image");

        run.advance(AcquisitionState::CheckingExistingOutput);
        self.acquire_into(run, level, latest.timestamp).await
    }

    /// Acquires the image captured at `timestamp`.
    ///
    /// Issues no network call at all when the output already exists.
    pub async fn acquire_image_at(
        &self,
        level: Level,
        timestamp: ImageTimestamp,
    ) -> Result<PathBuf, AcquireError> {
        let run = AcquisitionRun::new("image", level, AcquisitionState::CheckingExistingOutput);
        self.acquire_into(run, level, timestamp).await
    }

    async fn acquire_into(
        &self,
        mut run: AcquisitionRun,
        level: Level,
        timestamp: ImageTimestamp,
    ) -> Result<PathBuf, AcquireError> {
        let path = self.image_path(level, timestamp);
        if output_exists(&path).await {
            info!(path = %path.display(), "Image already present");
            run.advance(AcquisitionState::Done);
            return Ok(path);
        }

        run.advance(AcquisitionState::FetchingTiles);
        let identities: Vec<TileIdentity> = level
            .coords()
            .map(|coord| TileIdentity::imagery(level, coord, timestamp))
            .collect();
        let tiles = self.fetch_tiles(&identities).await?;

        run.advance(AcquisitionState::Assembling);
        let image = self
            .assemble(level, tiles, |coord| {
                TileIdentity::imagery(level, coord, timestamp)
            })
            .await?;

        run.advance(AcquisitionState::Persisting);
        persist_png(image, &path).await?;
        if self.config.purge_tiles {
            self.purge(&identities).await;
        }

        run.advance(AcquisitionState::Done);
        info!(path = %path.display(), "Image acquired");
        Ok(path)
    }

    /// Fetches every identity through one manager and returns the decoded
    /// tiles, or the full list of failed cells.
    pub(crate) async fn fetch_tiles(
        &self,
        identities: &[TileIdentity],
    ) -> Result<Vec<DecodedTile>, AcquireError> {
        let http_limit =
            (self.config.http_parallel > 0).then(|| Arc::new(Semaphore::new(self.config.http_parallel)));

        let mut manager = Manager::new()
            .with_attempt_timeout(self.config.attempt_timeout)
            .with_progress(self.progress.clone());
        for &tile in identities {
            manager.submit(
                TileWork::new(
                    tile,
                    Arc::clone(&self.tiles),
                    Arc::clone(&self.cache),
                    self.config.retry_policy.clone(),
                )
                .with_http_limit(http_limit.clone()),
            );
        }

        let report = manager.await_all().await;
        if !report.all_succeeded() {
            let failures: Vec<TileFailure> = report
                .failures()
                .map(|outcome| TileFailure {
                    coord: outcome.work.tile().coord,
                    attempts: outcome.attempts,
                    error: outcome.last_error.as_ref().map(ToString::to_string),
                })
                .collect();
            for failure in &failures {
                warn!(tile = %failure.coord, attempts = failure.attempts, "Tile unavailable");
            }
            return Err(AcquireError::TileFetchFailed {
                total: identities.len(),
                failures,
                lost: report.panicked(),
            });
        }

        Ok(report
            .into_outcomes()
            .into_iter()
            .filter_map(|outcome| outcome.output)
            .collect())
    }

    /// Composes tiles into one image on the blocking pool.
    ///
    /// A tile rejected by the canvas has its cache entry invalidated, so the
    /// next run fetches it again.
    pub(crate) async fn assemble(
        &self,
        level: Level,
        tiles: Vec<DecodedTile>,
        identity: impl Fn(crate::coord::GridCoord) -> TileIdentity,
    ) -> Result<image::RgbaImage, AcquireError> {
        let tile_size = self.tiles.tile_size();
        let result = tokio::task::spawn_blocking(move || {
            let mut canvas = Canvas::new(level, tile_size);
            canvas.assemble(&tiles)?;
            canvas.finish()
        })
        .await
        .map_err(|e| AcquireError::Assembly(e.to_string()))?;

        match result {
            Ok(image) => Ok(image),
            Err(e) => match e.coord() {
                Some(coord) => {
                    let key = identity(coord).cache_key();
                    warn!(key = %key, error = %e, "Invalidating rejected tile");
                    self.cache.delete(&key).await?;
                    Err(AcquireError::DecodeFailed {
                        coord,
                        reason: e.to_string(),
                    })
                }
                None => Err(AcquireError::Assembly(e.to_string())),
            },
        }
    }

    async fn purge(&self, identities: &[TileIdentity]) {
        let mut removed = 0usize;
        for tile in identities {
            let key = tile.cache_key();
            match self.cache.delete(&key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to purge tile"),
            }
        }
        info!(removed, "Purged tile cache entries");
    }

    pub(crate) fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }
}
