//! Tile fetch work unit.
//!
//! [`TileWork`] resolves one grid cell to a decoded RGBA image. Each attempt:
//!
//! 1. reads the cache entry for the tile's identity and returns it if it
//!    decodes; an entry that does not decode is deleted before falling through
//! 2. downloads the payload, holding an HTTP permit only for the request
//! 3. decodes the payload and writes it to the cache
//!
//! The same unit serves imagery tiles and coastline overlay tiles; the
//! [`TileLayer`](crate::coord::TileLayer) of its identity selects which.

use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::coord::{GridCoord, TileIdentity};
use crate::executor::{RetryPolicy, Work, WorkError};
use crate::provider::{ProviderError, TileSource};
use crate::BoxFuture;

/// A decoded tile, ready for assembly.
#[derive(Debug, Clone)]
pub struct DecodedTile {
    pub coord: GridCoord,
    pub image: RgbaImage,
}

/// Work unit fetching a single tile.
pub struct TileWork {
    tile: TileIdentity,
    name: String,
    source: Arc<dyn TileSource>,
    cache: Arc<dyn Cache>,
    http_limit: Option<Arc<Semaphore>>,
    retry_policy: RetryPolicy,
}

impl TileWork {
    /// Creates a tile unit.
    ///
    /// # Arguments
    ///
    /// * `tile` - Identity of the tile; also its cache key
    /// * `source` - Remote tile source
    /// * `cache` - Tile payload cache
    /// * `retry_policy` - Attempt budget and cooldown
    pub fn new(
        tile: TileIdentity,
        source: Arc<dyn TileSource>,
        cache: Arc<dyn Cache>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            name: format!("tile {}", tile.cache_key()),
            tile,
            source,
            cache,
            http_limit: None,
            retry_policy,
        }
    }

    /// Shares an HTTP concurrency limit with other units.
    pub fn with_http_limit(mut self, limit: Option<Arc<Semaphore>>) -> Self {
        self.http_limit = limit;
        self
    }

    pub fn tile(&self) -> TileIdentity {
        self.tile
    }

    async fn from_cache(&self, key: &str) -> Result<Option<RgbaImage>, WorkError> {
        let Some(bytes) = self.cache.get(key).await? else {
            return Ok(None);
        };

        match decode_tile(bytes).await {
            Ok(image) => {
                debug!(key = %key, "Tile cache hit");
                Ok(Some(image))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached tile does not decode, invalidating");
                self.cache.delete(key).await?;
                Ok(None)
            }
        }
    }

    async fn download(&self) -> Result<Vec<u8>, WorkError> {
        let _permit = match &self.http_limit {
            Some(limit) => Some(
                limit
                    .acquire()
                    .await
                    .map_err(|e| ProviderError::Http(e.to_string()))?,
            ),
            None => None,
        };
        Ok(self.source.fetch_tile(self.tile).await?)
    }
}

/// Decodes an encoded tile payload on the blocking pool.
pub async fn decode_tile(bytes: Vec<u8>) -> Result<RgbaImage, WorkError> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).map(|img| img.to_rgba8()))
        .await
        .map_err(|e| WorkError::Decode(e.to_string()))?
        .map_err(WorkError::from)
}

impl Work for TileWork {
    type Output = DecodedTile;

    fn name(&self) -> &str {
        &self.name
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy.clone()
    }

    fn execute(&self) -> BoxFuture<'_, Result<DecodedTile, WorkError>> {
        Box::pin(async move {
            let key = self.tile.cache_key();

            if let Some(image) = self.from_cache(&key).await? {
                return Ok(DecodedTile {
                    coord: self.tile.coord,
                    image,
                });
            }

            let bytes = self.download().await?;
            let image = decode_tile(bytes.clone()).await?;
            self.cache.set(&key, bytes).await?;

            Ok(DecodedTile {
                coord: self.tile.coord,
                image,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Level;
    use crate::executor::Worker;
    use crate::testing::{encode_png, pattern_tile, stamp, MemoryCache, MockTileSource};
    use std::time::Duration;

    const SIZE: u32 = 8;

    fn identity() -> TileIdentity {
        TileIdentity::imagery(
            Level::L4,
            GridCoord { x: 1, y: 2 },
            stamp("2016-01-02 03:40:00"),
        )
    }

    fn unit(source: Arc<MockTileSource>, cache: Arc<MemoryCache>) -> TileWork {
        TileWork::new(
            identity(),
            source,
            cache,
            RetryPolicy::fixed(3, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_fetch_then_cache() {
        let source = Arc::new(MockTileSource::new(SIZE));
        let cache = Arc::new(MemoryCache::default());
        let work = unit(Arc::clone(&source), Arc::clone(&cache));

        let tile = work.execute().await.unwrap();

        assert_eq!(tile.coord, GridCoord { x: 1, y: 2 });
        assert_eq!(tile.image, pattern_tile(SIZE, tile.coord));
        assert_eq!(source.calls(), 1);
        assert!(cache.has("4d_20160102034000_1_2"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let source = Arc::new(MockTileSource::new(SIZE));
        let cache = Arc::new(MemoryCache::default());
        let coord = GridCoord { x: 1, y: 2 };
        cache.insert("4d_20160102034000_1_2", encode_png(&pattern_tile(SIZE, coord)));

        let tile = unit(Arc::clone(&source), cache).execute().await.unwrap();

        assert_eq!(tile.image, pattern_tile(SIZE, coord));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_invalidated_and_refetched() {
        let source = Arc::new(MockTileSource::new(SIZE));
        let cache = Arc::new(MemoryCache::default());
        cache.insert("4d_20160102034000_1_2", b"not a png".to_vec());

        let tile = unit(Arc::clone(&source), Arc::clone(&cache))
            .execute()
            .await
            .unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(tile.image, pattern_tile(SIZE, tile.coord));
        let stored = cache.entries.lock().unwrap()["4d_20160102034000_1_2"].clone();
        assert_ne!(stored, b"not a png".to_vec());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_decode_error_and_not_cached() {
        let mut source = MockTileSource::new(SIZE);
        source
            .overrides
            .insert(GridCoord { x: 1, y: 2 }, b"<html>busy</html>".to_vec());
        let cache = Arc::new(MemoryCache::default());

        let err = unit(Arc::new(source), Arc::clone(&cache))
            .execute()
            .await
            .unwrap_err();

        assert!(err.is_decode());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_failing_source_exhausts_through_worker() {
        let mut source = MockTileSource::new(SIZE);
        source.failing.insert(GridCoord { x: 1, y: 2 });
        let source = Arc::new(source);

        let outcome = Worker::new(unit(Arc::clone(&source), Arc::new(MemoryCache::default())))
            .run()
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(source.calls(), 3);
        assert!(matches!(
            outcome.last_error,
            Some(WorkError::Provider(ProviderError::Status { code: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_http_limit_released_after_fetch() {
        let source = Arc::new(MockTileSource::new(SIZE));
        let limit = Arc::new(Semaphore::new(1));

        for _ in 0..3 {
            let work = unit(Arc::clone(&source), Arc::new(MemoryCache::default()))
                .with_http_limit(Some(Arc::clone(&limit)));
            work.execute().await.unwrap();
        }

        assert_eq!(limit.available_permits(), 1);
        assert_eq!(source.calls(), 3);
    }
}
