//! Integration tests for the acquisition pipeline.
//!
//! These tests drive [`ImageAcquirer`] end to end against an in-process
//! archive and a real on-disk tile cache:
//! - composition at every detail level
//! - re-runs served from existing output
//! - corrupt cache entries replaced by fresh fetches
//! - coastline overlay compositing
//!
//! Run with: `cargo test --test acquisition_integration`

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use himawari::cache::{Cache, DiskCache};
use himawari::coord::{GridCoord, ImageTimestamp, Level, TileIdentity, TileLayer};
use himawari::executor::RetryPolicy;
use himawari::pipeline::TILE_CACHE_SUBDIR;
use himawari::provider::{LatestInfo, MetadataSource, ProviderError, TileSource};
use himawari::{merge_overlay, AcquireConfig, AcquireError, BoxFuture, ImageAcquirer};

const TILE_SIZE: u32 = 3;
const LATEST: &str = "2016-01-19 07:40:00";

// ============================================================================
// In-process archive
// ============================================================================

/// Archive serving generated imagery and coastline tiles.
struct Archive {
    tile_size: u32,
    latest: Option<ImageTimestamp>,
    failing: HashSet<GridCoord>,
    metadata_calls: AtomicUsize,
    tile_calls: AtomicUsize,
}

impl Archive {
    fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            latest: Some(ImageTimestamp::parse(LATEST).unwrap()),
            failing: HashSet::new(),
            metadata_calls: AtomicUsize::new(0),
            tile_calls: AtomicUsize::new(0),
        }
    }

    fn offline_metadata(mut self) -> Self {
        self.latest = None;
        self
    }

    fn failing(mut self, coord: GridCoord) -> Self {
        self.failing.insert(coord);
        self
    }

    fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    fn tile_calls(&self) -> usize {
        self.tile_calls.load(Ordering::SeqCst)
    }
}

impl MetadataSource for Archive {
    fn latest(&self) -> BoxFuture<'_, Result<LatestInfo, ProviderError>> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.latest {
            Some(timestamp) => Ok(LatestInfo {
                timestamp,
                file: "PI_H08_20160119_0740_TRC_FLDK_R10_PGPFD.png".to_string(),
            }),
            None => Err(ProviderError::Timeout("latest.json".to_string())),
        };
        Box::pin(async move { result })
    }
}

impl TileSource for Archive {
    fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn fetch_tile(&self, tile: TileIdentity) -> BoxFuture<'_, Result<Vec<u8>, ProviderError>> {
        self.tile_calls.fetch_add(1, Ordering::SeqCst);
        let size = self.tile_size;
        let failing = self.failing.contains(&tile.coord);
        Box::pin(async move {
            if failing {
                return Err(ProviderError::Status {
                    code: 503,
                    url: tile.to_string(),
                });
            }
            let image = match tile.layer {
                TileLayer::Imagery(_) => imagery_tile(size, tile.coord),
                TileLayer::Coastline => coastline_tile(size),
            };
            Ok(encode_png(&image))
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn imagery_pixel(coord: GridCoord, px: u32, py: u32) -> Rgba<u8> {
    Rgba([
        (coord.x * 11 + 3) as u8,
        (coord.y * 11 + 5) as u8,
        (px * 5 + py * 2) as u8,
        255,
    ])
}

fn imagery_tile(size: u32, coord: GridCoord) -> RgbaImage {
    RgbaImage::from_fn(size, size, |px, py| imagery_pixel(coord, px, py))
}

fn coastline_tile(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |px, py| {
        if px == py {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Full image computed pixel by pixel, without the canvas.
fn reference_image(level: Level, size: u32) -> RgbaImage {
    let edge = level.image_edge(size);
    RgbaImage::from_fn(edge, edge, |x, y| {
        let coord = GridCoord {
            x: x / size,
            y: y / size,
        };
        imagery_pixel(coord, x % size, y % size)
    })
}

fn config(dir: &Path) -> AcquireConfig {
    AcquireConfig::default()
        .with_output_dir(dir)
        .with_retry_policy(RetryPolicy::fixed(2, Duration::ZERO))
}

fn acquirer(archive: &Arc<Archive>, dir: &Path) -> (ImageAcquirer, Arc<DiskCache>) {
    let cache = Arc::new(DiskCache::new(dir.join(TILE_CACHE_SUBDIR)));
    let acquirer = ImageAcquirer::new(
        archive.clone(),
        archive.clone(),
        cache.clone(),
        config(dir),
    );
    (acquirer, cache)
}

fn open(path: &Path) -> RgbaImage {
    image::open(path).unwrap().to_rgba8()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_every_level_matches_reference() {
    let temp = TempDir::new().unwrap();
    let archive = Arc::new(Archive::new(TILE_SIZE));
    let (acquirer, _) = acquirer(&archive, temp.path());

    for level in Level::ALL {
        let path = acquirer.acquire_image(level).await.unwrap();

        let image = open(&path);
        let expected = reference_image(level, TILE_SIZE);
        assert_eq!(image.dimensions(), expected.dimensions(), "level {level}");
        assert!(image == expected, "level {level} differs from reference");
    }

    let total: usize = Level::ALL.iter().map(|level| level.tile_count()).sum();
    assert_eq!(archive.tile_calls(), total);
}

#[tokio::test]
async fn test_rerun_issues_no_tile_requests() {
    let temp = TempDir::new().unwrap();
    let archive = Arc::new(Archive::new(TILE_SIZE));
    let (acquirer, _) = acquirer(&archive, temp.path());

    let first = acquirer.acquire_image(Level::L4).await.unwrap();
    let tile_calls = archive.tile_calls();
    assert_eq!(tile_calls, 16);

    let second = acquirer.acquire_image(Level::L4).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(archive.tile_calls(), tile_calls);
    assert_eq!(archive.metadata_calls(), 2);

    let timestamp = ImageTimestamp::parse(LATEST).unwrap();
    let third = acquirer.acquire_image_at(Level::L4, timestamp).await.unwrap();
    assert_eq!(third, first);
    assert_eq!(archive.metadata_calls(), 2);
    assert_eq!(archive.tile_calls(), tile_calls);
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_refetched() {
    let temp = TempDir::new().unwrap();
    let archive = Arc::new(Archive::new(TILE_SIZE));
    let (acquirer, cache) = acquirer(&archive, temp.path());
    let timestamp = ImageTimestamp::parse(LATEST).unwrap();

    let corrupt = TileIdentity::imagery(Level::L4, GridCoord { x: 2, y: 1 }, timestamp);
    cache
        .set(&corrupt.cache_key(), b"definitely not a png".to_vec())
        .await
        .unwrap();

    let path = acquirer.acquire_image_at(Level::L4, timestamp).await.unwrap();

    assert!(open(&path) == reference_image(Level::L4, TILE_SIZE));
    assert_eq!(archive.tile_calls(), 16);
    assert!(!cache.contains(&corrupt.cache_key()).await.unwrap());
}

#[tokio::test]
async fn test_tile_failure_leaves_no_output() {
    let temp = TempDir::new().unwrap();
    let archive = Arc::new(Archive::new(TILE_SIZE).failing(GridCoord { x: 3, y: 0 }));
    let (acquirer, _) = acquirer(&archive, temp.path());

    let err = acquirer.acquire_image(Level::L4).await.unwrap_err();

    match err {
        AcquireError::TileFetchFailed {
            total, failures, ..
        } => {
            assert_eq!(total, 16);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].coord, GridCoord { x: 3, y: 0 });
            assert_eq!(failures[0].attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let timestamp = ImageTimestamp::parse(LATEST).unwrap();
    assert!(!acquirer.image_path(Level::L4, timestamp).exists());
}

#[tokio::test]
async fn test_metadata_unavailable() {
    let temp = TempDir::new().unwrap();
    let archive = Arc::new(Archive::new(TILE_SIZE).offline_metadata());
    let (acquirer, _) = acquirer(&archive, temp.path());

    let err = acquirer.acquire_image(Level::L8).await.unwrap_err();

    assert!(matches!(
        err,
        AcquireError::MetadataUnavailable { attempts: 2, .. }
    ));
    assert_eq!(archive.metadata_calls(), 2);
    assert_eq!(archive.tile_calls(), 0);
}

#[tokio::test]
async fn test_overlay_merge() {
    let temp = TempDir::new().unwrap();
    let archive = Arc::new(Archive::new(20));
    let (acquirer, _) = acquirer(&archive, temp.path());

    let base = acquirer.acquire_image(Level::L4).await.unwrap();
    let overlay = acquirer.acquire_overlay(Level::L4, None).await.unwrap();
    assert_eq!(overlay.color, None);

    let merged = merge_overlay(&base, &overlay).await.unwrap();

    let base_image = open(&base);
    let merged_image = open(&merged);
    assert_eq!(merged_image.dimensions(), (80, 80));
    assert_eq!(*merged_image.get_pixel(10, 10), Rgba([255, 0, 0, 255]));
    assert_eq!(merged_image.get_pixel(10, 11), base_image.get_pixel(10, 11));
}
