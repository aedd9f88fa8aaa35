//! In-process collaborators shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::cache::{BoxFuture, Cache, ServiceCacheError};
use crate::coord::{GridCoord, ImageTimestamp, TileIdentity, TileLayer};
use crate::provider::{LatestInfo, MetadataSource, ProviderError, TileSource};

pub(crate) fn stamp(s: &str) -> ImageTimestamp {
    ImageTimestamp::parse(s).unwrap()
}

pub(crate) fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Imagery tile whose every pixel encodes its cell and position.
pub(crate) fn pattern_tile(size: u32, coord: GridCoord) -> RgbaImage {
    RgbaImage::from_fn(size, size, |px, py| {
        Rgba([
            (coord.x * 12 + 1) as u8,
            (coord.y * 12 + 1) as u8,
            (px * 7 + py * 3) as u8,
            255,
        ])
    })
}

/// Coastline tile: transparent except for its diagonal.
pub(crate) fn coastline_tile(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |px, py| {
        if px == py {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Tile source generating tiles on the fly.
#[derive(Default)]
pub(crate) struct MockTileSource {
    pub tile_size: u32,
    pub failing: HashSet<GridCoord>,
    pub overrides: HashMap<GridCoord, Vec<u8>>,
    pub calls: AtomicUsize,
}

impl MockTileSource {
    pub(crate) fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TileSource for MockTileSource {
    fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn fetch_tile(&self, tile: TileIdentity) -> BoxFuture<'_, Result<Vec<u8>, ProviderError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.failing.contains(&tile.coord) {
            Err(ProviderError::Status {
                code: 503,
                url: format!("mock://{}", tile),
            })
        } else if let Some(bytes) = self.overrides.get(&tile.coord) {
            Ok(bytes.clone())
        } else {
            let image = match tile.layer {
                TileLayer::Imagery(_) => pattern_tile(self.tile_size, tile.coord),
                TileLayer::Coastline => coastline_tile(self.tile_size),
            };
            Ok(encode_png(&image))
        };
        Box::pin(async move { result })
    }
}

pub(crate) struct MockMetadataSource {
    pub result: Result<LatestInfo, ProviderError>,
    pub calls: AtomicUsize,
}

impl MockMetadataSource {
    pub(crate) fn at(timestamp: ImageTimestamp) -> Self {
        Self {
            result: Ok(LatestInfo {
                timestamp,
                file: "mock.png".to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            result: Err(ProviderError::Http("connection refused".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetadataSource for MockMetadataSource {
    fn latest(&self) -> BoxFuture<'_, Result<LatestInfo, ProviderError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.clone();
        Box::pin(async move { result })
    }
}

/// Cache backed by a map.
#[derive(Default)]
pub(crate) struct MemoryCache {
    pub entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub(crate) fn insert(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub(crate) fn has(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Cache for MemoryCache {
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        self.insert(key, value);
        Box::pin(async { Ok(()) })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        let value = self.entries.lock().unwrap().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let existed = self.entries.lock().unwrap().remove(key).is_some();
        Box::pin(async move { Ok(existed) })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let present = self.has(key);
        Box::pin(async move { Ok(present) })
    }
}
