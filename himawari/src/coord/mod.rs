//! Tile grid coordinates
//!
//! A full-disk image is served as an `N×N` grid of square tiles, where `N` is
//! the [`Level`]. This module provides the grid types, the image timestamp,
//! and the [`TileIdentity`] that keys both remote fetches and the local cache.

mod types;

pub use types::{
    CoordError, GridCoord, GridCoords, ImageTimestamp, Level, TileIdentity, TileLayer, MAX_TILE_SIZE,
    TILE_SIZE,
};
