//! Grid types shared by the acquisition pipeline.

use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Edge length of a single tile in pixels as served by the Himawari archive.
pub const TILE_SIZE: u32 = 550;

/// Largest accepted tile edge. Keeps [`Level::image_edge`] within `u32` at
/// every level.
pub const MAX_TILE_SIZE: u32 = 4096;

/// Errors produced when validating grid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Level is not one of the supported grid sizes.
    #[error("unsupported level {0}, expected one of 4, 8, 16, 20")]
    InvalidLevel(u32),

    /// Coordinate falls outside the grid for its level.
    #[error("coordinate ({x}, {y}) is outside a {level}x{level} grid")]
    OutOfRange { x: u32, y: u32, level: u32 },

    /// Timestamp string could not be parsed.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Grid edge length in tiles.
///
/// The archive publishes each full-disk image at four resolutions. A level of
/// `n` means the image is split into `n × n` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    L4,
    L8,
    L16,
    L20,
}

impl Level {
    /// All supported levels, smallest first.
    pub const ALL: [Level; 4] = [Level::L4, Level::L8, Level::L16, Level::L20];

    /// Number of tiles along one edge.
    pub fn tiles_per_edge(self) -> u32 {
        match self {
            Level::L4 => 4,
            Level::L8 => 8,
            Level::L16 => 16,
            Level::L20 => 20,
        }
    }

    /// Total number of tiles in the grid.
    pub fn tile_count(self) -> usize {
        let n = self.tiles_per_edge() as usize;
        n * n
    }

    /// Edge length in pixels of the composed image for the given tile size.
    ///
    /// `tile_size` must not exceed [`MAX_TILE_SIZE`].
    pub fn image_edge(self, tile_size: u32) -> u32 {
        self.tiles_per_edge() * tile_size
    }

    /// Iterates every coordinate of the grid in row-major order.
    pub fn coords(self) -> GridCoords {
        GridCoords {
            level: self.tiles_per_edge(),
            next: 0,
        }
    }

    /// Returns the coordinate at `(x, y)` if it lies inside this grid.
    pub fn coord(self, x: u32, y: u32) -> Result<GridCoord, CoordError> {
        let level = self.tiles_per_edge();
        if x >= level || y >= level {
            return Err(CoordError::OutOfRange { x, y, level });
        }
        Ok(GridCoord { x, y })
    }
}

impl TryFrom<u32> for Level {
    type Error = CoordError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Level::L4),
            8 => Ok(Level::L8),
            16 => Ok(Level::L16),
            20 => Ok(Level::L20),
            other => Err(CoordError::InvalidLevel(other)),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tiles_per_edge())
    }
}

/// One cell of the tile grid. `x` grows eastward, `y` southward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridCoord {
    pub x: u32,
    pub y: u32,
}

impl GridCoord {
    /// Pixel offset of this cell's top-left corner in the composed image.
    pub fn pixel_offset(&self, tile_size: u32) -> (u32, u32) {
        (self.x * tile_size, self.y * tile_size)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Iterator over all coordinates of a grid, row-major.
#[derive(Debug, Clone)]
pub struct GridCoords {
    level: u32,
    next: u32,
}

impl Iterator for GridCoords {
    type Item = GridCoord;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.level * self.level;
        if self.next >= total {
            return None;
        }
        let coord = GridCoord {
            x: self.next % self.level,
            y: self.next / self.level,
        };
        self.next += 1;
        Some(coord)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.level * self.level - self.next.min(self.level * self.level)) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridCoords {}

/// Capture time of a full-disk image, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageTimestamp(NaiveDateTime);

impl ImageTimestamp {
    /// Format used by the archive's `latest.json` endpoint.
    pub const METADATA_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn new(time: NaiveDateTime) -> Self {
        Self(time)
    }

    /// Parses the `YYYY-MM-DD HH:MM:SS` form served by the metadata endpoint.
    pub fn parse(s: &str) -> Result<Self, CoordError> {
        NaiveDateTime::parse_from_str(s, Self::METADATA_FORMAT)
            .map(Self)
            .map_err(|_| CoordError::InvalidTimestamp(s.to_string()))
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// `YYYY/MM/DD/HHMMSS`, the path segment used in tile URLs.
    pub fn url_segment(&self) -> String {
        self.0.format("%Y/%m/%d/%H%M%S").to_string()
    }

    /// `YYYYMMDDHHMMSS`, used in cache keys and output file names.
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d%H%M%S").to_string()
    }
}

impl fmt::Display for ImageTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::METADATA_FORMAT))
    }
}

/// Which image layer a tile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileLayer {
    /// Satellite imagery captured at a specific time.
    Imagery(ImageTimestamp),
    /// Timestamp-invariant coastline outline.
    Coastline,
}

/// Identity of one tile: level, cell, and layer.
///
/// The archive is append-only per timestamp, so two equal identities always
/// resolve to byte-identical content. This makes the identity usable both as
/// the remote fetch key and the local cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileIdentity {
    pub level: Level,
    pub coord: GridCoord,
    pub layer: TileLayer,
}

impl TileIdentity {
    pub fn imagery(level: Level, coord: GridCoord, timestamp: ImageTimestamp) -> Self {
        Self {
            level,
            coord,
            layer: TileLayer::Imagery(timestamp),
        }
    }

    pub fn coastline(level: Level, coord: GridCoord) -> Self {
        Self {
            level,
            coord,
            layer: TileLayer::Coastline,
        }
    }

    /// Deterministic cache key.
    ///
    /// Format: `{level}d_{YYYYMMDDHHMMSS}_{x}_{y}` for imagery and
    /// `coastline_{level}d_{x}_{y}` for the coastline layer.
    pub fn cache_key(&self) -> String {
        match self.layer {
            TileLayer::Imagery(ts) => format!(
                "{}d_{}_{}_{}",
                self.level,
                ts.compact(),
                self.coord.x,
                self.coord.y
            ),
            TileLayer::Coastline => format!(
                "coastline_{}d_{}_{}",
                self.level, self.coord.x, self.coord.y
            ),
        }
    }
}

impl fmt::Display for TileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}
