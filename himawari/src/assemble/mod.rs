//! Tile assembly
//!
//! Composes decoded tiles into one bitmap. Each cell of the grid maps to a
//! disjoint `tile_size × tile_size` region at pixel offset
//! `(tile_size * x, tile_size * y)`; tiles overwrite their region completely.
//!
//! Concurrent placement goes through [`Canvas::cells`], which hands out one
//! exclusive [`CellRegion`] per cell. A region is consumed by its write, so a
//! cell cannot be written twice through the same split.

mod canvas;

pub use canvas::{Canvas, CellRegion};

use thiserror::Error;

use crate::coord::{GridCoord, Level};

/// Errors produced while placing tiles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    /// Tile is not exactly `tile_size × tile_size`.
    #[error("tile {coord} is {width}x{height}, expected {expected}x{expected}")]
    TileDimensions {
        coord: GridCoord,
        expected: u32,
        width: u32,
        height: u32,
    },

    /// Cell was already written.
    #[error("tile {coord} written twice")]
    AlreadyWritten { coord: GridCoord },

    /// Coordinate lies outside the grid.
    #[error("tile {coord} is outside a level {level} grid")]
    OutOfRange { coord: GridCoord, level: Level },

    /// Some cells were never written.
    #[error("{} of the grid's tiles were never placed", .missing.len())]
    Incomplete { missing: Vec<GridCoord> },
}

impl AssembleError {
    /// Cell the error refers to, if it concerns a single cell.
    pub fn coord(&self) -> Option<GridCoord> {
        match self {
            Self::TileDimensions { coord, .. }
            | Self::AlreadyWritten { coord }
            | Self::OutOfRange { coord, .. } => Some(*coord),
            Self::Incomplete { missing } => missing.first().copied(),
        }
    }
}
