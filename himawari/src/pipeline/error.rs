//! Acquisition error taxonomy.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::ServiceCacheError;
use crate::coord::GridCoord;
use crate::provider::ProviderError;

/// One grid cell that exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFailure {
    pub coord: GridCoord,
    pub attempts: u32,
    /// Error of the last attempt, if any attempt ran.
    pub error: Option<String>,
}

impl fmt::Display for TileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} attempts", self.coord, self.attempts)?;
        if let Some(ref error) = self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// Errors from an acquisition run.
///
/// No variant is ever produced after a partial image has been written to the
/// output path.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The metadata unit exhausted its attempts.
    #[error("latest image metadata unavailable after {attempts} attempts: {reason}")]
    MetadataUnavailable { attempts: u32, reason: String },

    /// One or more tile units exhausted their attempts.
    #[error("{} of {total} tiles failed, first: {}", .failures.len() + .lost, first_failure(.failures))]
    TileFetchFailed {
        total: usize,
        failures: Vec<TileFailure>,
        /// Units whose task panicked and left no outcome.
        lost: usize,
    },

    /// A fetched tile is not a valid tile image. Its cache entry has been
    /// invalidated.
    #[error("tile {coord} could not be decoded: {reason}")]
    DecodeFailed { coord: GridCoord, reason: String },

    /// Encoding or writing the output failed.
    #[error("failed to persist {}: {reason}", .path.display())]
    PersistFailed { path: PathBuf, reason: String },

    /// Tile cache failed outside of a work unit.
    #[error("cache error: {0}")]
    Cache(#[from] ServiceCacheError),

    /// The HTTP client could not be set up.
    #[error("provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    /// Base image for an overlay merge could not be read.
    #[error("failed to read base image {}: {reason}", .path.display())]
    BaseImage { path: PathBuf, reason: String },

    /// Overlay and base image differ in size.
    #[error("overlay is {overlay_width}x{overlay_height}, base image is {base_width}x{base_height}")]
    OverlayMismatch {
        base_width: u32,
        base_height: u32,
        overlay_width: u32,
        overlay_height: u32,
    },

    /// Composition failed for a reason not tied to a single tile.
    #[error("assembly failed: {0}")]
    Assembly(String),
}

fn first_failure(failures: &[TileFailure]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "worker task panicked".to_string())
}

impl AcquireError {
    /// Coordinates of every failed tile, for [`AcquireError::TileFetchFailed`]
    /// and [`AcquireError::DecodeFailed`].
    pub fn failed_coords(&self) -> Vec<GridCoord> {
        match self {
            Self::TileFetchFailed { failures, .. } => failures.iter().map(|f| f.coord).collect(),
            Self::DecodeFailed { coord, .. } => vec![*coord],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_fetch_failed_display() {
        let err = AcquireError::TileFetchFailed {
            total: 16,
            failures: vec![
                TileFailure {
                    coord: GridCoord { x: 1, y: 2 },
                    attempts: 5,
                    error: Some("HTTP 503 from mock".to_string()),
                },
                TileFailure {
                    coord: GridCoord { x: 3, y: 0 },
                    attempts: 5,
                    error: None,
                },
            ],
            lost: 0,
        };
        assert_eq!(
            err.to_string(),
            "2 of 16 tiles failed, first: (1, 2) after 5 attempts: HTTP 503 from mock"
        );
        assert_eq!(
            err.failed_coords(),
            vec![GridCoord { x: 1, y: 2 }, GridCoord { x: 3, y: 0 }]
        );
    }

    #[test]
    fn test_lost_tasks_counted() {
        let err = AcquireError::TileFetchFailed {
            total: 4,
            failures: Vec::new(),
            lost: 1,
        };
        assert_eq!(err.to_string(), "1 of 4 tiles failed, first: worker task panicked");
    }

    #[test]
    fn test_decode_failed_coords() {
        let err = AcquireError::DecodeFailed {
            coord: GridCoord { x: 0, y: 3 },
            reason: "tile (0, 3) is 5x5, expected 6x6".to_string(),
        };
        assert_eq!(err.failed_coords(), vec![GridCoord { x: 0, y: 3 }]);
        assert!(AcquireError::Assembly("x".to_string()).failed_coords().is_empty());
    }
}
