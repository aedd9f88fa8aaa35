//! Work unit implementations for the executor.
//!
//! Two unit types cover the three kinds of work in an acquisition run:
//!
//! - [`MetadataWork`] - queries the latest image timestamp
//! - [`TileWork`] - fetches one imagery tile, or one coastline overlay tile,
//!   through the cache
//!
//! # Data Flow
//!
//! ```text
//! MetadataWork → LatestInfo { timestamp, file }
//! TileWork     → DecodedTile { coord, image }   (one unit per grid cell)
//! ```

mod metadata;
mod tile;

pub use metadata::MetadataWork;
pub use tile::{decode_tile, DecodedTile, TileWork};
