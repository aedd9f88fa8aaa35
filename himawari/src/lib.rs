//! Himawari - Full-disc Earth imagery from the Himawari-8 archive
//!
//! This library fetches the latest full-disc image published by the
//! Himawari-8 archive as an N×N grid of tiles, retries each tile on its
//! own, and stitches the grid into a single PNG. A coastline layer can be
//! fetched the same way and composited over the image.
//!
//! # Modules
//!
//! - [`coord`]: detail levels, grid coordinates and tile identities
//! - [`executor`]: retrying work units and the fan-out/fan-in manager
//! - [`provider`]: archive metadata and tile sources over HTTP
//! - [`cache`]: on-disk tile cache
//! - [`tasks`]: work units for metadata and tile fetches
//! - [`assemble`]: grid canvas and parallel tile placement
//! - [`pipeline`]: end-to-end acquisition and overlay merging
//! - [`config`]: `~/.himawari/config.ini`
//! - [`logging`]: tracing subscriber setup

pub mod assemble;
pub mod cache;
pub mod config;
pub mod coord;
pub mod executor;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use cache::BoxFuture;
pub use pipeline::{
    acquire_image, acquire_overlay, latest_timestamp, merge_overlay, AcquireConfig, AcquireError,
    ImageAcquirer, OverlayLayer,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
