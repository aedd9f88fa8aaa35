//! Image acquisition pipeline
//!
//! The [`ImageAcquirer`] owns its collaborators and drives each run from the
//! latest-timestamp lookup to a persisted image. The free functions below
//! are shortcuts over an acquirer wired to the Himawari archive with default
//! settings.
//!
//! ```ignore
//! use himawari::coord::Level;
//!
//! let image = himawari::acquire_image(Level::L4, &cache_dir).await?;
//! let coastline = himawari::acquire_overlay(Level::L4, None, &cache_dir).await?;
//! let merged = himawari::merge_overlay(&image, &coastline).await?;
//! ```

mod acquirer;
mod error;
mod output;
mod overlay;
mod state;

pub use acquirer::{
    default_cache_dir, AcquireConfig, ImageAcquirer, DEFAULT_ATTEMPT_TIMEOUT_SECS,
    DEFAULT_HTTP_PARALLEL, TILE_CACHE_SUBDIR,
};
pub use error::{AcquireError, TileFailure};
pub use output::{format_color, image_file_name, merged_path, overlay_file_name, persist_png};
pub use overlay::{
    alpha_over, merge_overlay, parse_color, recolor, recolor_target, ColorError, OverlayLayer,
    DEFAULT_OVERLAY_COLOR,
};
pub use state::AcquisitionState;

/// Pixel type of overlay colours.
pub use image::Rgba;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coord::Level;
use crate::provider::{LatestInfo, SourceConfig, DEFAULT_TIMEOUT_SECS};

fn default_acquirer(cache_dir: &Path) -> Result<ImageAcquirer, AcquireError> {
    ImageAcquirer::himawari(
        cache_dir,
        SourceConfig::default(),
        Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        AcquireConfig::default(),
    )
}

/// Latest image timestamp published by the archive.
pub async fn latest_timestamp() -> Result<LatestInfo, AcquireError> {
    default_acquirer(&default_cache_dir())?
        .latest_timestamp()
        .await
}

/// Acquires the latest image at `level` into `cache_dir`.
pub async fn acquire_image(level: Level, cache_dir: &Path) -> Result<PathBuf, AcquireError> {
    default_acquirer(cache_dir)?.acquire_image(level).await
}

/// Acquires the coastline overlay at `level` into `cache_dir`.
pub async fn acquire_overlay(
    level: Level,
    color: Option<Rgba<u8>>,
    cache_dir: &Path,
) -> Result<OverlayLayer, AcquireError> {
    default_acquirer(cache_dir)?
        .acquire_overlay(level, color)
        .await
}
