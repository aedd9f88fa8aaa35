//! Coastline overlay: acquisition, recolouring, and merging.
//!
//! The overlay is fetched once per level through the same work-unit
//! machinery as imagery, then composited onto any number of base images.
//! The acquired layer is an explicit [`OverlayLayer`] value handed to
//! [`merge_overlay`]; nothing about it is remembered between calls.

use std::path::{Path, PathBuf};

use image::{imageops, Rgba, RgbaImage};
use thiserror::Error;
use tracing::{debug, info};

use super::acquirer::ImageAcquirer;
use super::error::AcquireError;
use super::output::{merged_path, output_exists, overlay_file_name, persist_png};
use super::state::{AcquisitionRun, AcquisitionState};
use crate::coord::{Level, TileIdentity};

/// Colour that means "keep the overlay's own colours".
pub const DEFAULT_OVERLAY_COLOR: Rgba<u8> = Rgba([0xff, 0x00, 0x00, 0xff]);

/// A persisted overlay image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLayer {
    pub level: Level,
    /// Colour every visible pixel was recoloured to, if any.
    pub color: Option<Rgba<u8>>,
    pub path: PathBuf,
}

/// Invalid colour string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {0:?}, expected 8 hex digits rrggbbaa")]
pub struct ColorError(pub String);

/// Parses an `rrggbbaa` hex colour, with or without a leading `#`.
pub fn parse_color(s: &str) -> Result<Rgba<u8>, ColorError> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 8 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorError(s.to_string()));
    }
    let mut channels = [0u8; 4];
    for (i, channel) in channels.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| ColorError(s.to_string()))?;
    }
    Ok(Rgba(channels))
}

/// Maps a requested colour to a recolour target; the default colour and
/// `None` both keep the overlay's own colours.
pub fn recolor_target(color: Option<Rgba<u8>>) -> Option<Rgba<u8>> {
    color.filter(|c| *c != DEFAULT_OVERLAY_COLOR)
}

/// Replaces the colour of every non-transparent pixel with `color`.
///
/// Each pixel keeps its coverage: the new alpha is the old alpha scaled by
/// the alpha of `color`.
pub fn recolor(image: &mut RgbaImage, color: Rgba<u8>) {
    let [r, g, b, a] = color.0;
    for pixel in image.pixels_mut() {
        let alpha = pixel.0[3];
        if alpha == 0 {
            continue;
        }
        let alpha = ((alpha as u32 * a as u32 + 127) / 255) as u8;
        *pixel = Rgba([r, g, b, alpha]);
    }
}

/// Composites `overlay` over `base` in place (Porter-Duff source-over).
///
/// Fully transparent overlay pixels leave the base untouched; fully opaque
/// ones replace it.
pub fn alpha_over(base: &mut RgbaImage, overlay: &RgbaImage) {
    imageops::overlay(base, overlay, 0, 0);
}

impl ImageAcquirer {
    /// Acquires the coastline overlay at `level`, recoloured to `color`.
    ///
    /// Returns the existing overlay when it was already persisted. Overlay
    /// tiles are timestamp-invariant and stay in the cache.
    pub async fn acquire_overlay(
        &self,
        level: Level,
        color: Option<Rgba<u8>>,
    ) -> Result<OverlayLayer, AcquireError> {
        let color = recolor_target(color);
        let path = self.output_dir().join(overlay_file_name(level, color));
        let layer = OverlayLayer {
            level,
            color,
            path: path.clone(),
        };

        let mut run = AcquisitionRun::new("overlay", level, AcquisitionState::CheckingExistingOutput);
        if output_exists(&path).await {
            run.advance(AcquisitionState::Done);
            return Ok(layer);
        }

        run.advance(AcquisitionState::FetchingTiles);
        let identities: Vec<TileIdentity> = level
            .coords()
            .map(|coord| TileIdentity::coastline(level, coord))
            .collect();
        let tiles = self.fetch_tiles(&identities).await?;

        run.advance(AcquisitionState::Assembling);
        let mut image = self
            .assemble(level, tiles, |coord| TileIdentity::coastline(level, coord))
            .await?;
        if let Some(color) = color {
            recolor(&mut image, color);
        }

        run.advance(AcquisitionState::Persisting);
        persist_png(image, &path).await?;

        run.advance(AcquisitionState::Done);
        info!(path = %path.display(), "Overlay acquired");
        Ok(layer)
    }
}

/// Composites `overlay` onto the image at `base_path`.
///
/// The result is written next to the base image as
/// `{base_stem}_{overlay_stem}.png`; the base image is not modified.
pub async fn merge_overlay(
    base_path: &Path,
    overlay: &OverlayLayer,
) -> Result<PathBuf, AcquireError> {
    let out = merged_path(base_path, &overlay.path);
    if output_exists(&out).await {
        debug!(path = %out.display(), "Merged image already present");
        return Ok(out);
    }

    let mut base = load_rgba(base_path).await?;
    let layer = load_rgba(&overlay.path).await?;

    if base.dimensions() != layer.dimensions() {
        return Err(AcquireError::OverlayMismatch {
            base_width: base.width(),
            base_height: base.height(),
            overlay_width: layer.width(),
            overlay_height: layer.height(),
        });
    }

    let base = tokio::task::spawn_blocking(move || {
        alpha_over(&mut base, &layer);
        base
    })
    .await
    .map_err(|e| AcquireError::Assembly(e.to_string()))?;

    persist_png(base, &out).await?;
    info!(path = %out.display(), "Overlay merged");
    Ok(out)
}

async fn load_rgba(path: &Path) -> Result<RgbaImage, AcquireError> {
    let owned = path.to_path_buf();
    let base_image = |reason: String| AcquireError::BaseImage {
        path: path.to_path_buf(),
        reason,
    };
    tokio::task::spawn_blocking(move || image::open(&owned).map(|img| img.to_rgba8()))
        .await
        .map_err(|e| base_image(e.to_string()))?
        .map_err(|e| base_image(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::executor::RetryPolicy;
    use crate::pipeline::AcquireConfig;
    use crate::testing::{coastline_tile, MemoryCache, MockMetadataSource, MockTileSource};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("ff0000ff"), Ok(Rgba([255, 0, 0, 255])));
        assert_eq!(parse_color("#00FF7f80"), Ok(Rgba([0, 255, 127, 128])));
        assert!(parse_color("ff0000").is_err());
        assert!(parse_color("gg0000ff").is_err());
        assert!(parse_color("").is_err());
    }

    #[test]
    fn test_recolor_target_default_is_none() {
        assert_eq!(recolor_target(Some(DEFAULT_OVERLAY_COLOR)), None);
        assert_eq!(recolor_target(None), None);
        assert_eq!(
            recolor_target(Some(Rgba([0, 255, 0, 255]))),
            Some(Rgba([0, 255, 0, 255]))
        );
    }

    #[test]
    fn test_recolor_keeps_transparency() {
        let mut image = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([255, 0, 0, 128])
            }
        });
        recolor(&mut image, Rgba([0, 0, 255, 255]));
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*image.get_pixel(1, 0), Rgba([0, 0, 255, 128]));
    }

    #[test]
    fn test_alpha_over_extremes() {
        let mut base = RgbaImage::from_pixel(3, 1, Rgba([10, 20, 30, 255]));
        let overlay = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([200, 0, 0, 0]),
            1 => Rgba([200, 100, 50, 255]),
            _ => Rgba([255, 255, 255, 128]),
        });

        alpha_over(&mut base, &overlay);

        assert_eq!(*base.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
        assert_eq!(*base.get_pixel(1, 0), Rgba([200, 100, 50, 255]));
        let half = base.get_pixel(2, 0);
        assert!(half.0[3] >= 254);
        // 255*128/255 + 10*127/255 ≈ 133
        assert!((132..=134).contains(&half.0[0]));
    }

    #[tokio::test]
    async fn test_merge_single_opaque_pixel() {
        let dir = TempDir::new().unwrap();
        let base = RgbaImage::from_fn(32, 32, |x, y| Rgba([x as u8, y as u8, 77, 255]));
        let base_path = dir.path().join("himawari_4d_20160102034000.png");
        persist_png(base.clone(), &base_path).await.unwrap();

        let mut overlay = RgbaImage::new(32, 32);
        overlay.put_pixel(10, 10, Rgba([0, 255, 0, 255]));
        let overlay_path = dir.path().join("coastline_4d.png");
        persist_png(overlay, &overlay_path).await.unwrap();
        let layer = OverlayLayer {
            level: Level::L4,
            color: None,
            path: overlay_path,
        };

        let merged_path = merge_overlay(&base_path, &layer).await.unwrap();

        assert_eq!(
            merged_path,
            dir.path()
                .join("himawari_4d_20160102034000_coastline_4d.png")
        );
        let merged = image::open(&merged_path).unwrap().to_rgba8();
        for (x, y, pixel) in merged.enumerate_pixels() {
            if (x, y) == (10, 10) {
                assert_eq!(*pixel, Rgba([0, 255, 0, 255]));
            } else {
                assert_eq!(pixel, base.get_pixel(x, y));
            }
        }
        // base untouched
        assert_eq!(image::open(&base_path).unwrap().to_rgba8(), base);
    }

    #[tokio::test]
    async fn test_merge_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let base_path = dir.path().join("base.png");
        persist_png(RgbaImage::new(8, 8), &base_path).await.unwrap();
        let overlay_path = dir.path().join("coastline_4d.png");
        persist_png(RgbaImage::new(4, 4), &overlay_path).await.unwrap();
        let layer = OverlayLayer {
            level: Level::L4,
            color: None,
            path: overlay_path,
        };

        let err = merge_overlay(&base_path, &layer).await.unwrap_err();
        assert!(matches!(err, AcquireError::OverlayMismatch { .. }));
    }

    #[tokio::test]
    async fn test_merge_missing_base() {
        let dir = TempDir::new().unwrap();
        let layer = OverlayLayer {
            level: Level::L4,
            color: None,
            path: dir.path().join("coastline_4d.png"),
        };

        let err = merge_overlay(&dir.path().join("missing.png"), &layer)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::BaseImage { .. }));
    }

    #[tokio::test]
    async fn test_acquire_overlay_recolors_and_keeps_tiles() {
        let dir = TempDir::new().unwrap();
        let tiles = Arc::new(MockTileSource::new(4));
        let cache = Arc::new(MemoryCache::default());
        let acquirer = ImageAcquirer::new(
            Arc::new(MockMetadataSource::failing()),
            tiles.clone(),
            cache.clone(),
            AcquireConfig::default()
                .with_output_dir(dir.path())
                .with_retry_policy(RetryPolicy::fixed(1, Duration::ZERO)),
        );
        let blue = Rgba([0, 0, 255, 255]);

        let layer = acquirer.acquire_overlay(Level::L4, Some(blue)).await.unwrap();

        assert_eq!(layer.color, Some(blue));
        assert_eq!(
            layer.path.file_name().unwrap().to_string_lossy(),
            "coastline_4d_0000ffff.png"
        );
        let image = image::open(&layer.path).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (16, 16));
        let tile = coastline_tile(4);
        for (x, y, pixel) in image.enumerate_pixels() {
            if tile.get_pixel(x % 4, y % 4).0[3] == 0 {
                assert_eq!(pixel.0[3], 0);
            } else {
                assert_eq!(*pixel, blue);
            }
        }
        assert_eq!(cache.len(), 16);
        assert!(cache.contains("coastline_4d_0_0").await.unwrap());

        // second call reuses the persisted overlay
        acquirer.acquire_overlay(Level::L4, Some(blue)).await.unwrap();
        assert_eq!(tiles.calls(), 16);
    }
}
