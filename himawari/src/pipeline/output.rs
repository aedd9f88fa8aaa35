//! Output naming and persistence.
//!
//! Output files are named deterministically from level and timestamp (or
//! colour, for overlays), so a re-run for the same inputs finds the previous
//! result. Files are encoded to a temporary sibling and renamed into place;
//! the output path never holds a partial image.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use super::error::AcquireError;
use crate::coord::{ImageTimestamp, Level};

/// `himawari_{level}d_{YYYYMMDDHHMMSS}.png`
pub fn image_file_name(level: Level, timestamp: ImageTimestamp) -> String {
    format!("himawari_{}d_{}.png", level, timestamp.compact())
}

/// `coastline_{level}d.png`, or `coastline_{level}d_{rrggbbaa}.png` when recoloured.
pub fn overlay_file_name(level: Level, color: Option<Rgba<u8>>) -> String {
    match color {
        Some(color) => format!("coastline_{}d_{}.png", level, format_color(color)),
        None => format!("coastline_{}d.png", level),
    }
}

/// `{base_stem}_{overlay_stem}.png`, next to the base image.
pub fn merged_path(base: &Path, overlay: &Path) -> PathBuf {
    let stem = |path: &Path| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    base.with_file_name(format!("{}_{}.png", stem(base), stem(overlay)))
}

/// Lower-case `rrggbbaa`.
pub fn format_color(color: Rgba<u8>) -> String {
    let [r, g, b, a] = color.0;
    format!("{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
}

/// Returns true if `path` is an existing regular file.
pub(crate) async fn output_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Encodes `image` as PNG and atomically places it at `path`.
pub async fn persist_png(image: RgbaImage, path: &Path) -> Result<(), AcquireError> {
    let target = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || write_png(&image, &target)).await;

    let persist_failed = |reason: String| AcquireError::PersistFailed {
        path: path.to_path_buf(),
        reason,
    };
    match result {
        Ok(Ok(())) => {
            debug!(path = %path.display(), "Output written");
            Ok(())
        }
        Ok(Err(reason)) => Err(persist_failed(reason)),
        Err(e) => Err(persist_failed(e.to_string())),
    }
}

fn write_png(image: &RgbaImage, path: &Path) -> Result<(), String> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| e.to_string())?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| "output path has no file name".to_string())?;

    // Unique per call; dropped (and removed) on any error below.
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| e.to_string())?;

    let mut writer = BufWriter::new(temp.as_file_mut());
    image
        .write_to(&mut writer, ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())?;
    drop(writer);

    temp.persist(path).map_err(|e| e.error.to_string())?;
    Ok(())
}
