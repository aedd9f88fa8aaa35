//! Provider traits and shared types.

use serde::Deserialize;
use thiserror::Error;

use crate::cache::BoxFuture;
use crate::coord::{ImageTimestamp, TileIdentity};

/// Errors from the remote image archive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport-level failure: connection refused, reset, DNS, body read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {code} from {url}")]
    Status { code: u16, url: String },

    /// The request did not complete within the client timeout.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// The response body could not be interpreted.
    #[error("malformed response: {0}")]
    Parse(String),
}

/// Latest available full-disk image, as reported by the metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestInfo {
    /// Capture time (UTC).
    pub timestamp: ImageTimestamp,
    /// Provenance file name reported alongside the timestamp.
    pub file: String,
}

#[derive(Deserialize)]
struct RawLatest {
    date: String,
    #[serde(default)]
    file: String,
}

impl LatestInfo {
    /// Parses the `{"date": "YYYY-MM-DD HH:MM:SS", "file": "..."}` document.
    pub fn from_json(body: &[u8]) -> Result<Self, ProviderError> {
        let raw: RawLatest =
            serde_json::from_slice(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let timestamp =
            ImageTimestamp::parse(&raw.date).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(Self {
            timestamp,
            file: raw.file,
        })
    }
}

/// Source of the latest image timestamp.
pub trait MetadataSource: Send + Sync {
    /// Queries the latest available image.
    fn latest(&self) -> BoxFuture<'_, Result<LatestInfo, ProviderError>>;
}

/// Source of raw tile payloads.
pub trait TileSource: Send + Sync {
    /// Edge length in pixels of the tiles this source serves.
    fn tile_size(&self) -> u32;

    /// Downloads the encoded payload of one tile.
    fn fetch_tile(&self, tile: TileIdentity) -> BoxFuture<'_, Result<Vec<u8>, ProviderError>>;
}
