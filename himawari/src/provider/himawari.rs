//! Himawari full-disk image archive.
//!
//! The archive publishes a JSON document naming the latest capture time and,
//! for every capture, a set of tile grids at levels 4, 8, 16 and 20. A static
//! coastline outline is published per level and does not change between
//! captures.
//!
//! # URL Templates
//!
//! Templates substitute `{level}`, `{size}`, `{timestamp}` (`YYYY/MM/DD/HHMMSS`),
//! `{x}` and `{y}`:
//!
//! - tiles: `http://himawari8.nict.go.jp/img/D531106/{level}d/{size}/{timestamp}_{x}_{y}.png`
//! - coastline: `http://himawari8.nict.go.jp/img/D531106/coastline/ff0000/{level}d/{size}/{x}_{y}.png`

use super::http::HttpClient;
use super::types::{LatestInfo, MetadataSource, ProviderError, TileSource};
use crate::cache::BoxFuture;
use crate::coord::{TileIdentity, TileLayer, TILE_SIZE};

/// Default metadata endpoint.
pub const DEFAULT_LATEST_URL: &str =
    "http://himawari8-dl.nict.go.jp/himawari8/img/D531106/latest.json";

/// Default tile URL template.
pub const DEFAULT_TILE_URL: &str =
    "http://himawari8.nict.go.jp/img/D531106/{level}d/{size}/{timestamp}_{x}_{y}.png";

/// Default coastline URL template.
pub const DEFAULT_COASTLINE_URL: &str =
    "http://himawari8.nict.go.jp/img/D531106/coastline/ff0000/{level}d/{size}/{x}_{y}.png";

/// Endpoints and tile geometry of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub latest_url: String,
    pub tile_url: String,
    pub coastline_url: String,
    pub tile_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            latest_url: DEFAULT_LATEST_URL.to_string(),
            tile_url: DEFAULT_TILE_URL.to_string(),
            coastline_url: DEFAULT_COASTLINE_URL.to_string(),
            tile_size: TILE_SIZE,
        }
    }
}

impl SourceConfig {
    /// Builds the URL of one tile.
    pub fn tile_url_for(&self, tile: &TileIdentity) -> String {
        let (template, timestamp) = match tile.layer {
            TileLayer::Imagery(ts) => (&self.tile_url, ts.url_segment()),
            TileLayer::Coastline => (&self.coastline_url, String::new()),
        };
        template
            .replace("{level}", &tile.level.to_string())
            .replace("{size}", &self.tile_size.to_string())
            .replace("{timestamp}", &timestamp)
            .replace("{x}", &tile.coord.x.to_string())
            .replace("{y}", &tile.coord.y.to_string())
    }
}

/// Himawari archive provider.
///
/// # Example
///
/// ```ignore
/// use himawari::provider::{HimawariProvider, ReqwestClient, SourceConfig};
///
/// let client = ReqwestClient::new()?;
/// let provider = HimawariProvider::new(client, SourceConfig::default());
/// let latest = provider.latest().await?;
/// ```
pub struct HimawariProvider<C: HttpClient> {
    http_client: C,
    config: SourceConfig,
}

impl<C: HttpClient> HimawariProvider<C> {
    pub fn new(http_client: C, config: SourceConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

impl<C: HttpClient> MetadataSource for HimawariProvider<C> {
    fn latest(&self) -> BoxFuture<'_, Result<LatestInfo, ProviderError>> {
        Box::pin(async move {
            let body = self.http_client.get(&self.config.latest_url).await?;
            LatestInfo::from_json(&body)
        })
    }
}

impl<C: HttpClient> TileSource for HimawariProvider<C> {
    fn tile_size(&self) -> u32 {
        self.config.tile_size
    }

    fn fetch_tile(&self, tile: TileIdentity) -> BoxFuture<'_, Result<Vec<u8>, ProviderError>> {
        Box::pin(async move {
            let url = self.config.tile_url_for(&tile);
            self.http_client.get(&url).await
        })
    }
}
