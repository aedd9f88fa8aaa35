//! Remote image archive
//!
//! This module provides the metadata and tile source collaborators used by
//! the acquisition pipeline, and an HTTP implementation over the Himawari
//! archive.
//!
//! ```ignore
//! use himawari::provider::{HimawariProvider, ReqwestClient, SourceConfig};
//!
//! let http_client = ReqwestClient::new()?;
//! let provider = HimawariProvider::new(http_client, SourceConfig::default());
//! ```

mod himawari;
mod http;
mod types;

pub use self::himawari::{
    HimawariProvider, SourceConfig, DEFAULT_COASTLINE_URL, DEFAULT_LATEST_URL, DEFAULT_TILE_URL,
};
pub use http::{HttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use types::{LatestInfo, MetadataSource, ProviderError, TileSource};

#[cfg(test)]
pub use http::tests::MockHttpClient;
