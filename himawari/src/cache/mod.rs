//! Tile payload cache.
//!
//! Tile units consult the cache before every remote fetch and write to it
//! after every successful one. Entries that fail to decode are deleted by
//! the unit that found them.
//!
//! ```ignore
//! use himawari::cache::{Cache, DiskCache};
//!
//! let cache = DiskCache::new("/tmp/himawari");
//! cache.set("4d_20160102034000_0_0", png_bytes).await?;
//! let bytes = cache.get("4d_20160102034000_0_0").await?;
//! ```

mod disk;
mod traits;

pub use disk::{CacheStats, DiskCache};
pub use traits::{validate_key, BoxFuture, Cache, ServiceCacheError};
