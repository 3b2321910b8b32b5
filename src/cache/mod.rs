//! In-memory cache of fetch results.
//!
//! Entries are keyed by target page and page-inclusion mode, expire after a
//! configured TTL, and can be dropped explicitly:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 300
//! capacity = 16
//! ```

mod config;
mod lock;
mod store;

pub use config::CacheConfig;
pub use store::{CacheKey, PostsCache};
