//! Result cache for Sigrun executions
//!
//! Results are keyed by a [`Fingerprint`] of the algorithm id, its input and
//! the caller-supplied configuration. Entries expire after a TTL and the
//! least recently used entry is evicted when the cache is full.

pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod result_cache;
pub mod stats;

pub use config::ResultCacheConfig;
pub use errors::{CacheError, CacheResult};
pub use fingerprint::{fingerprint, Fingerprint};
pub use result_cache::ResultCache;
pub use stats::CacheStats;
