//! # Result Cache
//!
//! Shields meetup.com from repeated load. Records are kept in a bounded LRU
//! map and each entry expires after a duration picked from the event's
//! lifecycle state when it was stored.
//!
//! - **`result_cache`**: the concurrent LRU with per-entry expiry.
//! - **`ttl`**: the lifecycle state to duration mapping.

/// Bounded LRU cache with per-entry expiry.
pub mod result_cache;
/// TTL selection by lifecycle state.
pub mod ttl;

pub use result_cache::{CacheKey, ResultCache};
pub use ttl::{TtlMapping, TtlPolicy};
