//! In-process response cache for dataset results.
//!
//! Entries live for a fixed TTL and the cache holds at most `capacity`
//! entries; when full, the entry inserted first is evicted. Eviction is by
//! insertion age, not access recency.

pub mod clock;
pub mod keys;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use keys::CacheKey;
pub use store::ResponseCache;
pub use types::{CacheConfig, CacheEntryStatus, CacheStatus};
