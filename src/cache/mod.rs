//! In-memory caching with per-entry expiry.
//!
//! The same [`TtlCache`] type backs both the personality cache (keyed by
//! subject) and the raw search-result cache (keyed by query).

pub mod clock;
pub mod ttl_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ttl_cache::{CacheEntry, CacheEntryInfo, CacheInfo, TtlCache};
