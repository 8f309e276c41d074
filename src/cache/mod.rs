//! In-memory result cache for auction collections.
//!
//! This module provides the caching half of the client:
//! - One entry per `CacheKey`, each wrapping its value with an expiry instant
//! - Reads governed by a caller-chosen `FreshnessPolicy`
//! - Writes that always replace the whole entry with a fresh TTL
//!
//! Nothing here performs I/O; network retrieval lives in `auction::DataSource`.

mod entry;
mod key;
mod policy;
mod store;

pub use entry::CacheEntry;
pub use key::{CacheKey, SnipeStatus};
pub use policy::{CacheResult, CacheSource, FreshnessPolicy};
pub use store::{CacheStore, DEFAULT_TTL_SECS};
