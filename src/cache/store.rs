//! Keyed store of cache entries.

use chrono::{DateTime, Duration, Utc};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::key::CacheKey;
use super::policy::{CacheResult, FreshnessPolicy};
use crate::clock::Clock;

/// Default time-to-live for every collection: ten minutes.
pub const DEFAULT_TTL_SECS: i64 = 600;

type StoredValue = Arc<dyn Any + Send + Sync>;

/// In-memory cache holding at most one entry per `CacheKey`.
///
/// Values are type-erased so that each key can hold its own collection type.
/// Reads are typed; a value of the wrong type behaves like a miss.
/// Clones share the same underlying entries.
#[derive(Clone)]
pub struct CacheStore {
  entries: Arc<Mutex<HashMap<CacheKey, CacheEntry<StoredValue>>>>,
  clock: Arc<dyn Clock>,
  /// How long a stored value stays fresh
  ttl: Duration,
}

impl CacheStore {
  /// Create an empty store using the default TTL.
  pub fn new(clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      clock,
      ttl: Duration::seconds(DEFAULT_TTL_SECS),
    }
  }

  /// Set the TTL applied by `set`.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// Every mutation is a single insert or remove, so a poisoned map is still consistent.
  fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<StoredValue>>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Look up `key` under `policy`. `None` means the caller has to fetch.
  pub fn get<T>(&self, key: &CacheKey, policy: FreshnessPolicy) -> Option<CacheResult<T>>
  where
    T: Clone + Send + Sync + 'static,
  {
    if policy == FreshnessPolicy::ForceRefresh {
      debug!(%key, "cache bypassed by force refresh");
      return None;
    }

    let entries = self.lock();
    let Some(entry) = entries.get(key) else {
      debug!(%key, "cache miss");
      return None;
    };

    let is_stale = !entry.is_fresh(self.clock.now());
    if is_stale && policy == FreshnessPolicy::UseFreshIfValid {
      debug!(%key, expired_at = %entry.expires_at(), "cache entry expired");
      return None;
    }

    let Some(value) = entry.item().as_ref().downcast_ref::<T>() else {
      warn!(%key, expected = type_name::<T>(), "cached value has an unexpected type");
      return None;
    };

    debug!(%key, is_stale, "cache hit");
    Some(CacheResult::new(value.clone(), entry.expires_at(), is_stale))
  }

  /// Store `value` under `key` with the default TTL, replacing any prior entry.
  pub fn set<T>(&self, key: CacheKey, value: T)
  where
    T: Send + Sync + 'static,
  {
    self.set_with_ttl(key, value, self.ttl);
  }

  /// Store `value` under `key` with an explicit TTL.
  pub fn set_with_ttl<T>(&self, key: CacheKey, value: T, ttl: Duration)
  where
    T: Send + Sync + 'static,
  {
    let entry = CacheEntry::new(Arc::new(value) as StoredValue, self.clock.now(), ttl);
    debug!(%key, expires_at = %entry.expires_at(), "cache store");
    self.lock().insert(key, entry);
  }

  /// Store `value` under `key`, keeping an expiry decided by the caller.
  ///
  /// Used when new data extends an existing entry, which must not outlive the
  /// data it already holds.
  pub fn set_expiring_at<T>(&self, key: CacheKey, value: T, expires_at: DateTime<Utc>)
  where
    T: Send + Sync + 'static,
  {
    let ttl = expires_at - self.clock.now();
    self.set_with_ttl(key, value, ttl);
  }

  /// Drop the entry for `key`. Returns whether one existed.
  pub fn invalidate(&self, key: &CacheKey) -> bool {
    let removed = self.lock().remove(key).is_some();
    if removed {
      debug!(%key, "cache invalidated");
    }
    removed
  }

  /// Drop every entry (e.g. on logout).
  pub fn clear_all(&self) {
    let mut entries = self.lock();
    debug!(count = entries.len(), "cache cleared");
    entries.clear();
  }

  pub fn contains(&self, key: &CacheKey) -> bool {
    self.lock().contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }
}
