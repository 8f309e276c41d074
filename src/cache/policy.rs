use chrono::{DateTime, Utc};

/// How a read treats an existing entry.
///
/// Exactly one policy applies per read. Writes ignore it: every successful
/// fetch stores a new entry with a fresh TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreshnessPolicy {
  /// Return the cached value only while it has not expired.
  #[default]
  UseFreshIfValid,
  /// Return the cached value whenever one exists, expired or not.
  UseCachedEvenIfStale,
  /// Always miss. The old entry stays until a new value is stored.
  ForceRefresh,
}

/// Result of a cache hit, including where the value came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Whether the entry was still fresh
  pub source: CacheSource,
  /// When the entry expires (or expired)
  pub expires_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  pub fn new(data: T, expires_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      expires_at,
    }
  }

  pub fn is_stale(&self) -> bool {
    self.source == CacheSource::CacheStale
  }
}

/// Indicates whether a hit was served from a fresh or an expired entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Entry has not expired
  CacheFresh,
  /// Entry expired, served because the caller allowed stale data
  CacheStale,
}
