use chrono::{DateTime, Duration, Utc};

/// A cached value paired with the instant it stops being fresh.
///
/// Entries are never updated in place. A new fetch produces a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  item: T,
  expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  /// Create an entry that expires `ttl` after `now`.
  pub fn new(item: T, now: DateTime<Utc>, ttl: Duration) -> Self {
    Self {
      item,
      expires_at: now + ttl,
    }
  }

  pub fn item(&self) -> &T {
    &self.item
  }

  pub fn expires_at(&self) -> DateTime<Utc> {
    self.expires_at
  }

  /// Whether the entry is still fresh at `now`. Expiry is inclusive.
  pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
    now < self.expires_at
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
  }

  #[test]
  fn test_expires_at_is_creation_plus_ttl() {
    let entry = CacheEntry::new(1, start(), Duration::minutes(10));
    assert_eq!(entry.expires_at(), start() + Duration::minutes(10));
  }

  #[test]
  fn test_fresh_until_expiry() {
    let entry = CacheEntry::new("x", start(), Duration::seconds(5));
    assert!(entry.is_fresh(start()));
    assert!(entry.is_fresh(start() + Duration::milliseconds(4_999)));
    assert!(!entry.is_fresh(start() + Duration::seconds(5)));
    assert!(!entry.is_fresh(start() + Duration::hours(1)));
  }
}
