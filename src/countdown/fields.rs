//! Typed access to the entity fields the countdown engine reads and writes.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// A list shared between the cache, the view and the countdown engine.
///
/// The engine mutates entities in place so every holder of the `Arc` sees
/// the current countdown text.
pub type SharedCollection<T> = Arc<Mutex<Vec<T>>>;

/// Wrap a vector as a shared collection.
pub fn shared<T>(items: Vec<T>) -> SharedCollection<T> {
  Arc::new(Mutex::new(items))
}

/// Format of local end-time strings, e.g. `2024-05-01 14:00:00 +02:00`.
///
/// The offset is part of the string so it can be parsed back without knowing
/// which zone produced it.
pub const LOCAL_END_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// Parsed form of an entity's end time, memoized on the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
  At(DateTime<Utc>),
  /// The end time could not be parsed; treated as already ended.
  Unparseable,
}

impl Deadline {
  /// Parse a local end-time string. RFC 3339 is accepted as well.
  pub fn parse(raw: &str) -> Self {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, LOCAL_END_TIME_FORMAT)
      .or_else(|_| DateTime::parse_from_rfc3339(raw))
      .map(|dt| Deadline::At(dt.with_timezone(&Utc)))
      .unwrap_or(Deadline::Unparseable)
  }
}

/// Accessors telling the engine where the countdown data lives on `T`.
///
/// Plain function pointers keep the engine generic over any entity without
/// looking fields up by name at runtime.
pub struct CountdownFields<T> {
  /// Identifier reported in "items ended" notifications
  pub key: fn(&T) -> &str,
  /// Authoritative end time (local string)
  pub target: fn(&T) -> &str,
  /// Field overwritten with the countdown text
  pub display: fn(&mut T) -> &mut String,
  /// Slot for the parsed target so it is parsed once per entity
  pub deadline: fn(&mut T) -> &mut Option<Deadline>,
  /// Optional flag set once the entity ends
  pub has_ended: Option<fn(&mut T) -> &mut bool>,
}

impl<T> Clone for CountdownFields<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for CountdownFields<T> {}

/// Entities that know their own countdown fields.
pub trait Countdown: Sized + Send + 'static {
  fn countdown_fields() -> CountdownFields<Self>;
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_parse_local_format() {
    let deadline = Deadline::parse("2024-05-01 14:00:00 +02:00");
    assert_eq!(
      deadline,
      Deadline::At(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    );
  }

  #[test]
  fn test_parse_rfc3339() {
    let deadline = Deadline::parse("2024-05-01T12:00:00Z");
    assert_eq!(
      deadline,
      Deadline::At(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    );
  }

  #[test]
  fn test_parse_garbage() {
    assert_eq!(Deadline::parse(""), Deadline::Unparseable);
    assert_eq!(Deadline::parse("next tuesday"), Deadline::Unparseable);
  }
}
