//! Conversion of server (UTC) end times into local end times.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use tracing::warn;

use super::types::Listing;
use crate::countdown::LOCAL_END_TIME_FORMAT;

/// Zone in which local end times are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
  /// The machine's local zone
  #[default]
  System,
  Fixed(FixedOffset),
}

impl DisplayZone {
  /// Render `utc` as a local end-time string.
  pub fn render(&self, utc: DateTime<Utc>) -> String {
    match self {
      Self::System => utc
        .with_timezone(&Local)
        .format(LOCAL_END_TIME_FORMAT)
        .to_string(),
      Self::Fixed(offset) => utc
        .with_timezone(offset)
        .format(LOCAL_END_TIME_FORMAT)
        .to_string(),
    }
  }
}

/// Parse an offset such as `+02:00`, `-0530` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
  let raw = raw.trim();
  if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
    return FixedOffset::east_opt(0).ok_or_else(|| eyre!("Invalid UTC offset '{}'", raw));
  }

  let (sign, rest) = match raw.chars().next() {
    Some('+') => (1, &raw[1..]),
    Some('-') => (-1, &raw[1..]),
    _ => return Err(eyre!("UTC offset '{}' must start with + or -", raw)),
  };
  let digits: String = rest.chars().filter(|c| *c != ':').collect();
  if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
    return Err(eyre!("UTC offset '{}' must look like +HH:MM", raw));
  }

  let hours: i32 = digits[..2]
    .parse()
    .map_err(|e| eyre!("Invalid hours in UTC offset '{}': {}", raw, e))?;
  let minutes: i32 = digits[2..]
    .parse()
    .map_err(|e| eyre!("Invalid minutes in UTC offset '{}': {}", raw, e))?;

  FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
    .ok_or_else(|| eyre!("UTC offset '{}' is out of range", raw))
}

/// Parse an end time as sent by the server.
///
/// RFC 3339 strings keep their offset; strings without one are taken as UTC.
pub fn parse_server_time(raw: &str) -> Result<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Ok(dt.with_timezone(&Utc));
  }

  for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
      return Ok(naive.and_utc());
    }
  }

  Err(eyre!("Unrecognized server time '{}'", raw))
}

/// Derive the local end time from the server end time and reset the countdown state.
///
/// An unparseable server time leaves the local end time empty, which the
/// countdown engine treats as already ended.
pub fn localize<T: Listing>(item: &mut T, zone: DisplayZone) {
  let local = match parse_server_time(item.end_time_utc()) {
    Ok(utc) => zone.render(utc),
    Err(e) => {
      warn!(item = item.item_id(), error = %e, "could not normalize end time");
      String::new()
    }
  };

  *item.end_time_mut() = local;
  let fields = T::countdown_fields();
  (fields.display)(item).clear();
  *(fields.deadline)(item) = None;
}
