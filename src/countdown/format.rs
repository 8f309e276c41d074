//! Rendering of "time remaining" strings.

use chrono::{DateTime, Utc};

/// Terminal display value once a deadline has passed.
pub const ENDED: &str = "Ended";

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Format the time left until `target` as seen at `now`.
///
/// - at or past the target: `"Ended"`
/// - under a minute: seconds only, e.g. `"59s"`
/// - under a day: non-zero hours and minutes, then seconds, e.g. `"2h 5s"`
/// - a day or more: non-zero days, hours and minutes, no seconds, e.g. `"1d 3m"`
pub fn format_countdown(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
  if now >= target {
    return ENDED.to_string();
  }

  let diff = (target - now).num_milliseconds();
  let days = diff / DAY_MS;
  let hours = (diff % DAY_MS) / HOUR_MS;
  let minutes = (diff % HOUR_MS) / MINUTE_MS;
  let seconds = (diff % MINUTE_MS) / SECOND_MS;

  if diff < MINUTE_MS {
    return format!("{}s", seconds);
  }

  let mut out = String::new();
  for (value, unit) in [(days, 'd'), (hours, 'h'), (minutes, 'm')] {
    if value != 0 {
      out.push_str(&format!("{}{} ", value, unit));
    }
  }
  if diff < DAY_MS {
    out.push_str(&format!("{}s", seconds));
  }

  out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  fn fmt_ms(ms: i64) -> String {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    format_countdown(now + Duration::milliseconds(ms), now)
  }

  #[test]
  fn test_ended_at_and_after_target() {
    assert_eq!(fmt_ms(0), "Ended");
    assert_eq!(fmt_ms(-1), "Ended");
    assert_eq!(fmt_ms(-86_400_000), "Ended");
  }

  #[test]
  fn test_sub_minute_shows_seconds_only() {
    assert_eq!(fmt_ms(59_999), "59s");
    assert_eq!(fmt_ms(1_500), "1s");
    assert_eq!(fmt_ms(999), "0s");
  }

  #[test]
  fn test_one_minute_boundary() {
    assert_eq!(fmt_ms(60_000), "1m 0s");
    assert_eq!(fmt_ms(61_000), "1m 1s");
  }

  #[test]
  fn test_sub_day_omits_zero_units() {
    assert_eq!(fmt_ms(3_600_000), "1h 0s");
    assert_eq!(fmt_ms(3_600_000 + 42_000), "1h 42s");
    assert_eq!(fmt_ms(2 * 3_600_000 + 5 * 60_000 + 9_000), "2h 5m 9s");
    assert_eq!(fmt_ms(86_399_999), "23h 59m 59s");
  }

  #[test]
  fn test_day_or_more_drops_seconds() {
    assert_eq!(fmt_ms(86_400_000), "1d");
    assert_eq!(fmt_ms(86_400_000 + 59_000), "1d");
    assert_eq!(fmt_ms(86_400_000 + 3_600_000 + 60_000 + 1_000), "1d 1h 1m");
    assert_eq!(fmt_ms(3 * 86_400_000 + 4 * 60_000), "3d 4m");
  }
}
