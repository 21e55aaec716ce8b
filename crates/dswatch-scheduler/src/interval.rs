//! Probe interval derivation.
//!
//! By default the whole catalog is swept once a day. Public resolvers rate
//! limit, so no interval is ever shorter than [`MIN_INTERVAL`].

use std::time::Duration;

use tracing::warn;

use crate::{Error, Result};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Floor applied to every derived or configured interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Derive the tick interval for a catalog of `catalog_size` domains.
///
/// `configured` replaces the derived value when it parses. An unparseable
/// override is logged and ignored. An empty catalog is an error: there would
/// be nothing to probe.
pub fn probe_interval(catalog_size: usize, configured: Option<&str>) -> Result<Duration> {
  if catalog_size == 0 {
    return Err(Error::EmptyCatalog);
  }

  let mut interval = DAY / u32::try_from(catalog_size).unwrap_or(u32::MAX);

  if let Some(raw) = configured.map(str::trim).filter(|s| !s.is_empty()) {
    match parse_duration(raw) {
      Ok(d) => interval = d,
      Err(e) => warn!(error = %e, "ignoring check interval override"),
    }
  }

  Ok(interval.max(MIN_INTERVAL))
}

/// Parse a duration string such as `"90s"`, `"1m30s"`, `"1.5h"` or `"250ms"`.
///
/// Accepts a sequence of decimal numbers, each with a unit (`ns`, `us`, `µs`,
/// `ms`, `s`, `m`, `h`), optionally preceded by a sign. A bare `"0"` is
/// allowed. Negative durations parse to zero.
pub fn parse_duration(s: &str) -> Result<Duration> {
  let invalid = || Error::InvalidDuration(s.to_owned());

  let (negative, mut rest) = match s.as_bytes().first() {
    Some(b'-') => (true, &s[1..]),
    Some(b'+') => (false, &s[1..]),
    _ => (false, s),
  };
  if rest == "0" {
    return Ok(Duration::ZERO);
  }
  if rest.is_empty() {
    return Err(invalid());
  }

  let mut nanos = 0f64;
  while !rest.is_empty() {
    let split = rest
      .find(|c: char| !(c.is_ascii_digit() || c == '.'))
      .unwrap_or(rest.len());
    let (number, tail) = rest.split_at(split);
    if number.is_empty() || number == "." {
      return Err(invalid());
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;

    let split = tail
      .find(|c: char| c.is_ascii_digit() || c == '.')
      .unwrap_or(tail.len());
    let (unit, tail) = tail.split_at(split);
    let scale = match unit {
      "ns" => 1.0,
      "us" | "µs" | "μs" => 1e3,
      "ms" => 1e6,
      "s" => 1e9,
      "m" => 60e9,
      "h" => 3600e9,
      _ => return Err(invalid()),
    };

    nanos += value * scale;
    rest = tail;
  }

  if negative {
    return Ok(Duration::ZERO);
  }
  Ok(Duration::from_nanos(nanos as u64))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_go_style_durations() {
    assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
    assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    assert_eq!(parse_duration("-5m").unwrap(), Duration::ZERO);
  }

  #[test]
  fn rejects_malformed_durations() {
    for bad in ["", "5", "m", "1x", "1.2.3s", "s5", "1h 2m", "-"] {
      assert!(parse_duration(bad).is_err(), "{bad:?} should not parse");
    }
  }

  #[test]
  fn default_sweeps_the_catalog_daily() {
    assert_eq!(probe_interval(10, None).unwrap(), Duration::from_secs(8640));
    assert_eq!(probe_interval(1440, None).unwrap(), Duration::from_secs(60));
  }

  #[test]
  fn large_catalogs_are_floored() {
    assert_eq!(probe_interval(5000, None).unwrap(), MIN_INTERVAL);
    assert_eq!(probe_interval(usize::MAX, None).unwrap(), MIN_INTERVAL);
  }

  #[test]
  fn override_replaces_the_default() {
    let d = probe_interval(10, Some("5m")).unwrap();
    assert_eq!(d, Duration::from_secs(300));
  }

  #[test]
  fn override_is_floored_too() {
    assert_eq!(probe_interval(10, Some("1s")).unwrap(), MIN_INTERVAL);
    assert_eq!(probe_interval(10, Some("-1h")).unwrap(), MIN_INTERVAL);
    assert_eq!(probe_interval(10, Some("0")).unwrap(), MIN_INTERVAL);
  }

  #[test]
  fn bad_or_blank_override_keeps_the_default() {
    assert_eq!(probe_interval(10, Some("soon")).unwrap(), Duration::from_secs(8640));
    assert_eq!(probe_interval(10, Some("  ")).unwrap(), Duration::from_secs(8640));
  }

  #[test]
  fn empty_catalog_is_an_error() {
    assert!(matches!(probe_interval(0, Some("5m")), Err(Error::EmptyCatalog)));
  }
}
