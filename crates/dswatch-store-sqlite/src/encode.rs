//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! width, so lexical order in SQL equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use dswatch_core::{
  check::{CheckRecord, DomainState, Transition, Verdict},
  domain::{Domain, StaleDomain},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `domains` row.
pub struct RawDomain {
  pub id:    i64,
  pub name:  String,
  pub rank:  i64,
  pub class: Option<String>,
}

impl RawDomain {
  /// Read four columns starting at `at`: id, name, rank, class.
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:    row.get(at)?,
      name:  row.get(at + 1)?,
      rank:  row.get(at + 2)?,
      class: row.get(at + 3)?,
    })
  }

  pub fn into_domain(self) -> Result<Domain> {
    let rank = u32::try_from(self.rank)
      .map_err(|_| Error::Corrupt(format!("rank {} of {}", self.rank, self.name)))?;
    Ok(Domain {
      domain_id: self.id,
      name: self.name,
      rank,
      class: self.class.filter(|c| !c.is_empty()),
    })
  }
}

/// Raw values read from a `dns_checks` row.
pub struct RawCheck {
  pub id:         i64,
  pub domain_id:  i64,
  pub checked_at: String,
  pub has_dnssec: Option<bool>,
  pub error:      String,
}

impl RawCheck {
  /// Read five columns starting at `at`: id, domain_id, checked_at,
  /// has_dnssec, error.
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(at)?,
      domain_id:  row.get(at + 1)?,
      checked_at: row.get(at + 2)?,
      has_dnssec: row.get(at + 3)?,
      error:      row.get(at + 4)?,
    })
  }

  /// Whether this row carries the same verdict as `(has_dnssec, error)`.
  pub fn same_verdict(&self, has_dnssec: Option<bool>, error: &str) -> bool {
    self.has_dnssec == has_dnssec && self.error == error
  }

  pub fn into_record(self) -> Result<CheckRecord> {
    Ok(CheckRecord {
      record_id:  self.id,
      domain_id:  self.domain_id,
      checked_at: decode_dt(&self.checked_at)?,
      verdict:    Verdict::from_parts(self.has_dnssec, self.error),
    })
  }
}

/// A domain joined with its last check time.
pub struct RawStale {
  pub domain:     RawDomain,
  pub last_check: Option<String>,
}

impl RawStale {
  pub fn into_stale(self) -> Result<StaleDomain> {
    Ok(StaleDomain {
      domain:          self.domain.into_domain()?,
      last_checked_at: self.last_check.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// A change-feed row: domain, record, and the previous completed verdict.
pub struct RawTransition {
  pub domain:   RawDomain,
  pub check:    RawCheck,
  pub previous: bool,
}

impl RawTransition {
  pub fn into_transition(self) -> Result<Transition> {
    Ok(Transition {
      domain:   self.domain.into_domain()?,
      record:   self.check.into_record()?,
      previous: if self.previous {
        DomainState::Signed
      } else {
        DomainState::Unsigned
      },
    })
  }
}
