//! Check records — the persisted time series of probe verdicts.
//!
//! A domain's history only grows when its verdict changes. A repeated verdict
//! advances the `checked_at` of the current record instead of adding a row,
//! so storage is proportional to the number of state transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Domain, DomainId};

// ─── Verdict ─────────────────────────────────────────────────────────────────

/// The outcome of one consensus probe.
///
/// `Unknown` is never a negative claim: a timeout or a resolver disagreement
/// says nothing about whether the domain is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
  /// Both resolvers returned at least one DS record.
  Signed,
  /// Both resolvers returned no DS records.
  Unsigned,
  /// The probe did not complete; `error` is the diagnostic.
  Unknown { error: String },
}

impl Verdict {
  /// Build a verdict from the stored `(has_dnssec, error)` pair. A non-empty
  /// `error` always wins over the boolean.
  pub fn from_parts(has_dnssec: Option<bool>, error: impl Into<String>) -> Self {
    let error = error.into();
    match (has_dnssec, error.is_empty()) {
      (_, false) => Self::Unknown { error },
      (Some(true), true) => Self::Signed,
      (Some(false), true) => Self::Unsigned,
      (None, true) => Self::Unknown {
        error: "missing verdict".to_owned(),
      },
    }
  }

  pub fn unknown(error: impl Into<String>) -> Self {
    Self::Unknown { error: error.into() }
  }

  /// `None` for [`Verdict::Unknown`].
  pub fn has_dnssec(&self) -> Option<bool> {
    match self {
      Self::Signed => Some(true),
      Self::Unsigned => Some(false),
      Self::Unknown { .. } => None,
    }
  }

  /// Empty unless the probe failed.
  pub fn error(&self) -> &str {
    match self {
      Self::Unknown { error } => error,
      _ => "",
    }
  }

  pub fn state(&self) -> DomainState {
    match self {
      Self::Signed => DomainState::Signed,
      Self::Unsigned => DomainState::Unsigned,
      Self::Unknown { .. } => DomainState::Error,
    }
  }
}

// ─── State machine ───────────────────────────────────────────────────────────

/// Where a domain sits in its probe trajectory.
///
/// Every domain starts at `Unknown` and each probe moves it to one of the
/// other three states. Self-transitions are compacted away by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainState {
  Unknown,
  Signed,
  Unsigned,
  Error,
}

impl DomainState {
  pub fn of(record: Option<&CheckRecord>) -> Self {
    record.map_or(Self::Unknown, |r| r.verdict.state())
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One observed verdict for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
  pub record_id:  i64,
  pub domain_id:  DomainId,
  /// Last time this verdict was observed. Non-decreasing per domain.
  pub checked_at: DateTime<Utc>,
  #[serde(flatten)]
  pub verdict:    Verdict,
}

/// The result of [`CheckStore::record`](crate::store::CheckStore::record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recorded {
  /// The domain's current record after the write.
  pub record:   CheckRecord,
  /// `true` if a new row was appended, `false` if the current row was
  /// refreshed in place.
  pub inserted: bool,
}

/// One entry of the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
  pub domain:   Domain,
  /// The record that introduced the new state.
  pub record:   CheckRecord,
  /// The completed state the domain held before `record`.
  pub previous: DomainState,
}

/// DNSSEC adoption within one catalog class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRatio {
  pub class:   String,
  pub percent: f64,
}
