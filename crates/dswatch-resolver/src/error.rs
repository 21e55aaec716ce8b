//! Error types for `dswatch-resolver`.

use std::{fmt, net::SocketAddr, time::Duration};

use hickory_proto::op::ResponseCode;
use thiserror::Error;

/// Configuration errors, raised while building the resolver stack.
#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid resolver address: {0:?}")]
  InvalidResolver(String),

  #[error("resolver pool has {have} endpoints, need at least {need}")]
  PoolTooSmall { have: usize, need: usize },
}

/// Why a single DS query against one resolver failed.
#[derive(Debug, Error)]
pub enum QueryError {
  #[error("invalid domain name {name:?}: {reason}")]
  InvalidName { name: String, reason: String },

  #[error("timed out after {0:?}")]
  Timeout(Duration),

  #[error("transport error: {0}")]
  Transport(#[from] std::io::Error),

  #[error("malformed response: {0}")]
  Malformed(String),

  #[error("response id {got} does not match query id {want}")]
  IdMismatch { want: u16, got: u16 },

  #[error("server answered {0}")]
  ServerFailure(ResponseCode),
}

impl QueryError {
  /// A description without per-query detail such as ids or parser output,
  /// so the same failure always reads the same.
  pub fn summary(&self) -> String {
    match self {
      Self::InvalidName { reason, .. } => format!("invalid domain name: {reason}"),
      Self::Timeout(d) => format!("timed out after {d:?}"),
      Self::Transport(e) => format!("transport error: {}", e.kind()),
      Self::Malformed(_) => "malformed response".to_owned(),
      Self::IdMismatch { .. } => "response id mismatch".to_owned(),
      Self::ServerFailure(code) => format!("server answered {code}"),
    }
  }
}

/// One resolver that did not answer.
#[derive(Debug)]
pub struct LookupFailure {
  pub resolver: SocketAddr,
  pub error:    QueryError,
}

impl fmt::Display for LookupFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.resolver, self.error)
  }
}

/// Why a consensus check produced no verdict.
///
/// The `Display` form names the resolvers involved and is meant for logs.
/// [`CheckError::diagnostic`] is what ends up in a check record's `error`
/// column.
#[derive(Debug, Error)]
pub enum CheckError {
  #[error("resolver pool returned {have} endpoints, need {need}")]
  PoolTooSmall { have: usize, need: usize },

  /// One or both queries failed. Carries every failure so "both failed" and
  /// "one failed" stay distinguishable.
  #[error("lookup failed on {} of {queried}: {}", .failures.len(), join(.failures))]
  Lookup {
    queried:  usize,
    failures: Vec<LookupFailure>,
  },

  /// The resolvers disagree on whether any DS record exists.
  #[error("mismatch: {present} returned DS records, {absent} returned none")]
  Mismatch {
    present: SocketAddr,
    absent:  SocketAddr,
  },
}

impl CheckError {
  /// Stable text for the stored verdict.
  ///
  /// Resolvers are picked at random, so their addresses are left out and the
  /// per-resolver failures are sorted. A domain that keeps failing the same
  /// way then compacts into a single record.
  pub fn diagnostic(&self) -> String {
    match self {
      Self::PoolTooSmall { .. } => self.to_string(),
      Self::Lookup { queried, failures } => {
        let mut summaries: Vec<_> = failures.iter().map(|f| f.error.summary()).collect();
        summaries.sort();
        format!(
          "lookup failed on {} of {queried}: {}",
          failures.len(),
          summaries.join("; ")
        )
      }
      Self::Mismatch { .. } => "mismatch: resolvers disagree on DS presence".to_owned(),
    }
  }
}

fn join(failures: &[LookupFailure]) -> String {
  failures
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_error_lists_every_failure() {
    let err = CheckError::Lookup {
      queried:  2,
      failures: vec![
        LookupFailure {
          resolver: "8.8.8.8:53".parse().unwrap(),
          error:    QueryError::Timeout(Duration::from_secs(5)),
        },
        LookupFailure {
          resolver: "1.1.1.1:53".parse().unwrap(),
          error:    QueryError::ServerFailure(ResponseCode::ServFail),
        },
      ],
    };
    let msg = err.to_string();
    assert!(msg.starts_with("lookup failed on 2 of 2: "), "{msg}");
    assert!(msg.contains("8.8.8.8:53: timed out after 5s"), "{msg}");
    assert!(msg.contains("1.1.1.1:53: server answered"), "{msg}");
  }

  #[test]
  fn mismatch_is_recognisable() {
    let err = CheckError::Mismatch {
      present: "9.9.9.9:53".parse().unwrap(),
      absent:  "1.1.1.1:53".parse().unwrap(),
    };
    assert!(err.to_string().starts_with("mismatch"));
  }

  #[test]
  fn diagnostic_ignores_resolver_order_and_addresses() {
    let failure = |addr: &str, error| LookupFailure { resolver: addr.parse().unwrap(), error };
    let a = CheckError::Lookup {
      queried:  2,
      failures: vec![
        failure("8.8.8.8:53", QueryError::Timeout(Duration::from_secs(5))),
        failure("1.1.1.1:53", QueryError::ServerFailure(ResponseCode::Refused)),
      ],
    };
    let b = CheckError::Lookup {
      queried:  2,
      failures: vec![
        failure("9.9.9.9:53", QueryError::ServerFailure(ResponseCode::Refused)),
        failure("8.8.8.8:53", QueryError::Timeout(Duration::from_secs(5))),
      ],
    };
    assert_eq!(a.diagnostic(), b.diagnostic());
    assert!(a.diagnostic().starts_with("lookup failed on 2 of 2: "));
    assert!(!a.diagnostic().contains(":53"), "{}", a.diagnostic());
  }

  #[test]
  fn mismatch_diagnostic_is_fixed() {
    let one = CheckError::Mismatch {
      present: "9.9.9.9:53".parse().unwrap(),
      absent:  "1.1.1.1:53".parse().unwrap(),
    };
    let other = CheckError::Mismatch {
      present: "8.8.8.8:53".parse().unwrap(),
      absent:  "9.9.9.9:53".parse().unwrap(),
    };
    assert_eq!(one.diagnostic(), other.diagnostic());
    assert!(one.diagnostic().starts_with("mismatch"));
  }

  #[test]
  fn id_mismatch_summary_hides_ids() {
    let a = QueryError::IdMismatch { want: 1, got: 2 }.summary();
    let b = QueryError::IdMismatch { want: 300, got: 7 }.summary();
    assert_eq!(a, b);
  }
}
