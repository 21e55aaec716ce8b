//! The `Prober` trait — the seam between scheduling and DNS.
//!
//! Implemented by the consensus checker in `dswatch-resolver`. The scheduler
//! and the API depend on this abstraction so they can be tested with stubs.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::check::Verdict;

/// DS records seen by a single resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupReport {
  pub domain:   String,
  pub resolver: String,
  /// DS records in presentation format. Empty if the domain has none.
  pub records:  Vec<String>,
}

pub trait Prober: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Probe `domain` and reduce the answers to one [`Verdict`].
  ///
  /// Never fails: resolver errors are reported as [`Verdict::Unknown`] so the
  /// caller always has something well-formed to record.
  fn check<'a>(
    &'a self,
    domain: &'a str,
  ) -> impl Future<Output = Verdict> + Send + 'a;

  /// Ask a single resolver for the DS set of `domain`.
  ///
  /// A diagnostic shortcut: no consensus, nothing recorded.
  fn lookup<'a>(
    &'a self,
    domain: &'a str,
  ) -> impl Future<Output = Result<LookupReport, Self::Error>> + Send + 'a;
}
