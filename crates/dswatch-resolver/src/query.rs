//! The `DsQuerier` trait and the answer it produces.

use std::{future::Future, net::SocketAddr};

use crate::QueryError;

/// The DS records one resolver returned for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsAnswer {
  pub resolver: SocketAddr,
  /// DS records from the answer section, in presentation format.
  pub records:  Vec<String>,
}

impl DsAnswer {
  /// Whether the resolver reported at least one DS record.
  pub fn has_ds(&self) -> bool { !self.records.is_empty() }
}

/// Sends one DS query to one resolver.
pub trait DsQuerier: Send + Sync {
  fn query_ds<'a>(
    &'a self,
    resolver: SocketAddr,
    domain: &'a str,
  ) -> impl Future<Output = Result<DsAnswer, QueryError>> + Send + 'a;
}
