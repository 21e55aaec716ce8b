//! Domain — a catalog entry the prober samples.
//!
//! Domains are created once when the catalog is seeded and never deleted.
//! Only `class` may change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable surrogate key of a [`Domain`].
pub type DomainId = i64;

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
  pub domain_id: DomainId,
  /// Fully-qualified domain name, unique across the catalog.
  pub name:      String,
  /// Popularity rank; 1 is the most popular.
  pub rank:      u32,
  /// Free-text category. Irrelevant to probing.
  pub class:     Option<String>,
}

/// One row of catalog input, before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
  pub rank: u32,
  pub name: String,
}

impl CatalogEntry {
  pub fn new(rank: u32, name: impl Into<String>) -> Self {
    Self { rank, name: name.into() }
  }
}

/// A domain paired with the time it was last probed, as ranked by
/// [`CheckStore::stalest`](crate::store::CheckStore::stalest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleDomain {
  pub domain:          Domain,
  /// `None` if the domain has never been probed.
  pub last_checked_at: Option<DateTime<Utc>>,
}
