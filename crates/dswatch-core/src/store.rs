//! The `CheckStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `dswatch-store-sqlite`).
//! The scheduler and the API depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  check::{CheckRecord, ClassRatio, Recorded, Transition, Verdict},
  domain::{CatalogEntry, Domain, DomainId, StaleDomain},
};

/// Abstraction over the catalog and the check history.
///
/// The prober is the only writer of check records. Writes for one domain are
/// atomic: [`record`](Self::record) reads the current row and decides between
/// update and insert inside a single transaction.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CheckStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Catalog ───────────────────────────────────────────────────────────

  /// Insert `entries` if the catalog is empty. Returns the number of domains
  /// inserted, or `0` if a catalog was already present.
  fn seed_catalog(
    &self,
    entries: Vec<CatalogEntry>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn catalog_size(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn domain_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Domain>, Self::Error>> + Send + 'a;

  /// Set the class of the domain called `name`. Errors if there is none.
  fn set_class(
    &self,
    name: String,
    class: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Domains ranked at or above `max_rank` that have no class, by rank.
  fn list_unclassed(
    &self,
    max_rank: u32,
  ) -> impl Future<Output = Result<Vec<Domain>, Self::Error>> + Send + '_;

  // ── Scheduling ────────────────────────────────────────────────────────

  /// The `limit` most overdue domains: never-checked first, then by oldest
  /// last check, ties broken by rank.
  fn stalest(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<StaleDomain>, Self::Error>> + Send + '_;

  // ── History — compacting writes ───────────────────────────────────────

  /// Record `verdict` for a domain observed at `at`.
  ///
  /// If the verdict equals the current record's, that record's `checked_at`
  /// is advanced to `at`; otherwise a new record is appended. `at` is clamped
  /// so `checked_at` never moves backwards.
  fn record(
    &self,
    domain_id: DomainId,
    verdict: Verdict,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Recorded, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The latest record for a domain, if it has ever been probed.
  fn current(
    &self,
    domain_id: DomainId,
  ) -> impl Future<Output = Result<Option<CheckRecord>, Self::Error>> + Send + '_;

  /// Every record for a domain, oldest first.
  fn history(
    &self,
    domain_id: DomainId,
  ) -> impl Future<Output = Result<Vec<CheckRecord>, Self::Error>> + Send + '_;

  /// The change feed: completed records whose DNSSEC state differs from the
  /// domain's previous completed record, newest first, at most `limit`.
  ///
  /// A domain's first record is not a change. Error records neither appear
  /// in the feed nor break the comparison between the records around them.
  fn transitions(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Transition>, Self::Error>> + Send + '_;

  /// Percentage (0–100) of the `top_n` best-ranked domains whose current
  /// record is [`Verdict::Signed`]. Unprobed and errored domains count as
  /// unsigned.
  fn ratio(
    &self,
    top_n: u32,
  ) -> impl Future<Output = Result<f64, Self::Error>> + Send + '_;

  /// [`ratio`](Self::ratio) broken down by class, for classed domains ranked
  /// at or above `max_rank`.
  fn class_ratios(
    &self,
    max_rank: u32,
  ) -> impl Future<Output = Result<Vec<ClassRatio>, Self::Error>> + Send + '_;
}
