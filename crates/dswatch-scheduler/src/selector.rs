//! Staleness Selector. Picks the next domain to probe.
//!
//! The most overdue domains form a small window and one of them is drawn at
//! random. A domain that fails forever then cannot hold every tick, and the
//! probe order stays unpredictable from the outside.

use dswatch_core::{domain::Domain, store::CheckStore};

use crate::{Error, Result};

/// How many of the most overdue domains are eligible on each tick.
pub const STALENESS_WINDOW: usize = 5;

pub struct Selector {
  rng:    fastrand::Rng,
  window: usize,
}

impl Selector {
  pub fn new() -> Self { Self::with_rng(fastrand::Rng::new()) }

  /// Use a caller-supplied randomness source, e.g. a seeded one in tests.
  pub fn with_rng(rng: fastrand::Rng) -> Self {
    Self { rng, window: STALENESS_WINDOW }
  }

  /// Draw one of `candidates` uniformly at random.
  pub fn choose<T>(&mut self, mut candidates: Vec<T>) -> Option<T> {
    if candidates.is_empty() {
      return None;
    }
    let i = self.rng.usize(..candidates.len());
    Some(candidates.swap_remove(i))
  }

  /// The next domain to probe.
  pub async fn next<S: CheckStore>(&mut self, store: &S) -> Result<Domain> {
    let candidates = store.stalest(self.window).await.map_err(Error::store)?;
    self
      .choose(candidates)
      .map(|c| c.domain)
      .ok_or(Error::NoCandidates)
  }
}

impl Default for Selector {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use chrono::{Duration, Utc};
  use dswatch_core::{check::Verdict, domain::CatalogEntry};
  use dswatch_store_sqlite::SqliteStore;

  use super::*;

  async fn seeded(n: u32) -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let entries = (1..=n)
      .map(|rank| CatalogEntry::new(rank, format!("d{rank}.example")))
      .collect();
    store.seed_catalog(entries).await.unwrap();
    store
  }

  async fn id_of(store: &SqliteStore, name: &str) -> i64 {
    store.domain_by_name(name).await.unwrap().unwrap().domain_id
  }

  #[test]
  fn choose_covers_the_whole_window() {
    let mut selector = Selector::with_rng(fastrand::Rng::with_seed(7));
    let mut seen = HashSet::new();
    for _ in 0..200 {
      seen.insert(selector.choose(vec![1, 2, 3, 4, 5]).unwrap());
    }
    assert_eq!(seen.len(), 5);
  }

  #[test]
  fn choose_from_nothing_is_none() {
    let mut selector = Selector::new();
    assert_eq!(selector.choose(Vec::<u8>::new()), None);
  }

  #[tokio::test]
  async fn empty_catalog_has_no_candidates() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let err = Selector::new().next(&store).await.unwrap_err();
    assert!(matches!(err, Error::NoCandidates));
  }

  #[tokio::test]
  async fn never_picks_the_freshest_of_six() {
    let store = seeded(6).await;
    let now = Utc::now();

    // d1..d5 checked 6h..2h ago, d6 just now.
    for rank in 1..=5 {
      let id = id_of(&store, &format!("d{rank}.example")).await;
      let at = now - Duration::hours(7 - i64::from(rank));
      store.record(id, Verdict::Unsigned, at).await.unwrap();
    }
    let fresh = id_of(&store, "d6.example").await;
    store.record(fresh, Verdict::Signed, now).await.unwrap();

    let mut selector = Selector::with_rng(fastrand::Rng::with_seed(42));
    for _ in 0..50 {
      let picked = selector.next(&store).await.unwrap();
      assert_ne!(picked.name, "d6.example");
    }
  }

  #[tokio::test]
  async fn unprobed_domains_come_first() {
    let store = seeded(7).await;
    let now = Utc::now();

    // Everything except d6 and d7 has been probed.
    for rank in 1..=5 {
      let id = id_of(&store, &format!("d{rank}.example")).await;
      store.record(id, Verdict::Signed, now).await.unwrap();
    }

    let mut selector = Selector::with_rng(fastrand::Rng::with_seed(1));
    let mut seen = HashSet::new();
    for _ in 0..100 {
      seen.insert(selector.next(&store).await.unwrap().name);
    }
    assert!(seen.contains("d6.example"));
    assert!(seen.contains("d7.example"));
    assert!(seen.len() <= STALENESS_WINDOW);
  }
}
