//! The probe loop.
//!
//! One probe is in flight at a time: a tick selects a domain, runs the
//! consensus check and records the verdict before the next tick can start.
//! The scheduler is therefore the store's only writer.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dswatch_core::{check::Recorded, domain::Domain, probe::Prober, store::CheckStore};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{Error, Result, Selector};

/// What one tick did.
#[derive(Debug)]
pub struct ProbeOutcome {
  pub domain:   Domain,
  pub recorded: Recorded,
}

pub struct Scheduler<S, P> {
  store:    Arc<S>,
  prober:   Arc<P>,
  selector: Selector,
  interval: Duration,
}

impl<S, P> Scheduler<S, P>
where
  S: CheckStore,
  P: Prober,
{
  pub fn new(store: Arc<S>, prober: Arc<P>, interval: Duration) -> Self {
    Self {
      store,
      prober,
      selector: Selector::new(),
      interval,
    }
  }

  pub fn with_selector(mut self, selector: Selector) -> Self {
    self.selector = selector;
    self
  }

  /// Probe one domain and record the verdict.
  ///
  /// Probe failures are part of the verdict, so only selection and storage
  /// errors surface here.
  pub async fn tick(&mut self) -> Result<ProbeOutcome> {
    let domain = self.selector.next(&*self.store).await?;
    debug!(domain = %domain.name, "probing");

    let verdict = self.prober.check(&domain.name).await;
    let recorded = self
      .store
      .record(domain.domain_id, verdict, Utc::now())
      .await
      .map_err(Error::store)?;

    Ok(ProbeOutcome { domain, recorded })
  }

  /// Tick every `interval` until `shutdown` is cancelled.
  ///
  /// The first tick fires one interval after start. Errors are logged and
  /// the loop carries on. Cancellation is observed between ticks; a probe
  /// already in flight runs to completion within its own query timeout.
  pub async fn run(mut self, shutdown: CancellationToken) {
    info!(interval = ?self.interval, "probe scheduler started");

    let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        biased;
        _ = shutdown.cancelled() => break,
        _ = ticker.tick() => match self.tick().await {
          Ok(ProbeOutcome { domain, recorded }) => info!(
            domain = %domain.name,
            state = ?recorded.record.verdict.state(),
            inserted = recorded.inserted,
            "probed"
          ),
          Err(e) => error!(error = %e, "probe tick failed"),
        },
      }
    }

    info!("probe scheduler stopped");
  }
}

#[cfg(test)]
mod tests {
  use std::{
    io,
    sync::atomic::{AtomicUsize, Ordering},
  };

  use dswatch_core::{
    check::{DomainState, Verdict},
    domain::CatalogEntry,
    probe::LookupReport,
  };
  use dswatch_store_sqlite::SqliteStore;

  use super::*;

  struct FixedProber {
    verdict: Verdict,
    calls:   AtomicUsize,
  }

  impl FixedProber {
    fn new(verdict: Verdict) -> Arc<Self> {
      Arc::new(Self { verdict, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  impl Prober for FixedProber {
    type Error = io::Error;

    async fn check(&self, _domain: &str) -> Verdict {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.verdict.clone()
    }

    async fn lookup(&self, _domain: &str) -> Result<LookupReport, io::Error> {
      Err(io::Error::other("not supported"))
    }
  }

  fn entries(n: u32) -> Vec<CatalogEntry> {
    (1..=n)
      .map(|rank| CatalogEntry::new(rank, format!("d{rank}.example")))
      .collect()
  }

  async fn seeded(n: u32) -> Arc<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.seed_catalog(entries(n)).await.unwrap();
    Arc::new(store)
  }

  #[tokio::test]
  async fn tick_records_the_verdict() {
    let store = seeded(3).await;
    let prober = FixedProber::new(Verdict::Signed);
    let mut scheduler = Scheduler::new(store.clone(), prober.clone(), Duration::from_secs(60));

    let outcome = scheduler.tick().await.unwrap();
    assert!(outcome.recorded.inserted);
    assert_eq!(prober.calls(), 1);

    let current = store.current(outcome.domain.domain_id).await.unwrap().unwrap();
    assert_eq!(current.verdict, Verdict::Signed);
  }

  #[tokio::test]
  async fn seeded_selector_gives_a_repeatable_order() {
    async fn order(seed: u64) -> Vec<String> {
      let store = seeded(5).await;
      let prober = FixedProber::new(Verdict::Signed);
      let mut scheduler = Scheduler::new(store, prober, Duration::from_secs(60))
        .with_selector(Selector::with_rng(fastrand::Rng::with_seed(seed)));

      let mut names = Vec::new();
      for _ in 0..5 {
        names.push(scheduler.tick().await.unwrap().domain.name);
      }
      names
    }

    let first = order(99).await;
    assert_eq!(first, order(99).await);
    assert!(first.iter().all(|n| n.ends_with(".example")));
  }

  #[tokio::test]
  async fn probe_errors_are_recorded_not_raised() {
    let store = seeded(1).await;
    let prober = FixedProber::new(Verdict::unknown("lookup failed on 2 of 2"));
    let mut scheduler = Scheduler::new(store.clone(), prober, Duration::from_secs(60));

    let outcome = scheduler.tick().await.unwrap();
    assert_eq!(outcome.recorded.record.verdict.state(), DomainState::Error);
  }

  #[tokio::test]
  async fn repeated_ticks_compact() {
    let store = seeded(1).await;
    let prober = FixedProber::new(Verdict::Unsigned);
    let mut scheduler = Scheduler::new(store.clone(), prober, Duration::from_secs(60));

    let first = scheduler.tick().await.unwrap();
    let second = scheduler.tick().await.unwrap();
    assert!(first.recorded.inserted);
    assert!(!second.recorded.inserted);
    assert_eq!(store.history(first.domain.domain_id).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn tick_on_empty_catalog_fails() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let prober = FixedProber::new(Verdict::Signed);
    let mut scheduler = Scheduler::new(store, prober.clone(), Duration::from_secs(60));

    assert!(matches!(scheduler.tick().await, Err(Error::NoCandidates)));
    assert_eq!(prober.calls(), 0);
  }

  #[tokio::test]
  async fn run_ticks_until_cancelled() {
    let store = seeded(3).await;
    let prober = FixedProber::new(Verdict::Signed);
    let scheduler = Scheduler::new(store, prober.clone(), Duration::from_millis(10));

    let token = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    time::timeout(Duration::from_secs(1), handle)
      .await
      .expect("scheduler stops promptly")
      .unwrap();

    assert!(prober.calls() >= 2, "only {} probes", prober.calls());
  }

  #[tokio::test]
  async fn cancel_interrupts_the_wait() {
    let store = seeded(3).await;
    let prober = FixedProber::new(Verdict::Signed);
    let scheduler = Scheduler::new(store, prober.clone(), Duration::from_secs(3600));

    let token = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(token.clone()));
    token.cancel();

    time::timeout(Duration::from_secs(1), handle)
      .await
      .expect("scheduler stops promptly")
      .unwrap();
    assert_eq!(prober.calls(), 0);
  }

  #[tokio::test]
  async fn failing_ticks_do_not_stop_the_loop() {
    // Starts empty, so early ticks fail with NoCandidates.
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let prober = FixedProber::new(Verdict::Signed);
    let scheduler = Scheduler::new(store.clone(), prober.clone(), Duration::from_millis(10));

    let token = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    store.seed_catalog(entries(2)).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while prober.calls() == 0 && Instant::now() < deadline {
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    token.cancel();
    handle.await.unwrap();

    assert!(prober.calls() > 0);
  }
}
