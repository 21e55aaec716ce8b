//! Consensus Checker — two independent resolvers must agree.
//!
//! A single resolver cannot tell an unsigned delegation from a stripped or
//! spoofed answer. Asking two and comparing only the presence of DS records
//! turns disagreement into a recorded error instead of a false "unsigned".

use dswatch_core::{
  check::Verdict,
  probe::{LookupReport, Prober},
};
use tracing::debug;

use crate::{
  error::LookupFailure, CheckError, DsAnswer, DsQuerier, Error, ResolverPool,
};

/// Resolvers consulted per check.
pub const QUORUM: usize = 2;

pub struct ConsensusChecker<Q, P> {
  querier: Q,
  pool:    P,
}

impl<Q, P> ConsensusChecker<Q, P>
where
  Q: DsQuerier,
  P: ResolverPool,
{
  /// Fails if `pool` cannot supply [`QUORUM`] distinct resolvers.
  pub fn new(querier: Q, pool: P) -> Result<Self, Error> {
    if pool.size() < QUORUM {
      return Err(Error::PoolTooSmall { have: pool.size(), need: QUORUM });
    }
    Ok(Self { querier, pool })
  }

  /// Query two resolvers concurrently and reconcile their answers.
  ///
  /// Both queries carry the querier's own timeout, so the wait is bounded by
  /// the slower of the two rather than their sum.
  pub async fn consensus(&self, domain: &str) -> Result<DsAnswer, CheckError> {
    let picked = self.pool.pick(QUORUM);
    let [first, second] = picked[..] else {
      return Err(CheckError::PoolTooSmall { have: picked.len(), need: QUORUM });
    };

    let (a, b) = tokio::join!(
      self.querier.query_ds(first, domain),
      self.querier.query_ds(second, domain),
    );

    match (a, b) {
      (Ok(a), Ok(b)) => reconcile(a, b),
      (a, b) => {
        let failures = [(first, a.err()), (second, b.err())]
          .into_iter()
          .filter_map(|(resolver, error)| {
            error.map(|error| LookupFailure { resolver, error })
          })
          .collect();
        Err(CheckError::Lookup { queried: QUORUM, failures })
      }
    }
  }

  /// Query a single random resolver, bypassing consensus.
  pub async fn lookup_one(&self, domain: &str) -> Result<DsAnswer, CheckError> {
    let Some(&resolver) = self.pool.pick(1).first() else {
      return Err(CheckError::PoolTooSmall { have: 0, need: 1 });
    };
    self
      .querier
      .query_ds(resolver, domain)
      .await
      .map_err(|error| CheckError::Lookup {
        queried:  1,
        failures: vec![LookupFailure { resolver, error }],
      })
  }
}

/// Compare presence only: resolvers may order records or attach signatures
/// differently, but must agree on whether a DS set exists.
fn reconcile(a: DsAnswer, b: DsAnswer) -> Result<DsAnswer, CheckError> {
  match (a.has_ds(), b.has_ds()) {
    (true, false) => Err(CheckError::Mismatch { present: a.resolver, absent: b.resolver }),
    (false, true) => Err(CheckError::Mismatch { present: b.resolver, absent: a.resolver }),
    _ => Ok(a),
  }
}

impl<Q, P> Prober for ConsensusChecker<Q, P>
where
  Q: DsQuerier,
  P: ResolverPool,
{
  type Error = CheckError;

  async fn check(&self, domain: &str) -> Verdict {
    match self.consensus(domain).await {
      Ok(answer) if answer.has_ds() => Verdict::Signed,
      Ok(_) => Verdict::Unsigned,
      Err(e) => {
        debug!(domain, error = %e, "no consensus");
        Verdict::unknown(e.diagnostic())
      }
    }
  }

  async fn lookup(&self, domain: &str) -> Result<LookupReport, CheckError> {
    let answer = self.lookup_one(domain).await?;
    Ok(LookupReport {
      domain:   domain.to_owned(),
      resolver: answer.resolver.to_string(),
      records:  answer.records,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    time::Duration,
  };

  use chrono::Utc;
  use dswatch_core::{domain::CatalogEntry, store::CheckStore};
  use dswatch_store_sqlite::SqliteStore;
  use hickory_proto::op::ResponseCode;
  use tokio::time::Instant;

  use super::*;
  use crate::{QueryError, ShuffledPool};

  /// How a scripted resolver answers.
  #[derive(Clone, Copy)]
  enum Reply {
    Ds,
    Empty,
    Timeout,
    Refused,
  }

  struct ScriptedQuerier {
    replies: HashMap<SocketAddr, Reply>,
    delay:   Duration,
  }

  impl DsQuerier for ScriptedQuerier {
    async fn query_ds(
      &self,
      resolver: SocketAddr,
      _domain: &str,
    ) -> Result<DsAnswer, QueryError> {
      tokio::time::sleep(self.delay).await;
      match self.replies[&resolver] {
        Reply::Ds => Ok(DsAnswer {
          resolver,
          records: vec!["example. 3600 IN DS 2371 13 2 ABCD".into()],
        }),
        Reply::Empty => Ok(DsAnswer { resolver, records: vec![] }),
        Reply::Timeout => Err(QueryError::Timeout(Duration::from_secs(5))),
        Reply::Refused => Err(QueryError::ServerFailure(ResponseCode::Refused)),
      }
    }
  }

  /// Always returns the first `k` endpoints in configured order.
  struct FixedPool(Vec<SocketAddr>);

  impl ResolverPool for FixedPool {
    fn pick(&self, k: usize) -> Vec<SocketAddr> {
      self.0.iter().copied().take(k).collect()
    }

    fn size(&self) -> usize { self.0.len() }
  }

  fn addr(last: u8) -> SocketAddr { SocketAddr::from(([192, 0, 2, last], 53)) }

  fn checker(a: Reply, b: Reply) -> ConsensusChecker<ScriptedQuerier, FixedPool> {
    let replies = HashMap::from([(addr(1), a), (addr(2), b)]);
    ConsensusChecker::new(
      ScriptedQuerier { replies, delay: Duration::ZERO },
      FixedPool(vec![addr(1), addr(2)]),
    )
    .unwrap()
  }

  #[tokio::test]
  async fn both_present_is_signed() {
    let v = checker(Reply::Ds, Reply::Ds).check("example.com").await;
    assert_eq!(v, Verdict::Signed);
    assert_eq!(v.error(), "");
  }

  #[tokio::test]
  async fn both_absent_is_unsigned() {
    let v = checker(Reply::Empty, Reply::Empty).check("example.com").await;
    assert_eq!(v, Verdict::Unsigned);
  }

  #[tokio::test]
  async fn disagreement_is_a_mismatch_not_unsigned() {
    for (a, b) in [(Reply::Ds, Reply::Empty), (Reply::Empty, Reply::Ds)] {
      let c = checker(a, b);
      let err = c.consensus("example.com").await.unwrap_err();
      assert!(matches!(err, CheckError::Mismatch { .. }));

      let v = c.check("example.com").await;
      assert_eq!(v.has_dnssec(), None);
      assert!(v.error().starts_with("mismatch"), "{}", v.error());
    }
  }

  #[tokio::test]
  async fn mismatch_names_the_resolvers() {
    let err = checker(Reply::Empty, Reply::Ds)
      .consensus("example.com")
      .await
      .unwrap_err();
    match err {
      CheckError::Mismatch { present, absent } => {
        assert_eq!(present, addr(2));
        assert_eq!(absent, addr(1));
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn one_failure_is_reported_alone() {
    let err = checker(Reply::Ds, Reply::Timeout)
      .consensus("example.com")
      .await
      .unwrap_err();
    match err {
      CheckError::Lookup { queried, failures } => {
        assert_eq!(queried, 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].resolver, addr(2));
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn both_failures_are_combined() {
    let v = checker(Reply::Timeout, Reply::Timeout).check("example.com").await;
    assert_eq!(v.error(), "lookup failed on 2 of 2: timed out after 5s; timed out after 5s");
  }

  #[tokio::test]
  async fn stored_error_does_not_depend_on_pick_order() {
    let a = checker(Reply::Timeout, Reply::Refused).check("example.com").await;
    let b = checker(Reply::Refused, Reply::Timeout).check("example.com").await;
    assert_eq!(a, b);
    assert!(!a.error().contains("192.0.2."), "{}", a.error());
  }

  /// Three resolvers, one of which is the odd one out, behind a seeded
  /// shuffled pool.
  fn shuffled(replies: [Reply; 3], seed: u64) -> ConsensusChecker<ScriptedQuerier, ShuffledPool> {
    let addrs = vec![addr(1), addr(2), addr(3)];
    let replies = addrs.iter().copied().zip(replies).collect();
    ConsensusChecker::new(
      ScriptedQuerier { replies, delay: Duration::ZERO },
      ShuffledPool::with_rng(addrs, fastrand::Rng::with_seed(seed)),
    )
    .unwrap()
  }

  #[tokio::test]
  async fn every_mismatch_reads_the_same() {
    let c = shuffled([Reply::Ds, Reply::Empty, Reply::Empty], 11);
    let mut errors = HashSet::new();
    for _ in 0..100 {
      let v = c.check("example.com").await;
      if v.has_dnssec().is_none() {
        errors.insert(v.error().to_owned());
      }
    }
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(
      errors.into_iter().next().unwrap(),
      "mismatch: resolvers disagree on DS presence"
    );
  }

  #[tokio::test]
  async fn persistent_failure_compacts_to_one_record() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .seed_catalog(vec![CatalogEntry::new(1, "example.com")])
      .await
      .unwrap();
    let domain = store.domain_by_name("example.com").await.unwrap().unwrap();

    let c = shuffled([Reply::Timeout, Reply::Timeout, Reply::Timeout], 3);
    let start = Utc::now();
    for i in 0..30 {
      let verdict = c.check("example.com").await;
      let at = start + chrono::Duration::seconds(i);
      store.record(domain.domain_id, verdict, at).await.unwrap();
    }

    let history = store.history(domain.domain_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].verdict.error().starts_with("lookup failed on 2 of 2"));
  }

  #[tokio::test(start_paused = true)]
  async fn queries_run_concurrently() {
    let replies = HashMap::from([(addr(1), Reply::Ds), (addr(2), Reply::Ds)]);
    let c = ConsensusChecker::new(
      ScriptedQuerier { replies, delay: Duration::from_secs(3) },
      FixedPool(vec![addr(1), addr(2)]),
    )
    .unwrap();

    let started = Instant::now();
    assert_eq!(c.check("example.com").await, Verdict::Signed);
    assert!(started.elapsed() < Duration::from_secs(6));
  }

  #[test]
  fn pool_of_one_is_rejected() {
    let replies = HashMap::new();
    let result = ConsensusChecker::new(
      ScriptedQuerier { replies, delay: Duration::ZERO },
      FixedPool(vec![addr(1)]),
    );
    assert!(matches!(result, Err(Error::PoolTooSmall { have: 1, need: 2 })));
  }

  #[tokio::test]
  async fn lookup_uses_a_single_resolver() {
    let report = checker(Reply::Ds, Reply::Empty)
      .lookup("example.com")
      .await
      .unwrap();
    assert_eq!(report.resolver, "192.0.2.1:53");
    assert_eq!(report.records.len(), 1);
  }
}
