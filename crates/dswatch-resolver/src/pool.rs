//! Resolver Pool — a fixed set of resolver endpoints.

use std::{
  collections::HashSet,
  net::{IpAddr, SocketAddr},
  sync::{Mutex, PoisonError},
};

use crate::Error;

/// Standard DNS port, used when a configured resolver omits one.
pub const DNS_PORT: u16 = 53;

/// Well-known public resolvers used when none are configured.
pub const DEFAULT_RESOLVERS: &[&str] = &["8.8.8.8:53", "1.1.1.1:53", "9.9.9.9:53"];

pub trait ResolverPool: Send + Sync {
  /// Return `k` distinct endpoints chosen uniformly at random without
  /// replacement. Returns fewer only if the pool itself holds fewer than `k`.
  fn pick(&self, k: usize) -> Vec<SocketAddr>;

  /// Number of configured endpoints.
  fn size(&self) -> usize;
}

/// Production pool: a shuffle over the configured endpoints.
///
/// The random source is injected so tests can seed it.
pub struct ShuffledPool {
  resolvers: Vec<SocketAddr>,
  rng:       Mutex<fastrand::Rng>,
}

impl ShuffledPool {
  pub fn new(resolvers: Vec<SocketAddr>) -> Self {
    Self::with_rng(resolvers, fastrand::Rng::new())
  }

  /// Duplicate endpoints are dropped so `pick` never returns one twice.
  pub fn with_rng(mut resolvers: Vec<SocketAddr>, rng: fastrand::Rng) -> Self {
    let mut seen = HashSet::new();
    resolvers.retain(|r| seen.insert(*r));
    Self { resolvers, rng: Mutex::new(rng) }
  }

  /// Build a pool from `host:port` or bare-IP strings.
  pub fn parse<I, S>(addrs: I) -> Result<Self, Error>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let resolvers = addrs
      .into_iter()
      .map(|a| parse_resolver(a.as_ref()))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self::new(resolvers))
  }

  pub fn resolvers(&self) -> &[SocketAddr] { &self.resolvers }
}

impl ResolverPool for ShuffledPool {
  fn pick(&self, k: usize) -> Vec<SocketAddr> {
    let mut order = self.resolvers.clone();
    self
      .rng
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .shuffle(&mut order);
    order.truncate(k);
    order
  }

  fn size(&self) -> usize { self.resolvers.len() }
}

/// Parse `8.8.8.8:53`, `[2001:4860:4860::8888]:53`, or a bare IP (port 53).
pub fn parse_resolver(s: &str) -> Result<SocketAddr, Error> {
  let s = s.trim();
  s.parse::<SocketAddr>()
    .or_else(|_| s.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, DNS_PORT)))
    .map_err(|_| Error::InvalidResolver(s.to_owned()))
}
