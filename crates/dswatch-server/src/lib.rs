//! Wiring for the dswatch binary.
//!
//! Configuration, catalog input and the HTTP application live here so they
//! can be tested without starting the process.

use std::{
  fs::File,
  io,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use dswatch_api::{AppState, api_router};
use dswatch_core::{domain::CatalogEntry, probe::Prober, store::CheckStore};
use dswatch_resolver::pool::DEFAULT_RESOLVERS;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `DSWATCH_*`
/// environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// CSV of `rank,name` rows used to seed an empty catalog.
  pub catalog_path:       PathBuf,
  /// Probe interval override, e.g. `"90s"` or `"1m30s"`.
  pub check_interval:     Option<String>,
  pub resolvers:          Vec<String>,
  pub query_timeout_secs: u64,
  pub ratio_top_n:        u32,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "0.0.0.0".to_string(),
      port:               8080,
      store_path:         PathBuf::from("dswatch.db"),
      catalog_path:       PathBuf::from("tranco-5000.csv"),
      check_interval:     None,
      resolvers:          DEFAULT_RESOLVERS.iter().map(|r| r.to_string()).collect(),
      query_timeout_secs: 5,
      ratio_top_n:        1000,
    }
  }
}

impl ServerConfig {
  /// Layer `DSWATCH_*` environment variables over the optional file at
  /// `path`. `DSWATCH_RESOLVERS` is a comma-separated list.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("DSWATCH")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("resolvers"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn catalog_path(&self) -> PathBuf { expand_tilde(&self.catalog_path) }

  pub fn query_timeout(&self) -> Duration {
    Duration::from_secs(self.query_timeout_secs)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Catalog ──────────────────────────────────────────────────────────────────

/// Read `rank,name` rows. Rows with fewer than two fields are skipped; a rank
/// that is not a number is an error.
pub fn parse_catalog<R: io::Read>(input: R) -> anyhow::Result<Vec<CatalogEntry>> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(input);

  let mut entries = Vec::new();
  for (i, row) in reader.records().enumerate() {
    let line = i + 1;
    let row = row.with_context(|| format!("catalog line {line}"))?;
    let (Some(rank), Some(name)) = (row.get(0), row.get(1)) else {
      continue;
    };
    if name.is_empty() {
      continue;
    }
    let rank: u32 = rank
      .parse()
      .with_context(|| format!("catalog line {line}: bad rank {rank:?}"))?;
    entries.push(CatalogEntry::new(rank, name.to_ascii_lowercase()));
  }
  Ok(entries)
}

pub fn read_catalog(path: &Path) -> anyhow::Result<Vec<CatalogEntry>> {
  let file = File::open(path).with_context(|| format!("failed to open catalog {path:?}"))?;
  parse_catalog(file).with_context(|| format!("failed to read catalog {path:?}"))
}

// ─── Application ──────────────────────────────────────────────────────────────

/// The JSON API with request tracing.
pub fn app<S, P>(state: AppState<S, P>) -> Router
where
  S: CheckStore + 'static,
  P: Prober + 'static,
{
  api_router(state).layer(TraceLayer::new_for_http())
}
