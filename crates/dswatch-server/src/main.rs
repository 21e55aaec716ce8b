//! dswatch binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, seeds an empty catalog from CSV, then either runs a catalog
//! maintenance command or probes the catalog in the background while serving
//! the JSON API.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use dswatch_api::AppState;
use dswatch_core::{
  class::{parse_class_map, parse_class_setting},
  probe::Prober,
  store::CheckStore,
};
use dswatch_resolver::{ConsensusChecker, ShuffledPool, WireQuerier};
use dswatch_scheduler::{Scheduler, probe_interval};
use dswatch_server::{ServerConfig, read_catalog};
use dswatch_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

/// Domains considered by the class maintenance commands.
const CLASSED_TOP_N: u32 = 1000;

type Checker = ConsensusChecker<WireQuerier, ShuffledPool>;

#[derive(Parser)]
#[command(author, version, about = "DNSSEC adoption prober")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Probe the catalog in the background and serve the JSON API (default).
  Serve,
  /// Set classes in bulk from a `{"Class": ["domain", ...]}` JSON file.
  UpdateClasses { path: PathBuf },
  /// Print the top-ranked domains that have no class.
  ListUnclassed,
  /// Set one domain's class from a `domain,xyz` setting, e.g. `example.com,fin`.
  SetClass { setting: String },
  /// Ask a single resolver for a domain's DS records.
  Lookup { domain: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  // Lookups touch neither the store nor the catalog.
  if let Some(Command::Lookup { domain }) = &cli.command {
    return lookup(&cfg, domain).await;
  }

  let store_path = cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  seed_if_empty(&store, &cfg).await?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(cfg, store).await,
    Command::UpdateClasses { path } => update_classes(&store, &path).await,
    Command::ListUnclassed => list_unclassed(&store).await,
    Command::SetClass { setting } => set_class(&store, &setting).await,
    Command::Lookup { .. } => Ok(()),
  }
}

async fn seed_if_empty(store: &SqliteStore, cfg: &ServerConfig) -> anyhow::Result<()> {
  if store.catalog_size().await? > 0 {
    return Ok(());
  }
  let entries = read_catalog(&cfg.catalog_path())?;
  let inserted = store.seed_catalog(entries).await.context("failed to seed catalog")?;
  info!(inserted, "seeded catalog");
  Ok(())
}

fn checker(cfg: &ServerConfig) -> anyhow::Result<Checker> {
  let pool = ShuffledPool::parse(&cfg.resolvers).context("invalid resolver list")?;
  let checker = ConsensusChecker::new(WireQuerier::new(cfg.query_timeout()), pool)
    .context("invalid resolver list")?;
  Ok(checker)
}

// ─── Serve ────────────────────────────────────────────────────────────────────

async fn serve(cfg: ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let store = Arc::new(store);
  let prober = Arc::new(checker(&cfg)?);

  let catalog_size = store.catalog_size().await?;
  let interval = probe_interval(catalog_size, cfg.check_interval.as_deref())
    .context("cannot start the probe scheduler")?;

  let shutdown = CancellationToken::new();
  let scheduler = Scheduler::new(store.clone(), prober.clone(), interval);
  let probing = tokio::spawn(scheduler.run(shutdown.child_token()));

  let app = dswatch_server::app(AppState {
    store,
    prober,
    ratio_top_n: cfg.ratio_top_n,
  });
  let address = cfg.address();

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(ctrl_c())
    .await
    .context("server error")?;

  shutdown.cancel();
  probing.await.context("probe scheduler panicked")?;
  info!("Shutdown complete");
  Ok(())
}

async fn ctrl_c() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(error = %e, "cannot listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!("Shutting down");
}

// ─── Catalog maintenance ──────────────────────────────────────────────────────

async fn update_classes(store: &SqliteStore, path: &std::path::Path) -> anyhow::Result<()> {
  let json = std::fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
  let pairs = parse_class_map(&json).with_context(|| format!("failed to parse {path:?}"))?;

  for (name, class) in pairs {
    match store.set_class(name.clone(), class.clone()).await {
      Ok(()) => info!(domain = %name, %class, "set class"),
      Err(dswatch_store_sqlite::Error::Core(dswatch_core::Error::DomainNotFound(_))) => {
        warn!(domain = %name, "not in catalog, skipped");
      }
      Err(e) => return Err(e).context("failed to set class"),
    }
  }
  Ok(())
}

async fn list_unclassed(store: &SqliteStore) -> anyhow::Result<()> {
  for domain in store.list_unclassed(CLASSED_TOP_N).await? {
    println!("{}", domain.name);
  }
  Ok(())
}

async fn set_class(store: &SqliteStore, setting: &str) -> anyhow::Result<()> {
  let (name, class) = parse_class_setting(setting)?;
  store
    .set_class(name.clone(), class.to_string())
    .await
    .with_context(|| format!("failed to set class of {name}"))?;
  info!(domain = %name, class, "set class");
  Ok(())
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

async fn lookup(cfg: &ServerConfig, domain: &str) -> anyhow::Result<()> {
  let report = checker(cfg)?.lookup(domain).await?;
  println!("{} via {}", report.domain, report.resolver);
  if report.records.is_empty() {
    println!("no DS records");
  }
  for record in &report.records {
    println!("{record}");
  }
  Ok(())
}
