//! JSON read API for dswatch.
//!
//! Exposes an axum [`Router`] over any [`CheckStore`] and [`Prober`]. The
//! API never writes check records; the scheduler is the only writer.
//!
//! # Mounting
//!
//! The router is served at the root, e.g. `GET /domains/example.com`:
//!
//! ```rust,ignore
//! axum::serve(listener, dswatch_api::api_router(state))
//! ```

pub mod changes;
pub mod domains;
pub mod error;
pub mod lookup;
pub mod stats;

use std::sync::Arc;

use axum::{Router, routing::get};
use dswatch_core::{probe::Prober, store::CheckStore};

pub use error::ApiError;

/// Shared handler state.
pub struct AppState<S, P> {
  pub store:       Arc<S>,
  pub prober:      Arc<P>,
  /// `N` used by `/ratio` when the request does not name one.
  pub ratio_top_n: u32,
}

// Manual impl: `S` and `P` sit behind `Arc` and need not be `Clone`.
impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:       self.store.clone(),
      prober:      self.prober.clone(),
      ratio_top_n: self.ratio_top_n,
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P>(state: AppState<S, P>) -> Router<()>
where
  S: CheckStore + 'static,
  P: Prober + 'static,
{
  Router::new()
    // Domains
    .route("/domains/{name}", get(domains::get_one::<S, P>))
    .route("/domains/{name}/history", get(domains::history::<S, P>))
    // Change feed
    .route("/changes", get(changes::list::<S, P>))
    // Adoption
    .route("/ratio", get(stats::ratio::<S, P>))
    .route("/classes", get(stats::classes::<S, P>))
    // Diagnostics
    .route("/lookup/{name}", get(lookup::handler::<S, P>))
    .with_state(state)
}

/// Canonical form of a domain name taken from a URL.
pub(crate) fn normalize(name: &str) -> String {
  name.trim().trim_end_matches('.').to_ascii_lowercase()
}
