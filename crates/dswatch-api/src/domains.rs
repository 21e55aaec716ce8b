//! Handlers for `/domains` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/domains/{name}` | Domain, its current record and state; 404 if not in the catalog |
//! | `GET`  | `/domains/{name}/history` | Every record, oldest first |

use axum::{
  Json,
  extract::{Path, State},
};
use dswatch_core::{
  check::{CheckRecord, DomainState},
  domain::Domain,
  probe::Prober,
  store::CheckStore,
};
use serde::Serialize;

use crate::{AppState, error::ApiError, normalize};

#[derive(Debug, Serialize)]
pub struct DomainStatus {
  #[serde(flatten)]
  pub domain:  Domain,
  pub state:   DomainState,
  /// `None` until the domain has been probed.
  pub current: Option<CheckRecord>,
}

#[derive(Debug, Serialize)]
pub struct DomainHistory {
  #[serde(flatten)]
  pub domain:  Domain,
  pub records: Vec<CheckRecord>,
}

async fn find<S: CheckStore>(store: &S, name: &str) -> Result<Domain, ApiError> {
  let name = normalize(name);
  store
    .domain_by_name(&name)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("domain {name} not in catalog")))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /domains/{name}`
pub async fn get_one<S, P>(
  State(state): State<AppState<S, P>>,
  Path(name): Path<String>,
) -> Result<Json<DomainStatus>, ApiError>
where
  S: CheckStore,
  P: Prober,
{
  let domain = find(&*state.store, &name).await?;
  let current = state
    .store
    .current(domain.domain_id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(DomainStatus {
    state: DomainState::of(current.as_ref()),
    domain,
    current,
  }))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /domains/{name}/history`
pub async fn history<S, P>(
  State(state): State<AppState<S, P>>,
  Path(name): Path<String>,
) -> Result<Json<DomainHistory>, ApiError>
where
  S: CheckStore,
  P: Prober,
{
  let domain = find(&*state.store, &name).await?;
  let records = state
    .store
    .history(domain.domain_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(DomainHistory { domain, records }))
}
