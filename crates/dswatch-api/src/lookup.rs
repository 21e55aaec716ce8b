//! Handler for `GET /lookup/{name}`.
//!
//! Asks one resolver for the DS set of any name, in the catalog or not.
//! Nothing is recorded.

use axum::{
  Json,
  extract::{Path, State},
};
use dswatch_core::{
  probe::{LookupReport, Prober},
  store::CheckStore,
};

use crate::{AppState, error::ApiError, normalize};

/// `GET /lookup/{name}`
pub async fn handler<S, P>(
  State(state): State<AppState<S, P>>,
  Path(name): Path<String>,
) -> Result<Json<LookupReport>, ApiError>
where
  S: CheckStore,
  P: Prober,
{
  let name = normalize(&name);
  if name.is_empty() {
    return Err(ApiError::BadRequest("empty domain name".into()));
  }
  let report = state
    .prober
    .lookup(&name)
    .await
    .map_err(|e| ApiError::Upstream(Box::new(e)))?;
  Ok(Json(report))
}
