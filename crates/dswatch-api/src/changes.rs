//! Handler for `GET /changes`, the DNSSEC change feed.

use axum::{
  Json,
  extract::{Query, State},
};
use dswatch_core::{check::Transition, probe::Prober, store::CheckStore};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

pub const DEFAULT_LIMIT: usize = 200;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, Default)]
pub struct ChangesParams {
  /// At most this many transitions, newest first. Capped at [`MAX_LIMIT`].
  pub limit: Option<usize>,
}

/// `GET /changes[?limit=N]`
pub async fn list<S, P>(
  State(state): State<AppState<S, P>>,
  Query(params): Query<ChangesParams>,
) -> Result<Json<Vec<Transition>>, ApiError>
where
  S: CheckStore,
  P: Prober,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let transitions = state
    .store
    .transitions(limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(transitions))
}
