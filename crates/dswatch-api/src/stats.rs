//! Adoption statistics.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/ratio` | Optional `?top=N`; defaults to the configured N |
//! | `GET`  | `/classes` | Per-class ratio over the same top N |

use axum::{
  Json,
  extract::{Query, State},
};
use dswatch_core::{check::ClassRatio, probe::Prober, store::CheckStore};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct RatioParams {
  pub top: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Ratio {
  pub top:     u32,
  /// 0–100.
  pub percent: f64,
}

/// `GET /ratio[?top=N]`
pub async fn ratio<S, P>(
  State(state): State<AppState<S, P>>,
  Query(params): Query<RatioParams>,
) -> Result<Json<Ratio>, ApiError>
where
  S: CheckStore,
  P: Prober,
{
  let top = params.top.unwrap_or(state.ratio_top_n);
  if top == 0 {
    return Err(ApiError::BadRequest("top must be at least 1".into()));
  }
  let percent = state.store.ratio(top).await.map_err(ApiError::store)?;
  Ok(Json(Ratio { top, percent }))
}

/// `GET /classes`
pub async fn classes<S, P>(
  State(state): State<AppState<S, P>>,
) -> Result<Json<Vec<ClassRatio>>, ApiError>
where
  S: CheckStore,
  P: Prober,
{
  let ratios = state
    .store
    .class_ratios(state.ratio_top_n)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ratios))
}
