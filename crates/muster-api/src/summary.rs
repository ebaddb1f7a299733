//! Handlers for `/summary` and `/absentees`.

use std::sync::Arc;

use axum::{Json, extract::State};
use muster_core::{
  store::MusterStore,
  summary::{Absentee, Summary},
};

use crate::{error::ApiError, periods::open_period};

/// `GET /summary`
pub async fn summary<S>(State(store): State<Arc<S>>) -> Result<Json<Summary>, ApiError>
where
  S: MusterStore,
{
  let period = open_period(store.as_ref()).await?;
  let summary = store
    .summary(period.period_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(summary))
}

/// `GET /absentees`
pub async fn absentees<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Absentee>>, ApiError>
where
  S: MusterStore,
{
  let period = open_period(store.as_ref()).await?;
  let absentees = store
    .absentees(period.period_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(absentees))
}
