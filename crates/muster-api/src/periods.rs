//! Handlers for `/periods` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/periods/current` | Creates the first period if none is open |
//! | `POST` | `/periods/reset`   | Closes the open period and opens the next |

use std::sync::Arc;

use axum::{Json, extract::State};
use muster_core::{
  period::{Period, PeriodReset},
  store::MusterStore,
};

use crate::error::ApiError;

/// The open period, created on demand. Admin views always have one to show.
pub async fn open_period<S>(store: &S) -> Result<Period, ApiError>
where
  S: MusterStore,
{
  store
    .get_or_create_current_period()
    .await
    .map_err(ApiError::store)
}

/// `GET /periods/current`
pub async fn current<S>(State(store): State<Arc<S>>) -> Result<Json<Period>, ApiError>
where
  S: MusterStore,
{
  Ok(Json(open_period(store.as_ref()).await?))
}

/// Close the open period and open the next one.
pub async fn reset_period<S>(store: &S) -> Result<PeriodReset, ApiError>
where
  S: MusterStore,
{
  let reset = store.reset_period().await.map_err(ApiError::store)?;
  tracing::info!(
    closed = reset.closed.seq,
    opened = reset.opened.seq,
    "period reset"
  );
  Ok(reset)
}

/// `POST /periods/reset`
pub async fn reset<S>(State(store): State<Arc<S>>) -> Result<Json<PeriodReset>, ApiError>
where
  S: MusterStore,
{
  Ok(Json(reset_period(store.as_ref()).await?))
}
