//! Handlers for `/reports` endpoints, scoped to the open period.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reports` | Optional `?status=safe\|evacuating\|need_help\|unknown` |
//! | `GET`  | `/reports/{user_id}` | 404 if the member has not reported |
//! | `GET`  | `/reports/{user_id}/history` | Oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use muster_core::{
  report::{ReportHistory, ReportRow, Status},
  store::MusterStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, periods::open_period};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status: Option<String>,
}

impl ListParams {
  /// The requested filter; blank means none.
  pub fn status(&self) -> Result<Option<Status>, ApiError> {
    match self.status.as_deref().map(str::trim) {
      None | Some("") => Ok(None),
      Some(s) => Ok(Some(Status::parse(s)?)),
    }
  }
}

/// `GET /reports[?status=<status>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ReportRow>>, ApiError>
where
  S: MusterStore,
{
  let status = params.status()?;
  let period = open_period(store.as_ref()).await?;
  let rows = store
    .list_reports(period.period_id, status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /reports/{user_id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<ReportRow>, ApiError>
where
  S: MusterStore,
{
  let period = open_period(store.as_ref()).await?;
  let row = store
    .get_report_row(period.period_id, user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no report for {user_id}")))?;
  Ok(Json(row))
}

/// `GET /reports/{user_id}/history`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ReportHistory>>, ApiError>
where
  S: MusterStore,
{
  let period = open_period(store.as_ref()).await?;
  let history = store
    .report_history(period.period_id, user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(history))
}
