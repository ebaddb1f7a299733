//! Unauthenticated endpoints used by members checking in.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/public/me` | `?grade=&name=` or `?email=`; 404 until the member reports |
//! | `GET`  | `/public/roster` | Active names grouped by grade |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Query, State},
};
use muster_core::{
  member::Identity,
  report::{Report, ReportDraft, Upserted},
  store::MusterStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct IdentityParams {
  pub grade: Option<String>,
  pub name:  Option<String>,
  pub email: Option<String>,
}

impl IdentityParams {
  pub fn identity(&self) -> Result<Identity, ApiError> {
    Ok(Identity::from_parts(
      self.grade.as_deref(),
      self.name.as_deref(),
      self.email.as_deref(),
    )?)
  }
}

// ─── Submit ───────────────────────────────────────────────────────────────────

/// Record a check-in for the member named by `identity` in the open period.
///
/// The member must exist and be on the active roster. Resubmitting replaces
/// the previous report wholesale. The period is resolved in the same
/// transaction as the write, so a concurrent reset cannot close it midway.
pub async fn submit_report<S>(
  store: &S,
  identity: Identity,
  draft: ReportDraft,
) -> Result<Upserted, ApiError>
where
  S: MusterStore,
{
  let fields = draft.into_fields()?;

  let member = store
    .find_member(identity)
    .await
    .map_err(ApiError::store)?
    .filter(|m| m.is_active())
    .ok_or_else(|| ApiError::BadRequest("member not found on the active roster".into()))?;

  let upserted = store
    .upsert_current_report(member.user.user_id, fields)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::Unavailable("no open period".into()))?;

  tracing::info!(
    period_id = %upserted.report.period_id,
    user_id = %member.user.user_id,
    status = %upserted.report.fields.status,
    created = upserted.created,
    "report recorded"
  );
  Ok(upserted)
}

// ─── Me ───────────────────────────────────────────────────────────────────────

/// `GET /public/me?grade=&name=` or `?email=`
pub async fn me<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<IdentityParams>,
) -> Result<Json<Report>, ApiError>
where
  S: MusterStore,
{
  let identity = params.identity()?;

  let period = store
    .current_period()
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no open period".into()))?;

  let member = store
    .find_member(identity)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("member not found".into()))?;

  let report = store
    .get_report(period.period_id, member.user.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no report in the current period".into()))?;
  Ok(Json(report))
}

// ─── Roster ───────────────────────────────────────────────────────────────────

/// `GET /public/roster`
pub async fn roster<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<BTreeMap<String, Vec<String>>>, ApiError>
where
  S: MusterStore,
{
  let roster = store
    .active_roster_by_grade()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(roster))
}
