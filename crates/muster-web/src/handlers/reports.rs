//! Report list, detail and CSV export for the open period.

use axum::{
  extract::{Path, Query, State},
  http::header,
  response::{Html, IntoResponse, Redirect, Response},
};
use muster_api::{ApiError, periods::open_period, reports::ListParams};
use muster_core::{report::HistoryDiff, store::MusterStore};
use uuid::Uuid;

use crate::{
  AppState, auth::AdminPage, error::Error, handlers::status_options, html, roster_csv,
};

/// `GET /admin/reports[?status=]`
pub async fn list<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Html<String>, Error>
where
  S: MusterStore + Clone + 'static,
{
  let status = params.status()?;
  let period = open_period(state.store.as_ref()).await?;
  let rows = state
    .store
    .list_reports(period.period_id, status)
    .await
    .map_err(ApiError::store)?;

  let selected = status.map(|s| s.as_str());
  let export = match selected {
    Some(s) => format!("/admin/reports/export?status={s}"),
    None => "/admin/reports/export".to_owned(),
  };

  let table: String = rows
    .iter()
    .map(|r| {
      format!(
        r#"<tr><td><a href="/admin/reports/{id}">{name}</a></td><td>{grade}</td><td>{group}</td><td>{status}</td><td>{shelter}</td><td>{damage}</td><td>{at}</td></tr>"#,
        id = r.user_id,
        name = html::escape(&r.name),
        grade = html::escape(r.grade.as_str()),
        group = html::opt(r.group_name.as_deref()),
        status = r.fields.status,
        shelter = html::opt(r.fields.shelter_name.as_deref()),
        damage = html::opt(r.fields.damage_level.as_deref()),
        at = html::datetime(r.updated_at),
      )
    })
    .collect();

  let body = format!(
    r#"<form method="get" action="/admin/reports">
<label>Status <select name="status">{options}</select></label>
<button type="submit">Filter</button>
<a href="{export}">Export CSV</a>
</form>
<p>Period #{seq}: {count} reports.</p>
<table><tr><th>Name</th><th>Grade</th><th>Group</th><th>Status</th><th>Shelter</th><th>Damage</th><th>Updated</th></tr>{table}</table>"#,
    options = status_options(selected, true),
    seq = period.seq,
    count = rows.len(),
  );
  Ok(html::admin_page("Reports", &body))
}

/// `GET /admin/reports/{user_id}`: back to the list if there is no report.
pub async fn detail<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<Response, Error>
where
  S: MusterStore + Clone + 'static,
{
  let period = open_period(state.store.as_ref()).await?;
  let Some(r) = state
    .store
    .get_report_row(period.period_id, user_id)
    .await
    .map_err(ApiError::store)?
  else {
    return Ok(Redirect::to("/admin/reports").into_response());
  };
  let history = state
    .store
    .report_history(period.period_id, user_id)
    .await
    .map_err(ApiError::store)?;

  let f = &r.fields;
  let fields = [
    ("Grade", html::escape(r.grade.as_str())),
    ("Email", html::opt(r.email.as_deref())),
    ("Group", html::opt(r.group_name.as_deref())),
    ("Status", f.status.to_string()),
    ("Contact email", html::opt(f.contact_email.as_deref())),
    ("Shelter name", html::opt(f.shelter_name.as_deref())),
    ("Shelter type", html::opt(f.shelter_type.as_deref())),
    ("Shelter address", html::opt(f.shelter_addr.as_deref())),
    ("Latitude", html::opt(f.shelter_lat)),
    ("Longitude", html::opt(f.shelter_lng)),
    ("Damage level", html::opt(f.damage_level.as_deref())),
    ("Damage notes", html::opt(f.damage_notes.as_deref())),
    ("Updated", html::datetime(r.updated_at)),
  ];
  let rows: String = fields
    .iter()
    .map(|(k, v)| format!("<tr><th>{k}</th><td>{v}</td></tr>"))
    .collect();

  let changes: String = history
    .iter()
    .map(|h| {
      let changed = h
        .diff
        .as_deref()
        .and_then(|d| serde_json::from_str::<HistoryDiff>(d).ok())
        .map_or_else(|| "-".to_owned(), |d| html::escape(&d.changed.join(", ")));
      format!("<li>{}: {changed}</li>", html::datetime(h.changed_at))
    })
    .collect();

  let body = format!(
    "<table>{rows}</table>\n<h2>Earlier submissions</h2>\n<ul>{changes}</ul>\n\
     <p><a href=\"/admin/reports\">Back</a></p>"
  );
  Ok(html::admin_page(&r.name, &body).into_response())
}

/// `GET /admin/reports/export[?status=]`
pub async fn export<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Response, Error>
where
  S: MusterStore + Clone + 'static,
{
  let status = params.status()?;
  let period = open_period(state.store.as_ref()).await?;
  let rows = state
    .store
    .list_reports(period.period_id, status)
    .await
    .map_err(ApiError::store)?;
  let bytes = roster_csv::export_reports(&rows)?;

  let disposition = format!(r#"attachment; filename="reports_period_{}.csv""#, period.seq);
  Ok(
    (
      [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
        (header::CONTENT_DISPOSITION, disposition),
      ],
      bytes,
    )
      .into_response(),
  )
}
