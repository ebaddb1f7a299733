//! Admin dashboard, period reset and absentee list.

use axum::{
  extract::{Query, State},
  response::{Html, Redirect},
};
use muster_api::{
  ApiError,
  periods::{open_period, reset_period},
};
use muster_core::{store::MusterStore, summary::SummaryItem};
use serde::Deserialize;

use crate::{AppState, auth::AdminPage, error::Error, html};

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
  pub reset: Option<String>,
}

fn counts_table(items: &[SummaryItem]) -> String {
  let rows: String = items
    .iter()
    .map(|c| format!("<tr><td>{}</td><td>{}</td></tr>", c.status, c.n))
    .collect();
  format!("<table><tr><th>Status</th><th>Members</th></tr>{rows}</table>")
}

/// `GET /admin`
pub async fn dashboard<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  Query(params): Query<DashboardParams>,
) -> Result<Html<String>, Error>
where
  S: MusterStore + Clone + 'static,
{
  let period = open_period(state.store.as_ref()).await?;
  let summary = state
    .store
    .summary(period.period_id)
    .await
    .map_err(ApiError::store)?;

  let mut body = String::new();
  if params.reset.as_deref() == Some("1") {
    body.push_str(&html::banner("A new reporting period has started."));
  }
  body.push_str(&format!(
    "<p>Period #{} since {}. Active roster: {}.</p>",
    period.seq,
    html::datetime(period.started_at),
    summary.total_roster
  ));
  body.push_str(&counts_table(&summary.counts));

  if !summary.by_group.is_empty() {
    body.push_str("<h2>By group</h2>");
    for (group, items) in &summary.by_group {
      body.push_str(&format!("<h3>{}</h3>", html::escape(group)));
      body.push_str(&counts_table(items));
    }
  }

  body.push_str(
    r#"<form method="post" action="/admin/periods/reset"
      onsubmit="return confirm('Close this period and start a new one?')">
<p><button type="submit">Start a new period</button></p>
</form>"#,
  );

  Ok(html::admin_page("Dashboard", &body))
}

/// `POST /admin/periods/reset`
pub async fn reset<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
) -> Result<Redirect, Error>
where
  S: MusterStore + Clone + 'static,
{
  reset_period(state.store.as_ref()).await?;
  Ok(Redirect::to("/admin?reset=1"))
}

/// `GET /admin/absentees`
pub async fn absentees<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
) -> Result<Html<String>, Error>
where
  S: MusterStore + Clone + 'static,
{
  let period = open_period(state.store.as_ref()).await?;
  let absentees = state
    .store
    .absentees(period.period_id)
    .await
    .map_err(ApiError::store)?;

  let rows: String = absentees
    .iter()
    .map(|a| {
      format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        html::escape(a.grade.as_str()),
        html::escape(&a.name),
        html::opt(a.email.as_deref()),
        html::opt(a.group_name.as_deref()),
      )
    })
    .collect();

  let body = format!(
    "<p>Period #{}: {} active members have not reported.</p>
<table><tr><th>Grade</th><th>Name</th><th>Email</th><th>Group</th></tr>{rows}</table>",
    period.seq,
    absentees.len()
  );
  Ok(html::admin_page("Absentees", &body))
}
