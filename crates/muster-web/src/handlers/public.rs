//! The member check-in form.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/f` | `?ok=1` shows a confirmation banner |
//! | `POST` | `/public/report` | Redirects `303` to `/f?ok=1` |

use axum::{
  extract::{Query, State},
  response::{Html, Redirect},
  Form,
};
use muster_api::{ApiError, public::submit_report};
use muster_core::{
  member::{Grade, Identity},
  report::ReportDraft,
  store::MusterStore,
};
use serde::Deserialize;

use crate::{AppState, error::Error, handlers::status_options, html};

#[derive(Debug, Default, Deserialize)]
pub struct FormParams {
  pub ok: Option<String>,
}

/// `GET /f`
pub async fn form<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<FormParams>,
) -> Result<Html<String>, Error>
where
  S: MusterStore + Clone + 'static,
{
  let period = state
    .store
    .current_period()
    .await
    .map_err(ApiError::store)?;
  let roster = state
    .store
    .active_roster_by_grade()
    .await
    .map_err(ApiError::store)?;

  let mut body = String::new();
  if params.ok.as_deref() == Some("1") {
    body.push_str(&html::banner("Thank you, your report has been recorded."));
  }
  match &period {
    Some(p) => body.push_str(&format!(
      "<p>Reporting period #{} (since {})</p>",
      p.seq,
      html::datetime(p.started_at)
    )),
    None => body.push_str(&html::error_banner("Reporting is not open right now.")),
  }

  let grades: String = Grade::KNOWN
    .iter()
    .map(|g| format!(r#"<option value="{g}">{g}</option>"#))
    .collect();
  let names: String = roster
    .values()
    .flatten()
    .map(|n| format!(r#"<option value="{}">"#, html::escape(n)))
    .collect();

  body.push_str(&format!(
    r#"<form method="post" action="/public/report">
<label>Grade <select name="grade" required>{grades}</select></label>
<label>Name <input name="name" list="roster-names" required></label>
<datalist id="roster-names">{names}</datalist>
<label>Contact email <input name="email" type="email"></label>
<label>Status <select name="status" required>{statuses}</select></label>
<label>Shelter name <input name="shelter_name"></label>
<label>Shelter type <input name="shelter_type"></label>
<label>Shelter address <input name="shelter_addr"></label>
<label>Latitude <input name="shelter_lat" inputmode="decimal"></label>
<label>Longitude <input name="shelter_lng" inputmode="decimal"></label>
<label>Damage level <input name="damage_level"></label>
<label>Damage notes <textarea name="damage_notes"></textarea></label>
<p><button type="submit">Submit</button></p>
</form>"#,
    statuses = status_options(None, false),
  ));

  Ok(html::page("Safety check-in", &body))
}

/// Fields posted by the check-in form. `email` is a contact address; the
/// member is identified by grade and name.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitForm {
  pub grade:        Option<String>,
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub status:       Option<String>,
  pub shelter_name: Option<String>,
  pub shelter_type: Option<String>,
  pub shelter_addr: Option<String>,
  pub shelter_lat:  Option<String>,
  pub shelter_lng:  Option<String>,
  pub damage_level: Option<String>,
  pub damage_notes: Option<String>,
}

/// `POST /public/report`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  Form(form): Form<SubmitForm>,
) -> Result<Redirect, Error>
where
  S: MusterStore + Clone + 'static,
{
  let identity =
    Identity::from_parts(form.grade.as_deref(), form.name.as_deref(), None)?;
  let draft = ReportDraft {
    status:        form.status,
    contact_email: form.email,
    shelter_name:  form.shelter_name,
    shelter_type:  form.shelter_type,
    shelter_addr:  form.shelter_addr,
    shelter_lat:   form.shelter_lat,
    shelter_lng:   form.shelter_lng,
    damage_level:  form.damage_level,
    damage_notes:  form.damage_notes,
  };

  submit_report(state.store.as_ref(), identity, draft).await?;
  Ok(Redirect::to("/f?ok=1"))
}
