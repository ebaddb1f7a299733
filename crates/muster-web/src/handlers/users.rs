//! Roster maintenance: CSV upload, template download and removal.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/users` | Upload forms plus the active roster |
//! | `POST` | `/admin/users/upload` | Multipart `csvfile`, optional `replace` |
//! | `GET`  | `/admin/users/template.csv` | Example roster |
//! | `POST` | `/admin/users/delete_by_email` | Form field `email` |
//! | `POST` | `/admin/users/delete_csv` | Multipart `csvfile` with an `email` column |

use axum::{
  Form,
  extract::{Multipart, Query, State, multipart::MultipartError},
  http::header,
  response::{Html, IntoResponse, Redirect},
};
use muster_api::ApiError;
use muster_core::{member::parse_flag, store::MusterStore};
use serde::Deserialize;

use crate::{AppState, auth::AdminPage, error::Error, html, roster_csv};

#[derive(Debug, Default, Deserialize)]
pub struct UsersParams {
  pub created: Option<usize>,
  pub updated: Option<usize>,
  pub skipped: Option<usize>,
  pub removed: Option<usize>,
  pub err:     Option<String>,
}

/// `GET /admin/users`
pub async fn page<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  Query(params): Query<UsersParams>,
) -> Result<Html<String>, Error>
where
  S: MusterStore + Clone + 'static,
{
  let roster = state
    .store
    .active_roster_by_grade()
    .await
    .map_err(ApiError::store)?;

  let mut body = String::new();
  if let (Some(c), Some(u), Some(s)) = (params.created, params.updated, params.skipped) {
    body.push_str(&html::banner(&format!(
      "Imported: {c} created, {u} updated, {s} skipped."
    )));
  }
  if let Some(n) = params.removed {
    body.push_str(&html::banner(&format!("Removed {n} roster entries.")));
  }
  if params.err.as_deref() == Some("notfound") {
    body.push_str(&html::error_banner("No roster entry with that email."));
  }

  body.push_str(
    r#"<h2>Upload roster</h2>
<p>Columns: grade, name, email, dept, phone, group_name, is_active.
<a href="/admin/users/template.csv">Download a template</a>.</p>
<form method="post" action="/admin/users/upload" enctype="multipart/form-data">
<input type="file" name="csvfile" accept=".csv,text/csv" required>
<label><input type="checkbox" name="replace" value="true">
Replace: deactivate everyone not in this file</label>
<p><button type="submit">Upload</button></p>
</form>
<h2>Remove from roster</h2>
<form method="post" action="/admin/users/delete_by_email">
<label>Email <input name="email" type="email" required></label>
<p><button type="submit">Remove</button></p>
</form>
<form method="post" action="/admin/users/delete_csv" enctype="multipart/form-data">
<label>CSV with an email column <input type="file" name="csvfile" accept=".csv,text/csv" required></label>
<p><button type="submit">Remove listed</button></p>
</form>"#,
  );

  body.push_str("<h2>Active roster</h2>");
  for (grade, names) in &roster {
    let names: Vec<String> = names.iter().map(|n| html::escape(n)).collect();
    body.push_str(&format!(
      "<p><strong>{}</strong> ({}): {}</p>",
      html::escape(grade),
      names.len(),
      names.join(", ")
    ));
  }

  Ok(html::admin_page("Roster", &body))
}

fn bad_multipart(e: MultipartError) -> Error { Error::BadRequest(e.body_text()) }

/// The fields of an upload form.
#[derive(Default)]
struct Upload {
  file:    Option<Vec<u8>>,
  replace: bool,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, Error> {
  let mut upload = Upload::default();
  while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
    let name = field.name().unwrap_or_default().to_owned();
    match name.as_str() {
      "csvfile" => {
        upload.file = Some(field.bytes().await.map_err(bad_multipart)?.to_vec());
      }
      "replace" => {
        let value = field.text().await.map_err(bad_multipart)?;
        upload.replace = parse_flag(Some(&value), false);
      }
      _ => {}
    }
  }
  Ok(upload)
}

/// `POST /admin/users/upload`
pub async fn upload<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  multipart: Multipart,
) -> Result<Redirect, Error>
where
  S: MusterStore + Clone + 'static,
{
  let upload = read_upload(multipart).await?;
  let file = upload
    .file
    .ok_or_else(|| Error::BadRequest("csvfile is required".into()))?;
  let parsed = roster_csv::parse_roster(&file)?;

  let mut summary = state
    .store
    .import_roster(parsed.rows, upload.replace)
    .await
    .map_err(ApiError::store)?;
  summary.skipped += parsed.skipped;

  tracing::info!(
    created = summary.created,
    updated = summary.updated,
    skipped = summary.skipped,
    replace = upload.replace,
    "roster imported"
  );
  Ok(Redirect::to(&format!(
    "/admin/users?created={}&updated={}&skipped={}",
    summary.created, summary.updated, summary.skipped
  )))
}

/// `GET /admin/users/template.csv`
pub async fn template(_: AdminPage) -> Result<impl IntoResponse, Error> {
  let bytes = roster_csv::roster_template()?;
  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
      (
        header::CONTENT_DISPOSITION,
        r#"attachment; filename="roster_template.csv""#,
      ),
    ],
    bytes,
  ))
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
  pub email: String,
}

/// `POST /admin/users/delete_by_email`
pub async fn delete_by_email<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  Form(form): Form<DeleteForm>,
) -> Result<Redirect, Error>
where
  S: MusterStore + Clone + 'static,
{
  let removed = state
    .store
    .remove_from_roster(vec![form.email])
    .await
    .map_err(ApiError::store)?;
  if removed == 0 {
    return Ok(Redirect::to("/admin/users?err=notfound"));
  }
  tracing::info!(removed, "roster entries removed");
  Ok(Redirect::to(&format!("/admin/users?removed={removed}")))
}

/// `POST /admin/users/delete_csv`
pub async fn delete_csv<S>(
  _: AdminPage,
  State(state): State<AppState<S>>,
  multipart: Multipart,
) -> Result<Redirect, Error>
where
  S: MusterStore + Clone + 'static,
{
  let file = read_upload(multipart)
    .await?
    .file
    .ok_or_else(|| Error::BadRequest("csvfile is required".into()))?;
  let emails = roster_csv::parse_emails(&file)?;
  let removed = state
    .store
    .remove_from_roster(emails)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(removed, "roster entries removed");
  Ok(Redirect::to(&format!("/admin/users?removed={removed}")))
}
