//! Server-rendered pages and form endpoints.

pub mod admin;
pub mod login;
pub mod public;
pub mod reports;
pub mod users;

use axum::Json;
use serde_json::{Value, json};

/// `GET /`: liveness probe.
pub async fn index() -> Json<Value> {
  Json(json!({ "ok": true, "service": "muster", "version": 2 }))
}

/// A `<select>` of report statuses, preselecting `selected`.
pub(crate) fn status_options(selected: Option<&str>, with_any: bool) -> String {
  let mut out = String::new();
  if with_any {
    out.push_str(r#"<option value="">any</option>"#);
  }
  for status in muster_core::report::Status::ALL {
    let value = status.as_str();
    let sel = if selected == Some(value) { " selected" } else { "" };
    out.push_str(&format!(r#"<option value="{value}"{sel}>{value}</option>"#));
  }
  out
}
