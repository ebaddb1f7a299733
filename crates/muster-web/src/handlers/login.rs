//! Admin sign-in and sign-out.

use axum::{
  Form,
  extract::{Query, State},
  http::header,
  response::{Html, IntoResponse, Redirect, Response},
};
use muster_core::store::MusterStore;
use serde::Deserialize;

use crate::{
  AppState,
  auth::{AuthConfig, safe_next},
  error::Error,
  html,
};

#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
  pub next: Option<String>,
  /// Set after a rejected attempt.
  pub e:    Option<String>,
}

/// `GET /admin/login`
pub async fn page(Query(params): Query<LoginParams>) -> Html<String> {
  let mut body = String::new();
  if params.e.is_some() {
    body.push_str(&html::error_banner("Invalid token."));
  }
  body.push_str(&format!(
    r#"<form method="post" action="/admin/login">
<input type="hidden" name="next" value="{next}">
<label>Admin token <input name="token" type="password" autofocus required></label>
<p><button type="submit">Sign in</button></p>
</form>"#,
    next = html::escape(safe_next(params.next.as_deref())),
  ));
  html::page("Admin sign-in", &body)
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
  pub token: String,
  pub next:  Option<String>,
}

/// `POST /admin/login`: sets the session cookie on success.
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  Form(form): Form<LoginForm>,
) -> Result<Response, Error>
where
  S: MusterStore + Clone + 'static,
{
  let next = safe_next(form.next.as_deref());

  if !state.auth.token_matches(&form.token) {
    tracing::warn!("rejected admin sign-in");
    let retry = format!("{}&e=1", crate::auth::login_url(next));
    return Ok(Redirect::to(&retry).into_response());
  }

  let token = state.auth.issue_session(chrono::Utc::now().timestamp())?;
  tracing::info!("admin signed in");
  Ok(
    (
      [(header::SET_COOKIE, state.auth.session_cookie(&token))],
      Redirect::to(next),
    )
      .into_response(),
  )
}

/// `GET /admin/logout`
pub async fn logout() -> impl IntoResponse {
  (
    [(header::SET_COOKIE, AuthConfig::clear_cookie())],
    Redirect::to("/admin/login"),
  )
}
