//! Admin guard: `X-Admin-Token` header or a signed session cookie.

use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, header, request::Parts},
  middleware::Next,
  response::{IntoResponse, Redirect, Response},
};
use muster_core::store::MusterStore;
use sha2::{Digest, Sha256};

use crate::{
  AppState, ServerConfig,
  error::Error,
  session::{self, COOKIE_NAME, SessionClaims},
};

pub const TOKEN_HEADER: &str = "x-admin-token";

/// Secrets the guard checks against.
#[derive(Clone)]
pub struct AuthConfig {
  /// SHA-256 of the shared admin token.
  token_digest:        Vec<u8>,
  secret_key:          Vec<u8>,
  pub session_max_age: i64,
}

impl AuthConfig {
  pub fn new(admin_token: &str, secret_key: &str, session_max_age: i64) -> Self {
    Self {
      token_digest: Sha256::digest(admin_token.as_bytes()).to_vec(),
      secret_key: secret_key.as_bytes().to_vec(),
      session_max_age,
    }
  }

  pub fn from_config(cfg: &ServerConfig) -> Self {
    Self::new(&cfg.admin_token, &cfg.secret_key, cfg.session_max_age_secs)
  }

  /// Compare digests so the comparison does not leak a prefix of the token.
  pub fn token_matches(&self, candidate: &str) -> bool {
    Sha256::digest(candidate.trim().as_bytes()).as_slice() == self.token_digest
  }

  /// A fresh admin session token valid for `session_max_age` seconds.
  pub fn issue_session(&self, now: i64) -> Result<String, Error> {
    let claims = SessionClaims { admin: true, exp: now + self.session_max_age };
    Ok(session::sign(&claims, &self.secret_key)?)
  }

  pub fn session_cookie(&self, token: &str) -> String {
    format!(
      "{COOKIE_NAME}={token}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
      self.session_max_age
    )
  }

  pub fn clear_cookie() -> String {
    format!("{COOKIE_NAME}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
  }
}

/// Value of cookie `name` from any `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(k, _)| *k == name)
    .map(|(_, v)| v)
}

/// Accept either proof of admin rights. A wrong token header does not void a
/// valid session cookie.
pub fn verify_admin(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let now = chrono::Utc::now().timestamp();

  let token = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
  if token.is_some_and(|t| config.token_matches(t)) {
    return Ok(());
  }

  let cookie = cookie_value(headers, COOKIE_NAME).ok_or(Error::Unauthorized)?;
  session::verify(cookie, &config.secret_key, now)
    .map(|_| ())
    .map_err(|e| {
      tracing::debug!(error = %e, "rejected admin session");
      Error::Unauthorized
    })
}

/// Middleware for the JSON admin API: 401 without proof.
pub async fn require_admin<S>(
  State(state): State<AppState<S>>,
  req: Request,
  next: Next,
) -> Response
where
  S: MusterStore + Clone + 'static,
{
  match verify_admin(req.headers(), &state.auth) {
    Ok(()) => next.run(req).await,
    Err(e) => e.into_response(),
  }
}

// ─── HTML pages ───────────────────────────────────────────────────────────────

/// Zero-size marker: present in a page handler means an admin is signed in.
/// Otherwise the browser is sent to the login page and back afterwards.
pub struct AdminPage;

impl<S> FromRequestParts<AppState<S>> for AdminPage
where
  S: MusterStore + Clone + 'static,
{
  type Rejection = Redirect;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match verify_admin(&parts.headers, &state.auth) {
      Ok(()) => Ok(AdminPage),
      Err(_) => {
        let next = parts
          .uri
          .path_and_query()
          .map_or("/admin", |pq| pq.as_str());
        Err(Redirect::to(&login_url(next)))
      }
    }
  }
}

pub fn login_url(next: &str) -> String {
  format!("/admin/login?next={}", encode_component(next))
}

/// Only same-site absolute paths may be used as a post-login target.
pub fn safe_next(next: Option<&str>) -> &str {
  match next {
    Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
    _ => "/admin",
  }
}

/// Percent-encode everything outside the unreserved set, keeping `/`.
fn encode_component(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for b in s.bytes() {
    match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
        out.push(b as char)
      }
      _ => out.push_str(&format!("%{b:02X}")),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn config() -> AuthConfig { AuthConfig::new("letmein", "secret", 3600) }

  fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (k, v) in pairs {
      map.append(*k, HeaderValue::from_str(v).unwrap());
    }
    map
  }

  #[test]
  fn token_header() {
    let cfg = config();
    assert!(verify_admin(&headers(&[(TOKEN_HEADER, "letmein")]), &cfg).is_ok());
    assert!(matches!(
      verify_admin(&headers(&[(TOKEN_HEADER, "wrong")]), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn missing_proof() {
    assert!(matches!(
      verify_admin(&HeaderMap::new(), &config()),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn session_cookie_round_trip() {
    let cfg = config();
    let token = cfg.issue_session(chrono::Utc::now().timestamp()).unwrap();
    let cookie = format!("theme=dark; {COOKIE_NAME}={token}");
    assert!(verify_admin(&headers(&[("cookie", &cookie)]), &cfg).is_ok());
  }

  #[test]
  fn session_cookie_survives_wrong_token_header() {
    let cfg = config();
    let token = cfg.issue_session(chrono::Utc::now().timestamp()).unwrap();
    let cookie = format!("{COOKIE_NAME}={token}");
    let h = headers(&[(TOKEN_HEADER, "stale"), ("cookie", &cookie)]);
    assert!(verify_admin(&h, &cfg).is_ok());

    let h = headers(&[(TOKEN_HEADER, "stale"), ("cookie", "admin_session=forged.00")]);
    assert!(matches!(verify_admin(&h, &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn expired_session_cookie() {
    let cfg = config();
    let token = cfg.issue_session(chrono::Utc::now().timestamp() - 7200).unwrap();
    let cookie = format!("{COOKIE_NAME}={token}");
    assert!(verify_admin(&headers(&[("cookie", &cookie)]), &cfg).is_err());
  }

  #[test]
  fn session_from_another_secret() {
    let token = AuthConfig::new("letmein", "other", 3600)
      .issue_session(chrono::Utc::now().timestamp())
      .unwrap();
    let cookie = format!("{COOKIE_NAME}={token}");
    assert!(verify_admin(&headers(&[("cookie", &cookie)]), &config()).is_err());
  }

  #[test]
  fn next_must_be_local() {
    assert_eq!(safe_next(Some("/admin/reports?status=safe")), "/admin/reports?status=safe");
    assert_eq!(safe_next(Some("//evil.example")), "/admin");
    assert_eq!(safe_next(Some("https://evil.example")), "/admin");
    assert_eq!(safe_next(Some("/\\evil.example")), "/admin");
    assert_eq!(safe_next(None), "/admin");
  }

  #[test]
  fn login_url_encodes_query() {
    assert_eq!(
      login_url("/admin/reports?status=need_help"),
      "/admin/login?next=/admin/reports%3Fstatus%3Dneed_help"
    );
  }
}
