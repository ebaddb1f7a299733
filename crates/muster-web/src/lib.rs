//! HTTP front end for Muster.
//!
//! Serves the public check-in form, the session-guarded admin pages, and the
//! JSON API from `muster-api`, all backed by any [`MusterStore`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod html;
pub mod roster_csv;
pub mod session;

pub use error::Error;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{
  Router, middleware,
  routing::{get, post},
};
use muster_core::store::MusterStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
use handlers::{admin, login, public, reports, users};

// ─── Configuration ────────────────────────────────────────────────────────────

pub const DEFAULT_ADMIN_TOKEN: &str = "changeme";
pub const DEFAULT_SECRET_KEY: &str = "dev-secret-change-me";

/// Runtime server configuration: built-in defaults, then `config.toml`, then
/// `MUSTER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  /// A file path, optionally prefixed with `sqlite://`.
  pub database_url:         String,
  pub admin_token:          String,
  pub secret_key:           String,
  pub session_max_age_secs: i64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                 "127.0.0.1".to_owned(),
      port:                 8000,
      database_url:         "muster.db".to_owned(),
      admin_token:          DEFAULT_ADMIN_TOKEN.to_owned(),
      secret_key:           DEFAULT_SECRET_KEY.to_owned(),
      session_max_age_secs: 12 * 60 * 60,
    }
  }
}

impl ServerConfig {
  /// Layer the optional TOML file at `path` and the environment over the
  /// defaults.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    let defaults = Self::default();
    config::Config::builder()
      .set_default("host", defaults.host)?
      .set_default("port", i64::from(defaults.port))?
      .set_default("database_url", defaults.database_url)?
      .set_default("admin_token", defaults.admin_token)?
      .set_default("secret_key", defaults.secret_key)?
      .set_default("session_max_age_secs", defaults.session_max_age_secs)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("MUSTER"))
      .build()?
      .try_deserialize()
  }

  /// The SQLite file named by `database_url`, with `~/` expanded.
  pub fn database_path(&self) -> PathBuf {
    let raw = self
      .database_url
      .strip_prefix("sqlite://")
      .unwrap_or(&self.database_url);
    expand_tilde(Path::new(raw))
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var("HOME")) {
    (Ok(rest), Ok(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: MusterStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

impl<S: MusterStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      store:  Arc::new(store),
      auth:   Arc::new(AuthConfig::from_config(&config)),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MusterStore + Clone + 'static,
{
  let admin_api = muster_api::admin_router(state.store.clone()).route_layer(
    middleware::from_fn_with_state(state.clone(), auth::require_admin::<S>),
  );

  Router::new()
    .route("/",                             get(handlers::index))
    // Public form
    .route("/f",                            get(public::form::<S>))
    .route("/public/report",                post(public::submit::<S>))
    // Admin session
    .route("/admin/login",                  get(login::page).post(login::submit::<S>))
    .route("/admin/logout",                 get(login::logout))
    // Admin pages
    .route("/admin",                        get(admin::dashboard::<S>))
    .route("/admin/periods/reset",          post(admin::reset::<S>))
    .route("/admin/absentees",              get(admin::absentees::<S>))
    .route("/admin/users",                  get(users::page::<S>))
    .route("/admin/users/upload",           post(users::upload::<S>))
    .route("/admin/users/template.csv",     get(users::template))
    .route("/admin/users/delete_by_email",  post(users::delete_by_email::<S>))
    .route("/admin/users/delete_csv",       post(users::delete_csv::<S>))
    .route("/admin/reports",                get(reports::list::<S>))
    .route("/admin/reports/export",         get(reports::export::<S>))
    .route("/admin/reports/{user_id}",      get(reports::detail::<S>))
    .with_state(state.clone())
    .nest("/admin/api", admin_api)
    .merge(muster_api::public_router(state.store))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use muster_core::member::{Grade, RosterImportRow};
  use muster_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;

  const TOKEN: &str = "test-token";

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.get_or_create_current_period().await.unwrap();
    AppState::new(store, ServerConfig {
      admin_token: TOKEN.to_owned(),
      secret_key: "test-secret".to_owned(),
      ..ServerConfig::default()
    })
  }

  async fn with_roster(state: &AppState<SqliteStore>) {
    let mut alice = RosterImportRow::new(Some(Grade::normalize("Staff")), "Alice");
    alice.email = Some("alice@example.com".into());
    let mut bob = RosterImportRow::new(Some(Grade::normalize("Doctor")), "Bob");
    bob.is_active = false;
    state.store.import_roster(vec![alice, bob], false).await.unwrap();
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    impl Into<Body>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(body.into()).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  fn form() -> (header::HeaderName, &'static str) {
    (header::CONTENT_TYPE, "application/x-www-form-urlencoded")
  }

  fn admin_token() -> (header::HeaderName, &'static str) {
    (header::HeaderName::from_static("x-admin-token"), TOKEN)
  }

  fn location(resp: &Response) -> &str {
    resp.headers().get(header::LOCATION).unwrap().to_str().unwrap()
  }

  async fn json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
  }

  async fn sign_in(state: &AppState<SqliteStore>) -> String {
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/login",
      vec![form()],
      format!("token={TOKEN}&next=/admin/reports"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin/reports");
    let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("HttpOnly"), "{cookie}");
    cookie.split(';').next().unwrap().to_owned()
  }

  // ── Public ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn index_reports_service() {
    let resp = oneshot_raw(make_state().await, "GET", "/", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "muster");
  }

  #[tokio::test]
  async fn form_page_renders() {
    let state = make_state().await;
    with_roster(&state).await;
    let resp = oneshot_raw(state, "GET", "/f?ok=1", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = text(resp).await;
    assert!(page.contains("recorded"));
    assert!(page.contains(r#"<option value="Alice">"#));
    assert!(!page.contains(r#"<option value="Bob">"#));
  }

  #[tokio::test]
  async fn submit_then_me_then_reset() {
    let state = make_state().await;
    with_roster(&state).await;

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/public/report",
      vec![form()],
      "grade=staff&name=Alice&email=a%40home.example&status=evacuating&shelter_name=Gym&shelter_lat=35.1",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/f?ok=1");

    let resp =
      oneshot_raw(state.clone(), "GET", "/public/me?grade=Staff&name=Alice", vec![], "")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json(resp).await;
    assert_eq!(me["status"], "evacuating");
    assert_eq!(me["contact_email"], "a@home.example");
    assert_eq!(me["shelter_lat"], 35.1);

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/api/periods/reset",
      vec![admin_token()],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reset = json(resp).await;
    assert_eq!(reset["opened"]["seq"], 2);

    let resp =
      oneshot_raw(state, "GET", "/public/me?grade=Staff&name=Alice", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn resubmission_appends_history() {
    let state = make_state().await;
    with_roster(&state).await;
    for status in ["safe", "need_help", "safe"] {
      let resp = oneshot_raw(
        state.clone(),
        "POST",
        "/public/report",
        vec![form()],
        format!("grade=Staff&name=Alice&status={status}"),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    let resp =
      oneshot_raw(state.clone(), "GET", "/admin/api/reports", vec![admin_token()], "")
        .await;
    let rows = json(resp).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    let user_id = rows[0]["user_id"].as_str().unwrap().to_owned();

    let resp = oneshot_raw(
      state,
      "GET",
      &format!("/admin/api/reports/{user_id}/history"),
      vec![admin_token()],
      "",
    )
    .await;
    assert_eq!(json(resp).await.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn submit_rejects_inactive_and_unknown_members() {
    let state = make_state().await;
    with_roster(&state).await;
    for body in [
      "grade=Doctor&name=Bob&status=safe",
      "grade=Staff&name=Nobody&status=safe",
      "grade=Staff&name=Alice&status=fine",
      "grade=Staff&name=Alice&status=safe&shelter_lng=east",
      "name=Alice&status=safe",
    ] {
      let resp =
        oneshot_raw(state.clone(), "POST", "/public/report", vec![form()], body).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
      assert!(json(resp).await["error"].is_string());
    }
  }

  #[tokio::test]
  async fn submit_without_open_period_is_unavailable() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let state = AppState::new(store, ServerConfig::default());
    with_roster(&state).await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/public/report",
      vec![form()],
      "grade=Staff&name=Alice&status=safe",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
  }

  #[tokio::test]
  async fn public_roster_lists_active_names() {
    let state = make_state().await;
    with_roster(&state).await;
    let resp = oneshot_raw(state, "GET", "/public/roster", vec![], "").await;
    let roster = json(resp).await;
    assert_eq!(roster["Staff"][0], "Alice");
    assert!(roster.get("Doctor").is_none());
  }

  // ── Admin API ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn admin_api_requires_proof() {
    let state = make_state().await;
    let resp = oneshot_raw(state.clone(), "GET", "/admin/api/summary", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(resp).await["error"], "unauthorized");

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/api/summary",
      vec![(header::HeaderName::from_static("x-admin-token"), "nope")],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let cookie = sign_in(&state).await;
    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/api/summary",
      vec![(header::COOKIE, cookie.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = oneshot_raw(
      state,
      "GET",
      "/admin/api/summary",
      vec![
        (header::HeaderName::from_static("x-admin-token"), "stale"),
        (header::COOKIE, cookie.as_str()),
      ],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn summary_counts_active_roster_only() {
    let state = make_state().await;
    with_roster(&state).await;
    oneshot_raw(
      state.clone(),
      "POST",
      "/public/report",
      vec![form()],
      "grade=Staff&name=Alice&status=safe",
    )
    .await;

    let resp =
      oneshot_raw(state.clone(), "GET", "/admin/api/summary", vec![admin_token()], "")
        .await;
    let summary = json(resp).await;
    assert_eq!(summary["total_roster"], 1);
    assert_eq!(summary["counts"], serde_json::json!([{ "status": "safe", "n": 1 }]));

    let resp =
      oneshot_raw(state, "GET", "/admin/api/absentees", vec![admin_token()], "").await;
    assert_eq!(json(resp).await, serde_json::json!([]));
  }

  #[tokio::test]
  async fn admin_api_report_lookups() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/api/reports?status=bogus",
      vec![admin_token()],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      &format!("/admin/api/reports/{}", uuid::Uuid::new_v4()),
      vec![admin_token()],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = oneshot_raw(
      state,
      "GET",
      "/admin/api/periods/current",
      vec![admin_token()],
      "",
    )
    .await;
    assert_eq!(json(resp).await["seq"], 1);
  }

  // ── Admin pages ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn admin_pages_redirect_to_login() {
    let state = make_state().await;
    let resp =
      oneshot_raw(state, "GET", "/admin/reports?status=safe", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
      location(&resp),
      "/admin/login?next=/admin/reports%3Fstatus%3Dsafe"
    );
  }

  #[tokio::test]
  async fn login_rejects_wrong_token_and_foreign_next() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/login",
      vec![form()],
      "token=wrong&next=/admin/users",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin/login?next=/admin/users&e=1");
    assert!(resp.headers().get(header::SET_COOKIE).is_none());

    let resp = oneshot_raw(
      state,
      "POST",
      "/admin/login",
      vec![form()],
      format!("token={TOKEN}&next=%2F%2Fevil.example"),
    )
    .await;
    assert_eq!(location(&resp), "/admin");
  }

  #[tokio::test]
  async fn dashboard_and_reset_with_session() {
    let state = make_state().await;
    with_roster(&state).await;
    let cookie = sign_in(&state).await;

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/admin",
      vec![(header::COOKIE, cookie.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = text(resp).await;
    assert!(page.contains("Period #1"), "{page}");
    assert!(page.contains("no_report"), "{page}");

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/periods/reset",
      vec![(header::COOKIE, cookie.as_str())],
      "",
    )
    .await;
    assert_eq!(location(&resp), "/admin?reset=1");
    let current = state.store.current_period().await.unwrap().unwrap();
    assert_eq!(current.seq, 2);
  }

  #[tokio::test]
  async fn logout_clears_cookie() {
    let resp = oneshot_raw(make_state().await, "GET", "/admin/logout", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("admin_session=;"), "{cookie}");
    assert!(cookie.contains("Max-Age=0"), "{cookie}");
  }

  fn multipart(fields: &[(&str, Option<&str>, &str)]) -> (String, String) {
    let boundary = "XMUSTERBOUNDARY";
    let mut body = String::new();
    for (name, filename, value) in fields {
      body.push_str(&format!("--{boundary}\r\n"));
      match filename {
        Some(f) => body.push_str(&format!(
          "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
           Content-Type: text/csv\r\n\r\n"
        )),
        None => body.push_str(&format!(
          "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
        )),
      }
      body.push_str(value);
      body.push_str("\r\n");
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    (format!("multipart/form-data; boundary={boundary}"), body)
  }

  #[tokio::test]
  async fn roster_upload_and_removal() {
    let state = make_state().await;
    with_roster(&state).await;
    let cookie = sign_in(&state).await;

    let csv = "\u{feff}grade,name,email,group_name,is_active\n\
               Staff,Alice,,Lab A,true\n\
               b,Carol,carol@example.com,,\n\
               ,Nobody,,,\n";
    let (content_type, body) =
      multipart(&[("csvfile", Some("roster.csv"), csv), ("replace", None, "true")]);
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/users/upload",
      vec![
        (header::COOKIE, cookie.as_str()),
        (header::CONTENT_TYPE, content_type.as_str()),
      ],
      body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin/users?created=1&updated=1&skipped=1");

    let roster = state.store.active_roster_by_grade().await.unwrap();
    assert_eq!(roster["Staff"], vec!["Alice"]);
    assert_eq!(roster["Bachelor"], vec!["Carol"]);

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/users/delete_by_email",
      vec![(header::COOKIE, cookie.as_str()), form()],
      "email=carol%40example.com",
    )
    .await;
    assert_eq!(location(&resp), "/admin/users?removed=1");

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/users/delete_by_email",
      vec![(header::COOKIE, cookie.as_str()), form()],
      "email=carol%40example.com",
    )
    .await;
    assert_eq!(location(&resp), "/admin/users?err=notfound");

    let (content_type, body) = multipart(&[(
      "csvfile",
      Some("remove.csv"),
      "email\nalice@example.com\n",
    )]);
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/admin/users/delete_csv",
      vec![
        (header::COOKIE, cookie.as_str()),
        (header::CONTENT_TYPE, content_type.as_str()),
      ],
      body,
    )
    .await;
    assert_eq!(location(&resp), "/admin/users?removed=1");
    assert!(state.store.active_roster_by_grade().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn report_export_is_csv_with_bom() {
    let state = make_state().await;
    with_roster(&state).await;
    oneshot_raw(
      state.clone(),
      "POST",
      "/public/report",
      vec![form()],
      "grade=Staff&name=Alice&status=need_help&damage_notes=window",
    )
    .await;
    let cookie = sign_in(&state).await;

    let resp = oneshot_raw(
      state,
      "GET",
      "/admin/reports/export?status=need_help",
      vec![(header::COOKIE, cookie.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
      .headers()
      .get(header::CONTENT_DISPOSITION)
      .unwrap()
      .to_str()
      .unwrap()
      .to_owned();
    assert!(disposition.contains("reports_period_1.csv"), "{disposition}");

    let body = text(resp).await;
    let body = body.strip_prefix('\u{feff}').expect("bom");
    assert!(body.starts_with("grade,name,email,group_name,status,updated_at"));
    assert!(body.contains("Staff,Alice,alice@example.com,,need_help,"));
    assert!(body.trim_end().ends_with("window"));
  }

  #[tokio::test]
  async fn report_detail_pages() {
    let state = make_state().await;
    with_roster(&state).await;
    let cookie = sign_in(&state).await;

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      &format!("/admin/reports/{}", uuid::Uuid::new_v4()),
      vec![(header::COOKIE, cookie.as_str())],
      "",
    )
    .await;
    assert_eq!(location(&resp), "/admin/reports");

    oneshot_raw(
      state.clone(),
      "POST",
      "/public/report",
      vec![form()],
      "grade=Staff&name=Alice&status=safe&shelter_name=%3Cb%3EGym",
    )
    .await;
    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/admin/reports",
      vec![(header::COOKIE, cookie.as_str())],
      "",
    )
    .await;
    let page = text(resp).await;
    assert!(page.contains("&lt;b&gt;Gym"), "{page}");
    assert!(!page.contains("<b>Gym"));
  }

  // ── Configuration ──────────────────────────────────────────────────────────

  #[test]
  fn database_path_strips_scheme() {
    let cfg = ServerConfig {
      database_url: "sqlite://data/muster.db".to_owned(),
      ..ServerConfig::default()
    };
    assert_eq!(cfg.database_path(), PathBuf::from("data/muster.db"));
  }

  #[test]
  fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("muster.toml");
    std::fs::write(&path, "port = 9100\nadmin_token = \"from-file\"\n").unwrap();
    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 9100);
    assert_eq!(cfg.admin_token, "from-file");
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.session_max_age_secs, 43_200);
  }
}
