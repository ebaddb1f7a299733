//! Muster server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `MUSTER_*` environment variables, opens the SQLite store, makes sure a
//! reporting period is open, and serves the check-in form, admin pages and
//! JSON API over HTTP.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use muster_core::store::MusterStore as _;
use muster_store_sqlite::SqliteStore;
use muster_web::{
  AppState, DEFAULT_ADMIN_TOKEN, DEFAULT_SECRET_KEY, ServerConfig,
};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Muster disaster check-in server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  if server_cfg.admin_token == DEFAULT_ADMIN_TOKEN {
    tracing::warn!("admin_token is the built-in default; set MUSTER_ADMIN_TOKEN");
  }
  if server_cfg.secret_key == DEFAULT_SECRET_KEY {
    tracing::warn!("secret_key is the built-in default; set MUSTER_SECRET_KEY");
  }

  // Open SQLite store.
  let store_path = server_cfg.database_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let period = store
    .get_or_create_current_period()
    .await
    .context("failed to open a reporting period")?;
  tracing::info!(seq = period.seq, "current reporting period");

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let app = muster_web::router(AppState::new(store, server_cfg));

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
