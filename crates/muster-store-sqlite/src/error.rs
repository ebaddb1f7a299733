//! Error type for `muster-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] muster_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown enum value in column {column}: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  #[error("period not found: {0}")]
  PeriodNotFound(uuid::Uuid),

  /// A report was submitted against a period that has since been reset.
  #[error("period {0} is closed")]
  PeriodClosed(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
