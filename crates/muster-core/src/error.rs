//! Error types for `muster-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid status: {0:?}")]
  InvalidStatus(String),

  #[error("grade and name, or email, are required to identify a member")]
  MissingIdentity,

  #[error("{field} must be a number, got {value:?}")]
  InvalidNumber { field: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
