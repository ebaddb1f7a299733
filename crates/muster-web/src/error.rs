//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use muster_api::ApiError;
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error(transparent)]
  Api(#[from] ApiError),
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),
  #[error("session error: {0}")]
  Session(#[from] SessionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<muster_core::Error> for Error {
  fn from(e: muster_core::Error) -> Self { Error::Api(e.into()) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      Error::Api(e) => return e.into_response(),
      Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
      Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      Error::Csv(e) => (StatusCode::BAD_REQUEST, format!("invalid csv: {e}")),
      Error::Session(e) => {
        tracing::error!(error = %e, "failed to issue session");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
