//! Error types and axum `IntoResponse` implementation for the digest
//! endpoints.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use litcal_digest::DispatchError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("method not allowed")]
  MethodNotAllowed,
  #[error(transparent)]
  Dispatch(#[from] DispatchError),
  #[error("unknown time zone: {0}")]
  InvalidTimezone(String),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized | Error::Dispatch(DispatchError::Unauthorized) => (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized", "message": "Invalid cron secret" })),
      )
        .into_response(),
      Error::MethodNotAllowed => (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
      )
        .into_response(),
      Error::Dispatch(e @ DispatchError::AlreadyRunning) => (
        StatusCode::CONFLICT,
        Json(json!({ "status": "error", "message": e.to_string() })),
      )
        .into_response(),
      Error::Dispatch(e) => {
        let message = match &e {
          DispatchError::Spawn(_) => "Failed to start digest routine",
          DispatchError::TimedOut(_) => "Daily digest timed out",
          DispatchError::Io(_) => "Internal server error",
          _ => "Failed to send daily digest",
        };
        let mut body = json!({
          "status":  "error",
          "message": message,
          "error":   e.detail(),
        });
        if let Some(code) = e.code() {
          body["code"] = json!(code);
        }
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
      }
      Error::InvalidTimezone(tz) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "message": format!("unknown time zone: {tz}") })),
      )
        .into_response(),
    }
  }
}
