//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as
//! `{"success": false, "error": <kind>, "message": <text>}`.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Input was well-formed but violates a domain rule.
  #[error("{0}")]
  Validation(String),

  /// Input could not be parsed at all.
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("{0}")]
  NotFound(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Convert a backend error through the domain taxonomy.
  pub fn from_store<E: Into<litcal_core::Error>>(e: E) -> Self { e.into().into() }

  fn kind(&self) -> &'static str {
    match self {
      Self::Validation(_) => "validation",
      Self::BadRequest(_) => "bad_request",
      Self::NotFound(_) => "not_found",
      Self::Store(_) => "store",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<litcal_core::Error> for ApiError {
  fn from(e: litcal_core::Error) -> Self {
    use litcal_core::Error as Core;
    match e {
      Core::Validation(m) => Self::Validation(m),
      Core::EventNotFound(id) => Self::NotFound(format!("event {id} not found")),
      Core::ReferenceNotFound(id) => {
        Self::NotFound(format!("reference {id} not found"))
      }
      Core::Store(inner) => Self::Store(inner),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    if let Self::Store(e) = &self {
      error!(error = %e, "store failure while serving API request");
    }
    let body = json!({
      "success": false,
      "error":   self.kind(),
      "message": self.to_string(),
    });
    (self.status(), Json(body)).into_response()
  }
}
