//! Error types for `litcal-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or missing required input.
  #[error("{0}")]
  Validation(String),

  #[error("event not found: {0}")]
  EventNotFound(i64),

  #[error("reference not found: {0}")]
  ReferenceNotFound(i64),

  /// Any backend failure that is not a domain error.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::EventNotFound(_) | Self::ReferenceNotFound(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
