//! Error type for `litcal-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] litcal_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("event not found: {0}")]
  EventNotFound(i64),

  #[error("reference not found: {0}")]
  ReferenceNotFound(i64),

  /// A reference was attached to an event that does not exist.
  #[error("event {0} does not exist")]
  UnknownEvent(i64),
}

impl From<Error> for litcal_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      Error::EventNotFound(id) => Self::EventNotFound(id),
      Error::ReferenceNotFound(id) => Self::ReferenceNotFound(id),
      Error::UnknownEvent(id) => {
        Self::Validation(format!("event {id} does not exist"))
      }
      other => Self::Store(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
