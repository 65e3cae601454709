//! Error types for `litcal-digest`.

use std::time::Duration;

use thiserror::Error;

/// Failure of a runner before it could report an exit status.
#[derive(Debug, Error)]
pub enum RunError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source:  std::io::Error,
  },

  #[error("I/O error while running digest: {0}")]
  Io(#[from] std::io::Error),
}

/// Why a trigger did not produce a delivered digest.
#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("invalid cron secret")]
  Unauthorized,

  #[error("a digest run is already in progress")]
  AlreadyRunning,

  /// The routine could not be started at all.
  #[error("{0}")]
  Spawn(String),

  /// The routine ran and exited with a nonzero status.
  #[error("digest routine exited with code {code}")]
  Exited { code: i32, stderr: String },

  #[error("digest routine timed out after {0:?}")]
  TimedOut(Duration),

  #[error("{0}")]
  Io(String),
}

impl DispatchError {
  /// Exit code of the routine, when it got as far as exiting.
  pub fn code(&self) -> Option<i32> {
    match self {
      Self::Exited { code, .. } => Some(*code),
      _ => None,
    }
  }

  /// Error text for the caller: the routine's stderr when it exited,
  /// otherwise the error message itself.
  pub fn detail(&self) -> String {
    match self {
      Self::Exited { stderr, .. } => stderr.clone(),
      other => other.to_string(),
    }
  }
}

impl From<RunError> for DispatchError {
  fn from(e: RunError) -> Self {
    match e {
      RunError::Spawn { .. } => Self::Spawn(e.to_string()),
      RunError::Io(_) => Self::Io(e.to_string()),
    }
  }
}
