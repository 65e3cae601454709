//! Daily digest dispatch.
//!
//! A digest run is an external routine (by default `python3 send_daily.py`)
//! that builds today's message and posts it to the group chat. This crate
//! owns the trigger side: secret check, one process invocation per accepted
//! trigger, and the outcome of the last run.
//!
//! The process boundary is the [`DigestRunner`] trait; [`ProcessRunner`] is
//! the production implementation.

pub mod dispatcher;
pub mod error;
pub mod runner;

pub use dispatcher::{DigestReport, DispatchConfig, DispatchState, Dispatcher};
pub use error::{DispatchError, RunError};
pub use runner::{DigestRequest, DigestRunner, ProcessRunner, RunOutput};
