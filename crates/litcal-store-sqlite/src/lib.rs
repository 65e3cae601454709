//! SQLite backend for the literary calendar.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Because every call is executed on that
//! single connection thread, and every mutation runs inside one transaction,
//! readers never see a `references_count` that disagrees with the live
//! references.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
