//! JSON REST API for the literary calendar.
//!
//! Exposes an axum [`Router`] backed by any
//! [`litcal_core::store::CalendarStore`]. The digest trigger, auth and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", litcal_api::api_router(ApiState::new(store, tz)))
//! ```

pub mod dates;
pub mod error;
pub mod events;
pub mod input;
pub mod references;
pub mod transfer;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use chrono::Utc;
use chrono_tz::Tz;
use litcal_core::{date::MonthDay, store::CalendarStore};

pub use error::ApiError;

/// State shared by every API handler.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  /// Zone whose calendar date counts as "today".
  pub timezone: Tz,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, timezone: Tz) -> Self { Self { store, timezone } }

  /// Today's day and month in the configured zone.
  pub fn today(&self) -> MonthDay {
    MonthDay::today_in(&self.timezone, Utc::now())
  }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), timezone: self.timezone }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: CalendarStore + 'static,
{
  Router::new()
    // Events
    .route("/events", get(events::list::<S>).post(events::create::<S>))
    .route(
      "/events/{id}",
      get(events::get_one::<S>)
        .put(events::update::<S>)
        .delete(events::delete::<S>),
    )
    .route("/events/{id}/references", get(references::list_for_event::<S>))
    // Per-date listing
    .route("/dates/{month}/{day}", get(dates::on_date::<S>))
    // References
    .route("/references", post(references::create::<S>))
    .route(
      "/references/{id}",
      put(references::update::<S>).delete(references::delete::<S>),
    )
    // Bulk CSV transfer
    .route("/export", get(transfer::export::<S>))
    .route("/import", post(transfer::import::<S>))
    .with_state(state)
}
