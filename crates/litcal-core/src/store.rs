//! The `CalendarStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `litcal-store-sqlite`).
//! Higher layers (`litcal-api`, `litcal-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use crate::{
  date::MonthDay,
  event::{Event, EventPatch, EventStats, EventWithReferences, NewEvent},
  reference::{NewReference, Reference, ReferencePatch},
  transfer::{ImportSummary, TransferRow},
};

/// Abstraction over a calendar store backend.
///
/// Backends must keep [`Event::references_count`] consistent with the live
/// references: every mutation that adds or removes a reference is atomic
/// with respect to readers. Ids are assigned monotonically and never reused.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CalendarStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Events ────────────────────────────────────────────────────────────

  /// All events ordered by date, optionally restricted to one month.
  fn list_events(
    &self,
    month: Option<u32>,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Aggregate counters; `today` decides which events count as today's.
  fn stats(
    &self,
    today: MonthDay,
  ) -> impl Future<Output = Result<EventStats, Self::Error>> + Send + '_;

  /// Retrieve an event by id. Returns `None` if not found.
  fn get_event(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Validate and persist a new event with `references_count == 0`.
  fn create_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Apply `patch` to an existing event and return the result.
  fn update_event(
    &self,
    id: i64,
    patch: EventPatch,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Delete an event together with all of its references.
  fn delete_event(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Events falling on `date`, each with its references. This is the read
  /// model the daily digest is built from.
  fn events_on(
    &self,
    date: MonthDay,
  ) -> impl Future<Output = Result<Vec<EventWithReferences>, Self::Error>>
  + Send
  + '_;

  // ── References ────────────────────────────────────────────────────────

  /// References of an event ordered by priority. Fails if the event does
  /// not exist.
  fn list_references(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<Vec<Reference>, Self::Error>> + Send + '_;

  /// Retrieve a reference by id. Returns `None` if not found.
  fn get_reference(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Reference>, Self::Error>> + Send + '_;

  /// Attach a new reference to an existing event.
  fn create_reference(
    &self,
    input: NewReference,
  ) -> impl Future<Output = Result<Reference, Self::Error>> + Send + '_;

  fn update_reference(
    &self,
    id: i64,
    patch: ReferencePatch,
  ) -> impl Future<Output = Result<Reference, Self::Error>> + Send + '_;

  fn delete_reference(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Bulk transfer ─────────────────────────────────────────────────────

  /// Create the events and references described by `rows`, all or nothing.
  /// Consecutive rows with identical event columns become one event.
  fn import_rows(
    &self,
    rows: Vec<TransferRow>,
  ) -> impl Future<Output = Result<ImportSummary, Self::Error>> + Send + '_;

  /// Every event in calendar order, one row per reference (by priority) and
  /// a single row for events without references.
  fn export_rows(
    &self,
  ) -> impl Future<Output = Result<Vec<TransferRow>, Self::Error>> + Send + '_;
}
