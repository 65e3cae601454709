//! Calendar events — the anniversaries the calendar is made of.
//!
//! An event's date (day and month) and its type are fixed once created.
//! Only the title, description and year can be edited afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, date::MonthDay, reference::Reference};

/// Event type used when a create request does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "literary_event";

// ─── Event ───────────────────────────────────────────────────────────────────

/// A recurring calendar entry as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub id:               i64,
  pub day:              u32,
  pub month:            u32,
  /// Present when the event happened in a specific year.
  pub year:             Option<i32>,
  pub title:            String,
  pub description:      Option<String>,
  pub event_type:       String,
  /// Live number of references attached to this event. Never stored;
  /// computed in the same statement that reads the event.
  pub references_count: u64,
  pub created_at:       DateTime<Utc>,
}

impl Event {
  pub fn date(&self) -> MonthDay {
    MonthDay { month: self.month, day: self.day }
  }
}

/// An event bundled with its references, used by the per-date listing the
/// digest routine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWithReferences {
  #[serde(flatten)]
  pub event:      Event,
  pub references: Vec<Reference>,
}

/// Aggregate counters shown above the event list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
  pub total_events:     u64,
  /// Events whose day and month match the current date.
  pub today_events:     u64,
  pub total_references: u64,
}

// ─── NewEvent ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::CalendarStore::create_event`].
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub day:         u32,
  pub month:       u32,
  pub year:        Option<i32>,
  pub title:       String,
  pub description: Option<String>,
  pub event_type:  String,
}

impl NewEvent {
  /// Convenience constructor with the optional fields left empty.
  pub fn new(
    day: u32,
    month: u32,
    title: impl Into<String>,
    event_type: impl Into<String>,
  ) -> Self {
    Self {
      day,
      month,
      year: None,
      title: title.into(),
      description: None,
      event_type: event_type.into(),
    }
  }

  pub fn with_year(mut self, year: i32) -> Self {
    self.year = Some(year);
    self
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Check the date and required fields, returning the normalised input.
  pub fn validate(mut self) -> Result<Self> {
    MonthDay::for_year(self.month, self.day, self.year)?;
    self.title = require_text("title", self.title)?;
    self.event_type = require_text("event_type", self.event_type)?;
    self.description = normalize_optional(self.description);
    Ok(self)
  }
}

// ─── EventPatch ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::CalendarStore::update_event`].
///
/// There are no date or type fields: an anniversary is structurally fixed
/// once created. For `description` and `year` the outer `Option` means
/// "leave unchanged" and the inner one "clear".
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
  pub title:       Option<String>,
  pub description: Option<Option<String>>,
  pub year:        Option<Option<i32>>,
}

impl EventPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.description.is_none() && self.year.is_none()
  }

  /// Validate the patch against the event it will be applied to.
  pub fn validate_for(mut self, current: &Event) -> Result<Self> {
    if let Some(title) = self.title.take() {
      self.title = Some(require_text("title", title)?);
    }
    if let Some(description) = self.description.take() {
      self.description = Some(normalize_optional(description));
    }
    if let Some(Some(year)) = self.year {
      MonthDay::for_year(current.month, current.day, Some(year))?;
    }
    Ok(self)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Trim `value` and reject it if nothing is left.
pub(crate) fn require_text(field: &str, value: String) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::validation(format!("{field} must not be empty")));
  }
  Ok(trimmed.to_owned())
}

/// Blank optional text is stored as absent.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
  value.and_then(|v| {
    let trimmed = v.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
  })
}
