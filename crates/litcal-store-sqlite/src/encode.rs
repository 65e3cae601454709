//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and reference metadata as
//! compact JSON. Rows are first read into `Raw*` structs inside the
//! connection thread and decoded afterwards, so decoding errors surface as
//! [`Error`] rather than opaque `rusqlite` failures.

use chrono::{DateTime, Utc};
use litcal_core::{event::Event, reference::Reference};
use rusqlite::{OptionalExtension as _, Row};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Metadata
// ─────────────────────────────────────────────────────────────────

pub fn encode_metadata(m: Option<&serde_json::Value>) -> Result<Option<String>> {
  Ok(m.map(serde_json::to_string).transpose()?)
}

pub fn decode_metadata(s: Option<&str>) -> Result<Option<serde_json::Value>> {
  Ok(s.map(serde_json::from_str).transpose()?)
}

// ─── Events
// ───────────────────────────────────────────────────────────────────

/// Columns selected for every event read. `references_count` is evaluated
/// in the same statement so it always matches the live references.
pub const EVENT_COLUMNS: &str = "
  e.id, e.month, e.day, e.year, e.event_type, e.title, e.description,
  e.created_at,
  (SELECT COUNT(*) FROM event_references r WHERE r.event_id = e.id)";

/// An `events` row before decoding.
pub struct RawEvent {
  pub id:               i64,
  pub month:            u32,
  pub day:              u32,
  pub year:             Option<i32>,
  pub event_type:       String,
  pub title:            String,
  pub description:      Option<String>,
  pub created_at:       String,
  pub references_count: i64,
}

impl RawEvent {
  /// Read a row produced by a `SELECT {EVENT_COLUMNS}` query.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      month:            row.get(1)?,
      day:              row.get(2)?,
      year:             row.get(3)?,
      event_type:       row.get(4)?,
      title:            row.get(5)?,
      description:      row.get(6)?,
      created_at:       row.get(7)?,
      references_count: row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:               self.id,
      day:              self.day,
      month:            self.month,
      year:             self.year,
      title:            self.title,
      description:      self.description,
      event_type:       self.event_type,
      references_count: self.references_count.max(0) as u64,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Fetch one event on an open connection or transaction.
pub fn select_event(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawEvent>> {
  conn
    .query_row(
      &format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?1"),
      rusqlite::params![id],
      RawEvent::from_row,
    )
    .optional()
}

pub fn event_exists(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM events WHERE id = ?1", rusqlite::params![id], |_| {
        Ok(true)
      })
      .optional()?
      .unwrap_or(false),
  )
}

// ─── References
// ───────────────────────────────────────────────────────────────

pub const REFERENCE_COLUMNS: &str = "
  id, event_id, reference_type, reference_name, reference_uuid,
  reference_slug, priority, metadata";

/// An `event_references` row before decoding.
pub struct RawReference {
  pub id:             i64,
  pub event_id:       i64,
  pub reference_type: String,
  pub reference_name: String,
  pub reference_uuid: Option<String>,
  pub reference_slug: Option<String>,
  pub priority:       i64,
  pub metadata:       Option<String>,
}

impl RawReference {
  /// Read a row produced by a `SELECT {REFERENCE_COLUMNS}` query.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      event_id:       row.get(1)?,
      reference_type: row.get(2)?,
      reference_name: row.get(3)?,
      reference_uuid: row.get(4)?,
      reference_slug: row.get(5)?,
      priority:       row.get(6)?,
      metadata:       row.get(7)?,
    })
  }

  pub fn into_reference(self) -> Result<Reference> {
    Ok(Reference {
      id:             self.id,
      event_id:       self.event_id,
      reference_type: self.reference_type,
      reference_name: self.reference_name,
      reference_uuid: self.reference_uuid,
      reference_slug: self.reference_slug,
      priority:       self.priority,
      metadata:       decode_metadata(self.metadata.as_deref())?,
    })
  }
}

pub fn select_reference(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawReference>> {
  conn
    .query_row(
      &format!("SELECT {REFERENCE_COLUMNS} FROM event_references WHERE id = ?1"),
      rusqlite::params![id],
      RawReference::from_row,
    )
    .optional()
}

/// References of one event in display order.
pub fn select_references_for(
  conn: &rusqlite::Connection,
  event_id: i64,
) -> rusqlite::Result<Vec<RawReference>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {REFERENCE_COLUMNS} FROM event_references
     WHERE event_id = ?1
     ORDER BY priority, id"
  ))?;
  let rows = stmt
    .query_map(rusqlite::params![event_id], RawReference::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
