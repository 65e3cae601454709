//! Flat rows for bulk import and export of the calendar.
//!
//! A row carries one event and at most one of its references. An event with
//! several references spans several consecutive rows repeating the event
//! columns; an event without references has a single row with the reference
//! columns left blank. Columns not listed here (older sheets carry
//! `author_name` and `book_title`) are ignored on import.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  event::{DEFAULT_EVENT_TYPE, Event, NewEvent, normalize_optional},
  reference::{NewReference, Reference},
};

/// One line of an import or export sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRow {
  pub month:          u32,
  pub day:            u32,
  /// Blank means [`DEFAULT_EVENT_TYPE`].
  #[serde(default)]
  pub event_type:     String,
  pub title:          String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(default)]
  pub year:           Option<i32>,
  /// A blank type means the row adds no reference.
  #[serde(default)]
  pub reference_type: Option<String>,
  #[serde(default)]
  pub reference_uuid: Option<String>,
  #[serde(default)]
  pub reference_slug: Option<String>,
  #[serde(default)]
  pub reference_name: Option<String>,
  #[serde(default)]
  pub priority:       Option<i64>,
  /// Reference metadata as a JSON object literal.
  #[serde(default)]
  pub metadata_json:  Option<String>,
}

impl TransferRow {
  /// The row for `event` alone, or for `event` and one of its references.
  pub fn from_event(event: &Event, reference: Option<&Reference>) -> Self {
    let mut row = Self {
      month: event.month,
      day: event.day,
      event_type: event.event_type.clone(),
      title: event.title.clone(),
      description: event.description.clone(),
      year: event.year,
      ..Default::default()
    };
    if let Some(r) = reference {
      row.reference_type = Some(r.reference_type.clone());
      row.reference_uuid = r.reference_uuid.clone();
      row.reference_slug = r.reference_slug.clone();
      row.reference_name = Some(r.reference_name.clone());
      row.priority = Some(r.priority);
      row.metadata_json = r.metadata.as_ref().map(|m| m.to_string());
    }
    row
  }

  fn new_event(&self) -> NewEvent {
    let event_type = match self.event_type.trim() {
      "" => DEFAULT_EVENT_TYPE.to_string(),
      other => other.to_string(),
    };
    NewEvent {
      day: self.day,
      month: self.month,
      year: self.year,
      title: self.title.clone(),
      description: self.description.clone(),
      event_type,
    }
  }

  /// `None` when the reference columns are blank. The event id is filled in
  /// by the store once the event exists.
  fn new_reference(&self) -> Result<Option<NewReference>> {
    let Some(reference_type) = normalize_optional(self.reference_type.clone()) else {
      return Ok(None);
    };
    // Tag rows often carry only a slug; fall back to it for the name.
    let reference_name = normalize_optional(self.reference_name.clone())
      .or_else(|| normalize_optional(self.reference_slug.clone()))
      .unwrap_or_default();
    let metadata = normalize_optional(self.metadata_json.clone())
      .map(|raw| {
        serde_json::from_str(&raw)
          .map_err(|e| Error::validation(format!("metadata_json is not valid JSON: {e}")))
      })
      .transpose()?;
    let reference = NewReference {
      event_id: 0,
      reference_type,
      reference_name,
      reference_uuid: self.reference_uuid.clone(),
      reference_slug: self.reference_slug.clone(),
      priority: self.priority.unwrap_or(0),
      metadata,
    };
    Ok(Some(reference.validate()?))
  }
}

// ─── Import plan ─────────────────────────────────────────────────────────────

/// One event to create on import together with its references.
#[derive(Debug, Clone)]
pub struct ImportGroup {
  pub event:      NewEvent,
  /// `event_id` is a placeholder until the event is inserted.
  pub references: Vec<NewReference>,
}

/// Counts reported back after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
  pub events:     u64,
  pub references: u64,
}

/// Validate `rows` and fold consecutive rows describing the same event into
/// one group. Errors name the 1-based data row they come from.
pub fn plan_import(rows: Vec<TransferRow>) -> Result<Vec<ImportGroup>> {
  let mut groups: Vec<ImportGroup> = Vec::new();
  for (index, row) in rows.iter().enumerate() {
    let at_row = |e: Error| match e {
      Error::Validation(m) => Error::validation(format!("row {}: {m}", index + 1)),
      other => other,
    };
    let event = row.new_event().validate().map_err(at_row)?;
    let reference = row.new_reference().map_err(at_row)?;

    match groups.last_mut() {
      Some(last) if same_event(&last.event, &event) => {
        last.references.extend(reference);
      }
      _ => groups.push(ImportGroup { event, references: reference.into_iter().collect() }),
    }
  }
  Ok(groups)
}

fn same_event(a: &NewEvent, b: &NewEvent) -> bool {
  a.month == b.month
    && a.day == b.day
    && a.year == b.year
    && a.title == b.title
    && a.description == b.description
    && a.event_type == b.event_type
}
