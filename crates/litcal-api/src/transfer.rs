//! Handlers for bulk CSV transfer.
//!
//! | Method | Path      | Notes |
//! |--------|-----------|-------|
//! | `GET`  | `/export` | `text/csv`, one row per reference, header always present |
//! | `POST` | `/import` | `text/csv` body; either every row is imported or none |
//!
//! The columns are those of [`TransferRow`]; unknown columns are ignored.

use axum::{
  Json,
  extract::State,
  http::{StatusCode, header},
  response::IntoResponse,
};
use litcal_core::{store::CalendarStore, transfer::TransferRow};
use serde_json::json;
use tracing::info;

use crate::{ApiState, error::ApiError};

/// Header written even when there is nothing to export.
pub const COLUMNS: [&str; 12] = [
  "month",
  "day",
  "event_type",
  "title",
  "description",
  "year",
  "reference_type",
  "reference_uuid",
  "reference_slug",
  "reference_name",
  "priority",
  "metadata_json",
];

/// `GET /export`
pub async fn export<S: CalendarStore>(
  State(state): State<ApiState<S>>,
) -> Result<impl IntoResponse, ApiError> {
  let rows = state.store.export_rows().await.map_err(ApiError::from_store)?;
  let body = write_csv(&rows)?;
  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
      (
        header::CONTENT_DISPOSITION,
        "attachment; filename=\"literary_calendar.csv\"",
      ),
    ],
    body,
  ))
}

/// `POST /import`
pub async fn import<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  body: String,
) -> Result<impl IntoResponse, ApiError> {
  let rows = read_csv(&body)?;
  let read = rows.len();
  let summary = state.store.import_rows(rows).await.map_err(ApiError::from_store)?;
  info!(rows = read, events = summary.events, "csv import accepted");
  Ok((
    StatusCode::CREATED,
    Json(json!({
      "success":    true,
      "events":     summary.events,
      "references": summary.references,
    })),
  ))
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

pub fn write_csv(rows: &[TransferRow]) -> Result<String, ApiError> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  if rows.is_empty() {
    writer.write_record(COLUMNS).map_err(csv_failure)?;
  }
  for row in rows {
    writer.serialize(row).map_err(csv_failure)?;
  }
  let bytes = writer
    .into_inner()
    .map_err(|e| ApiError::Store(Box::new(e.into_error())))?;
  String::from_utf8(bytes).map_err(|e| ApiError::Store(Box::new(e)))
}

/// Parse a sheet. Errors name the 1-based data row.
pub fn read_csv(text: &str) -> Result<Vec<TransferRow>, ApiError> {
  let mut reader = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .from_reader(text.trim_start_matches('\u{feff}').as_bytes());
  reader
    .deserialize()
    .enumerate()
    .map(|(i, row)| row.map_err(|e| ApiError::Validation(format!("row {}: {e}", i + 1))))
    .collect()
}

fn csv_failure(e: csv::Error) -> ApiError { ApiError::Store(Box::new(e)) }
