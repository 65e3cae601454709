//! `GET /dates/{month}/{day}`: everything that happened on one calendar
//! day, with references inlined. This is what the digest routine reads.

use axum::{
  Json,
  extract::{Path, State, rejection::PathRejection},
};
use litcal_core::{date::MonthDay, event::EventWithReferences, store::CalendarStore};
use serde::Serialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct DateResponse {
  pub date:   String,
  pub events: Vec<EventWithReferences>,
}

pub async fn on_date<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  path: Result<Path<(u32, u32)>, PathRejection>,
) -> Result<Json<DateResponse>, ApiError> {
  let Path((month, day)) = path?;
  let date = MonthDay::new(month, day)?;
  let events = state
    .store
    .events_on(date)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(DateResponse { date: date.to_string(), events }))
}
