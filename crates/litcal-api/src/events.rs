//! Handlers for `/events` endpoints.
//!
//! | Method   | Path            | Notes |
//! |----------|-----------------|-------|
//! | `GET`    | `/events`       | Optional `?month=1..12`; always includes stats |
//! | `POST`   | `/events`       | Body: `{day, month, title, event_type?, description?, year?}` |
//! | `GET`    | `/events/{id}`  | 404 if not found |
//! | `PUT`    | `/events/{id}`  | Only `title`, `description`, `year` are applied |
//! | `DELETE` | `/events/{id}`  | Removes the event's references too |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use litcal_core::{
  event::{DEFAULT_EVENT_TYPE, Event, EventPatch, EventStats, NewEvent},
  store::CalendarStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  ApiState,
  error::ApiError,
  input::{IntInput, double_option, narrow, optional_int, required_int},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub events: Vec<Event>,
  pub stats:  EventStats,
}

/// `GET /events[?month=<1..12>]`
pub async fn list<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
  let Query(params) = params?;
  // `?month=` with no value means no filter.
  let month = optional_int("month", params.month.map(IntInput::Text))?
    .map(|m| narrow::<u32>("month", m))
    .transpose()?;

  let events = state
    .store
    .list_events(month)
    .await
    .map_err(ApiError::from_store)?;
  let stats = state
    .store
    .stats(state.today())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ListResponse { events, stats }))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub day:         Option<IntInput>,
  pub month:       Option<IntInput>,
  pub year:        Option<IntInput>,
  #[serde(default)]
  pub title:       String,
  pub description: Option<String>,
  pub event_type:  Option<String>,
}

impl CreateBody {
  fn into_new_event(self) -> Result<NewEvent, ApiError> {
    let event_type = self
      .event_type
      .filter(|t| !t.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_owned());
    Ok(NewEvent {
      day: narrow("day", required_int("day", self.day)?)?,
      month: narrow("month", required_int("month", self.month)?)?,
      year: optional_int("year", self.year)?
        .map(|y| narrow("year", y))
        .transpose()?,
      title: self.title,
      description: self.description,
      event_type,
    })
  }
}

/// `POST /events`
pub async fn create<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let event = state
    .store
    .create_event(body.into_new_event()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok((
    StatusCode::CREATED,
    Json(json!({ "success": true, "event": event })),
  ))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /events/{id}`
pub async fn get_one<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Event>, ApiError> {
  let Path(id) = id?;
  let event = state
    .store
    .get_event(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("event {id} not found")))?;
  Ok(Json(event))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// Editable fields. Day, month and event type are not listed, so any such
/// keys in the body are ignored.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub title:       Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub description: Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option")]
  pub year:        Option<Option<IntInput>>,
}

impl UpdateBody {
  fn into_patch(self) -> Result<EventPatch, ApiError> {
    let year = match self.year {
      None => None,
      Some(None) => Some(None),
      Some(Some(y)) => Some(
        optional_int("year", Some(y))?
          .map(|y| narrow("year", y))
          .transpose()?,
      ),
    };
    Ok(EventPatch { title: self.title, description: self.description, year })
  }
}

/// `PUT /events/{id}`
pub async fn update<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  id: Result<Path<i64>, PathRejection>,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Path(id) = id?;
  let Json(body) = body?;
  let event = state
    .store
    .update_event(id, body.into_patch()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "success": true, "event": event })))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /events/{id}`
pub async fn delete<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Path(id) = id?;
  state
    .store
    .delete_event(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "success": true })))
}
