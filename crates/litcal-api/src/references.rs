//! Handlers for references.
//!
//! | Method   | Path                       | Notes |
//! |----------|----------------------------|-------|
//! | `GET`    | `/events/{id}/references`  | 404 if the event is unknown |
//! | `POST`   | `/references`              | `reference_uuid: "auto"` generates one |
//! | `PUT`    | `/references/{id}`         | Applies the fields present in the body |
//! | `DELETE` | `/references/{id}`         | 404 if not found |

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use litcal_core::{
  reference::{NewReference, Reference, ReferencePatch},
  store::CalendarStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  ApiState,
  error::ApiError,
  input::{IntInput, optional_int, required_int},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub references: Vec<Reference>,
}

/// `GET /events/{id}/references`
pub async fn list_for_event<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ListResponse>, ApiError> {
  let Path(event_id) = id?;
  let references = state
    .store
    .list_references(event_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ListResponse { references }))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub event_id:       Option<IntInput>,
  #[serde(default)]
  pub reference_type: String,
  #[serde(default)]
  pub reference_name: String,
  pub reference_uuid: Option<String>,
  pub reference_slug: Option<String>,
  pub priority:       Option<IntInput>,
  pub metadata:       Option<serde_json::Value>,
}

impl CreateBody {
  fn into_new_reference(self) -> Result<NewReference, ApiError> {
    Ok(NewReference {
      event_id:       required_int("event_id", self.event_id)?,
      reference_type: self.reference_type,
      reference_name: self.reference_name,
      reference_uuid: self.reference_uuid,
      reference_slug: self.reference_slug,
      priority:       optional_int("priority", self.priority)?.unwrap_or(0),
      metadata:       self.metadata.filter(|m| !m.is_null()),
    })
  }
}

/// `POST /references`
pub async fn create<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let reference = state
    .store
    .create_reference(body.into_new_reference()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok((
    StatusCode::CREATED,
    Json(json!({ "success": true, "reference": reference })),
  ))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub reference_type: Option<String>,
  pub reference_name: Option<String>,
  pub reference_uuid: Option<String>,
  pub reference_slug: Option<String>,
  pub priority:       Option<IntInput>,
  /// `null` clears the metadata; omit the key to keep it.
  #[serde(default, deserialize_with = "crate::input::double_option")]
  pub metadata:       Option<Option<serde_json::Value>>,
}

impl UpdateBody {
  fn into_patch(self) -> Result<ReferencePatch, ApiError> {
    Ok(ReferencePatch {
      reference_type: self.reference_type,
      reference_name: self.reference_name,
      reference_uuid: self.reference_uuid,
      reference_slug: self.reference_slug,
      priority:       optional_int("priority", self.priority)?,
      metadata:       self
        .metadata
        .map(|m| m.unwrap_or(serde_json::Value::Null)),
    })
  }
}

/// `PUT /references/{id}`
pub async fn update<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  id: Result<Path<i64>, PathRejection>,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Path(id) = id?;
  let Json(body) = body?;
  let reference = state
    .store
    .update_reference(id, body.into_patch()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "success": true, "reference": reference })))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /references/{id}`
pub async fn delete<S: CalendarStore>(
  State(state): State<ApiState<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Path(id) = id?;
  state
    .store
    .delete_reference(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "success": true })))
}
