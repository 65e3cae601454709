//! Digest endpoints.
//!
//! | Method     | Path             | Notes |
//! |------------|------------------|-------|
//! | `GET/POST` | `/send-daily`    | Runs the digest routine once; other methods get 405 |
//! | `GET`      | `/digest/status` | Outcome of the most recent run |
//!
//! Both require the cron secret when one is configured. The secret is checked
//! before the method.

use axum::{
  Json,
  extract::State,
  http::Method,
  response::{IntoResponse, Response},
};
use litcal_core::store::CalendarStore;
use litcal_digest::{DigestRunner, DispatchState};
use serde_json::json;

use crate::{AppState, auth::CronAuthorized, error::Error};

/// `GET|POST /send-daily`
pub async fn send_daily<S, R>(
  State(state): State<AppState<S, R>>,
  _auth: CronAuthorized,
  method: Method,
) -> Result<Response, Error>
where
  S: CalendarStore + 'static,
  R: DigestRunner + 'static,
{
  if method != Method::GET && method != Method::POST {
    return Err(Error::MethodNotAllowed);
  }

  let report = state.dispatcher.dispatch().await?;
  Ok(
    Json(json!({
      "status":  "success",
      "message": "Daily digest sent successfully",
      "output":  report.output,
    }))
    .into_response(),
  )
}

/// `GET /digest/status`
pub async fn status<S, R>(
  State(state): State<AppState<S, R>>,
  _auth: CronAuthorized,
) -> Json<DispatchState>
where
  S: CalendarStore + 'static,
  R: DigestRunner + 'static,
{
  Json(state.dispatcher.last_state())
}
