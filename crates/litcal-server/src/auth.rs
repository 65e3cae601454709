//! Cron-secret extractor for the digest endpoints.
//!
//! The secret may arrive in the `x-cron-secret` header (external cron
//! services) or in the `secret` query parameter (hosted schedulers that can
//! only call a plain URL). The header wins when both are present.

use axum::{
  extract::{FromRequestParts, Query},
  http::request::Parts,
};
use litcal_core::store::CalendarStore;
use litcal_digest::DigestRunner;
use serde::Deserialize;

use crate::{AppState, error::Error};

pub const SECRET_HEADER: &str = "x-cron-secret";

/// Zero-size marker: present in the handler means the trigger presented the
/// configured cron secret, or none is configured.
pub struct CronAuthorized;

#[derive(Deserialize)]
struct SecretParam {
  secret: Option<String>,
}

/// The secret presented with a request, if any.
pub fn presented_secret(parts: &Parts) -> Option<String> {
  if let Some(value) = parts.headers.get(SECRET_HEADER) {
    return value.to_str().ok().map(str::to_owned);
  }
  Query::<SecretParam>::try_from_uri(&parts.uri)
    .ok()
    .and_then(|Query(p)| p.secret)
}

impl<S, R> FromRequestParts<AppState<S, R>> for CronAuthorized
where
  S: CalendarStore + 'static,
  R: DigestRunner + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, R>,
  ) -> Result<Self, Self::Rejection> {
    let secret = presented_secret(parts);
    state.dispatcher.authorize(secret.as_deref()).map_err(|_| {
      tracing::warn!(uri = %parts.uri.path(), "rejected request with invalid cron secret");
      Error::Unauthorized
    })?;
    Ok(CronAuthorized)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::Request;

  use super::*;

  fn parts(req: Request<()>) -> Parts { req.into_parts().0 }

  #[test]
  fn header_is_read() {
    let p = parts(
      Request::builder()
        .uri("/api/send-daily")
        .header(SECRET_HEADER, "abc")
        .body(())
        .unwrap(),
    );
    assert_eq!(presented_secret(&p).as_deref(), Some("abc"));
  }

  #[test]
  fn query_is_read() {
    let p = parts(Request::builder().uri("/api/send-daily?secret=abc").body(()).unwrap());
    assert_eq!(presented_secret(&p).as_deref(), Some("abc"));
  }

  #[test]
  fn header_wins_over_query() {
    let p = parts(
      Request::builder()
        .uri("/api/send-daily?secret=query")
        .header(SECRET_HEADER, "header")
        .body(())
        .unwrap(),
    );
    assert_eq!(presented_secret(&p).as_deref(), Some("header"));
  }

  #[test]
  fn nothing_presented() {
    let p = parts(Request::builder().uri("/api/send-daily").body(()).unwrap());
    assert_eq!(presented_secret(&p), None);
  }
}
