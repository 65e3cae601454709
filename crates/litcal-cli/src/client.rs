//! Async HTTP client wrapping the litcal JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use litcal_core::{
  event::{Event, EventStats, EventWithReferences},
  reference::Reference,
  transfer::ImportSummary,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection settings for the litcal API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:    String,
  /// Sent as `x-cron-secret` on digest requests.
  pub cron_secret: Option<String>,
}

/// Async HTTP client for the litcal JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

// ─── Request and response bodies ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EventList {
  pub events: Vec<Event>,
  pub stats:  EventStats,
}

#[derive(Debug, Serialize)]
pub struct EventInput {
  pub day:         u32,
  pub month:       u32,
  pub title:       String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub event_type:  Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub year:        Option<i32>,
}

/// Absent fields are left unchanged; `Some(None)` clears.
#[derive(Debug, Default, Serialize)]
pub struct EventUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title:       Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<Option<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub year:        Option<Option<i32>>,
}

#[derive(Debug, Serialize)]
pub struct ReferenceInput {
  pub event_id:       i64,
  pub reference_type: String,
  pub reference_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reference_uuid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reference_slug: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority:       Option<i64>,
}

#[derive(Debug, Default, Serialize)]
pub struct ReferenceUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reference_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reference_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reference_uuid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reference_slug: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority:       Option<i64>,
}

#[derive(Deserialize)]
struct EventEnvelope {
  event: Event,
}

#[derive(Deserialize)]
struct ReferenceEnvelope {
  reference: Reference,
}

#[derive(Deserialize)]
struct ReferenceList {
  references: Vec<Reference>,
}

#[derive(Deserialize)]
struct DateListing {
  events: Vec<EventWithReferences>,
}

#[derive(Deserialize)]
struct DigestSent {
  #[serde(default)]
  output: String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      // A digest run may take minutes.
      .timeout(Duration::from_secs(600))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn with_secret(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.cron_secret {
      Some(secret) => req.header("x-cron-secret", secret),
      None => req,
    }
  }

  async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    if resp.status().is_success() {
      return Ok(resp);
    }
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    Err(anyhow!("{what} → {status}: {}", error_message(&body)))
  }

  // ── Events ────────────────────────────────────────────────────────────────

  /// `GET /api/events[?month=<m>]`
  pub async fn list_events(&self, month: Option<u32>) -> Result<EventList> {
    let mut req = self.client.get(self.url("/events"));
    if let Some(m) = month {
      req = req.query(&[("month", m)]);
    }
    self
      .send(req, "GET /events")
      .await?
      .json()
      .await
      .context("deserialising events")
  }

  /// `GET /api/events/{id}`
  pub async fn get_event(&self, id: i64) -> Result<Event> {
    let path = format!("/events/{id}");
    self
      .send(self.client.get(self.url(&path)), &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising event")
  }

  /// `POST /api/events`
  pub async fn create_event(&self, input: &EventInput) -> Result<Event> {
    let env: EventEnvelope = self
      .send(self.client.post(self.url("/events")).json(input), "POST /events")
      .await?
      .json()
      .await
      .context("deserialising created event")?;
    Ok(env.event)
  }

  /// `PUT /api/events/{id}`
  pub async fn update_event(&self, id: i64, update: &EventUpdate) -> Result<Event> {
    let path = format!("/events/{id}");
    let env: EventEnvelope = self
      .send(self.client.put(self.url(&path)).json(update), &format!("PUT {path}"))
      .await?
      .json()
      .await
      .context("deserialising updated event")?;
    Ok(env.event)
  }

  /// `DELETE /api/events/{id}`
  pub async fn delete_event(&self, id: i64) -> Result<()> {
    let path = format!("/events/{id}");
    self
      .send(self.client.delete(self.url(&path)), &format!("DELETE {path}"))
      .await?;
    Ok(())
  }

  /// `GET /api/dates/{month}/{day}`
  pub async fn events_on(&self, month: u32, day: u32) -> Result<Vec<EventWithReferences>> {
    let path = format!("/dates/{month}/{day}");
    let listing: DateListing = self
      .send(self.client.get(self.url(&path)), &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising date listing")?;
    Ok(listing.events)
  }

  // ── References ────────────────────────────────────────────────────────────

  /// `GET /api/events/{id}/references`
  pub async fn list_references(&self, event_id: i64) -> Result<Vec<Reference>> {
    let path = format!("/events/{event_id}/references");
    let list: ReferenceList = self
      .send(self.client.get(self.url(&path)), &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising references")?;
    Ok(list.references)
  }

  /// `POST /api/references`
  pub async fn create_reference(&self, input: &ReferenceInput) -> Result<Reference> {
    let env: ReferenceEnvelope = self
      .send(
        self.client.post(self.url("/references")).json(input),
        "POST /references",
      )
      .await?
      .json()
      .await
      .context("deserialising created reference")?;
    Ok(env.reference)
  }

  /// `PUT /api/references/{id}`
  pub async fn update_reference(
    &self,
    id: i64,
    update: &ReferenceUpdate,
  ) -> Result<Reference> {
    let path = format!("/references/{id}");
    let env: ReferenceEnvelope = self
      .send(self.client.put(self.url(&path)).json(update), &format!("PUT {path}"))
      .await?
      .json()
      .await
      .context("deserialising updated reference")?;
    Ok(env.reference)
  }

  /// `DELETE /api/references/{id}`
  pub async fn delete_reference(&self, id: i64) -> Result<()> {
    let path = format!("/references/{id}");
    self
      .send(self.client.delete(self.url(&path)), &format!("DELETE {path}"))
      .await?;
    Ok(())
  }

  // ── CSV transfer ──────────────────────────────────────────────────────────

  /// `GET /api/export`; the whole calendar as CSV text.
  pub async fn export_csv(&self) -> Result<String> {
    self
      .send(self.client.get(self.url("/export")), "GET /export")
      .await?
      .text()
      .await
      .context("reading exported CSV")
  }

  /// `POST /api/import`
  pub async fn import_csv(&self, sheet: String) -> Result<ImportSummary> {
    self
      .send(
        self
          .client
          .post(self.url("/import"))
          .header(reqwest::header::CONTENT_TYPE, "text/csv")
          .body(sheet),
        "POST /import",
      )
      .await?
      .json()
      .await
      .context("deserialising import summary")
  }

  // ── Digest ────────────────────────────────────────────────────────────────

  /// `POST /api/send-daily`; returns the routine's output.
  pub async fn send_daily(&self) -> Result<String> {
    let sent: DigestSent = self
      .send(
        self.with_secret(self.client.post(self.url("/send-daily"))),
        "POST /send-daily",
      )
      .await?
      .json()
      .await
      .context("deserialising digest result")?;
    Ok(sent.output)
  }

  /// `GET /api/digest/status`
  pub async fn digest_status(&self) -> Result<Value> {
    self
      .send(
        self.with_secret(self.client.get(self.url("/digest/status"))),
        "GET /digest/status",
      )
      .await?
      .json()
      .await
      .context("deserialising digest status")
  }
}

/// Pull the human-readable part out of an error body. For digest failures
/// `error` holds the routine's stderr.
fn error_message(body: &Value) -> String {
  let field = |k: &str| body.get(k).and_then(Value::as_str).filter(|s| !s.is_empty());
  match (field("status"), field("error"), field("message")) {
    (Some("error"), Some(detail), Some(msg)) => format!("{msg}: {}", detail.trim_end()),
    (_, _, Some(msg)) => msg.to_string(),
    (_, Some(err), None) => err.to_string(),
    _ => "no error details".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn api_error_uses_message() {
    let body = json!({ "success": false, "error": "validation", "message": "title must not be empty" });
    assert_eq!(error_message(&body), "title must not be empty");
  }

  #[test]
  fn digest_error_includes_stderr() {
    let body = json!({
      "status": "error", "message": "Failed to send daily digest",
      "error": "BOT_TOKEN not set\n", "code": 1,
    });
    assert_eq!(error_message(&body), "Failed to send daily digest: BOT_TOKEN not set");
  }

  #[test]
  fn method_error_has_only_error_field() {
    assert_eq!(error_message(&json!({ "error": "Method not allowed" })), "Method not allowed");
    assert_eq!(error_message(&Value::Null), "no error details");
  }

  #[test]
  fn update_omits_untouched_fields() {
    let update = EventUpdate { year: Some(None), ..Default::default() };
    assert_eq!(serde_json::to_value(update).unwrap(), json!({ "year": null }));
  }
}
