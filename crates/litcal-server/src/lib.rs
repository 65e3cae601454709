//! HTTP server for the literary calendar.
//!
//! Mounts the JSON API from `litcal-api` and the cron-triggered digest
//! endpoints under `/api`, all behind a request trace layer.

pub mod auth;
pub mod digest;
pub mod error;

pub use error::Error;

use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{any, get},
};
use chrono_tz::Tz;
use litcal_api::ApiState;
use litcal_core::store::CalendarStore;
use litcal_digest::{DigestRunner, DispatchConfig, Dispatcher, ProcessRunner};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LITCAL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:        String,
  #[serde(default = "default_port")]
  pub port:        u16,
  #[serde(default = "default_store_path")]
  pub store_path:  PathBuf,
  /// IANA zone name deciding which events are "today's".
  #[serde(default = "default_timezone")]
  pub timezone:    String,
  pub cron_secret: Option<String>,
  #[serde(default)]
  pub digest:      DigestSettings,
}

/// How the daily digest routine is launched.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DigestSettings {
  pub program:          String,
  pub args:             Vec<String>,
  pub working_dir:      Option<PathBuf>,
  /// `0` disables the timeout.
  pub timeout_secs:     u64,
  pub allow_overlap:    bool,
  pub bot_token:        Option<String>,
  pub graphql_endpoint: Option<String>,
  pub group_chat_id:    Option<String>,
  pub calendar_url:     Option<String>,
  /// Additional variables for the routine's environment. Names are
  /// upper-cased on the way out, since the `config` crate lower-cases keys
  /// read from files and `LITCAL_*` variables.
  pub extra_env:        BTreeMap<String, String>,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("literary_events.db") }
fn default_timezone() -> String { "Europe/Moscow".to_string() }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:        default_host(),
      port:        default_port(),
      store_path:  default_store_path(),
      timezone:    default_timezone(),
      cron_secret: None,
      digest:      DigestSettings::default(),
    }
  }
}

impl Default for DigestSettings {
  fn default() -> Self {
    Self {
      program:          "python3".to_string(),
      args:             vec!["send_daily.py".to_string()],
      working_dir:      None,
      timeout_secs:     300,
      allow_overlap:    true,
      bot_token:        None,
      graphql_endpoint: None,
      group_chat_id:    None,
      calendar_url:     None,
      extra_env:        BTreeMap::new(),
    }
  }
}

impl ServerConfig {
  pub fn timezone(&self) -> Result<Tz, Error> {
    self
      .timezone
      .parse()
      .map_err(|_| Error::InvalidTimezone(self.timezone.clone()))
  }

  pub fn dispatch_config(&self) -> DispatchConfig {
    DispatchConfig {
      cron_secret:   self.cron_secret.clone(),
      timeout:       self.digest.timeout(),
      allow_overlap: self.digest.allow_overlap,
      env:           self.digest.env(),
    }
  }
}

impl DigestSettings {
  pub fn timeout(&self) -> Option<Duration> {
    (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
  }

  /// Variables set on the routine on top of the server's own environment.
  /// Unset settings are left out so inherited values still apply.
  pub fn env(&self) -> Vec<(String, String)> {
    let named = [
      ("BOT_TOKEN", &self.bot_token),
      ("GRAPHQL_ENDPOINT", &self.graphql_endpoint),
      ("GROUP_CHAT_ID", &self.group_chat_id),
      ("CALENDAR_URL", &self.calendar_url),
    ];
    named
      .into_iter()
      .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
      .chain(self.extra_env.iter().map(|(k, v)| (k.to_ascii_uppercase(), v.clone())))
      .collect()
  }

  pub fn runner(&self) -> ProcessRunner {
    let runner = ProcessRunner::new(self.program.clone(), self.args.clone());
    match &self.working_dir {
      Some(dir) => runner.with_working_dir(dir),
      None => runner,
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, R> {
  pub store:      Arc<S>,
  pub dispatcher: Arc<Dispatcher<R>>,
  pub timezone:   Tz,
}

impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      dispatcher: Arc::clone(&self.dispatcher),
      timezone:   self.timezone,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S, R>(state: AppState<S, R>) -> Router
where
  S: CalendarStore + 'static,
  R: DigestRunner + 'static,
{
  let api = litcal_api::api_router(ApiState::new(
    Arc::clone(&state.store),
    state.timezone,
  ));

  let digest = Router::new()
    .route("/send-daily", any(digest::send_daily::<S, R>))
    .route("/digest/status", get(digest::status::<S, R>))
    .with_state(state);

  Router::new()
    .nest("/api", api.merge(digest))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use litcal_digest::{DigestRequest, RunError, RunOutput};
  use litcal_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  /// Canned-result runner that counts invocations.
  struct FakeRunner {
    calls:     AtomicUsize,
    exit_code: i32,
    stdout:    &'static str,
    stderr:    &'static str,
    delay:     Option<Duration>,
  }

  impl FakeRunner {
    fn new(exit_code: i32, stdout: &'static str, stderr: &'static str) -> Self {
      Self { calls: AtomicUsize::new(0), exit_code, stdout, stderr, delay: None }
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  impl DigestRunner for FakeRunner {
    async fn run(&self, _: DigestRequest) -> Result<RunOutput, RunError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(d) = self.delay {
        tokio::time::sleep(d).await;
      }
      Ok(RunOutput {
        exit_code: self.exit_code,
        stdout:    self.stdout.to_string(),
        stderr:    self.stderr.to_string(),
      })
    }
  }

  async fn make_state(
    runner: FakeRunner,
    config: ServerConfig,
  ) -> AppState<SqliteStore, FakeRunner> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:      Arc::new(store),
      dispatcher: Arc::new(Dispatcher::new(runner, config.dispatch_config())),
      timezone:   config.timezone().unwrap(),
    }
  }

  fn with_secret(secret: &str) -> ServerConfig {
    ServerConfig { cron_secret: Some(secret.to_string()), ..Default::default() }
  }

  async fn oneshot_json(
    state:   AppState<SqliteStore, FakeRunner>,
    method:  &str,
    uri:     &str,
    headers: Vec<(&str, &str)>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req  = builder.body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes  = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  // ── send-daily ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn wrong_secret_is_401_and_runner_untouched() {
    let state = make_state(FakeRunner::new(0, "", ""), with_secret("s3cret")).await;

    let (status, body) = oneshot_json(
      state.clone(),
      "GET",
      "/api/send-daily",
      vec![("x-cron-secret", "wrong")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
      body,
      json!({ "error": "Unauthorized", "message": "Invalid cron secret" })
    );

    let (status, _) = oneshot_json(state.clone(), "GET", "/api/send-daily", vec![]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.dispatcher.runner().calls(), 0);
  }

  #[tokio::test]
  async fn secret_accepted_from_header_or_query() {
    let state = make_state(FakeRunner::new(0, "ok\n", ""), with_secret("s3cret")).await;

    let (status, _) = oneshot_json(
      state.clone(),
      "POST",
      "/api/send-daily",
      vec![("x-cron-secret", "s3cret")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
      oneshot_json(state.clone(), "GET", "/api/send-daily?secret=s3cret", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.dispatcher.runner().calls(), 2);
  }

  #[tokio::test]
  async fn success_returns_output() {
    let state =
      make_state(FakeRunner::new(0, "sent 2 events\n", ""), ServerConfig::default()).await;
    let (status, body) = oneshot_json(state, "GET", "/api/send-daily", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      json!({
        "status":  "success",
        "message": "Daily digest sent successfully",
        "output":  "sent 2 events\n",
      })
    );
  }

  #[tokio::test]
  async fn failing_routine_is_500_with_code() {
    let state =
      make_state(FakeRunner::new(1, "", "token missing"), ServerConfig::default()).await;
    let (status, body) = oneshot_json(state.clone(), "POST", "/api/send-daily", vec![]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "token missing");
    assert_eq!(body["code"], 1);
    assert_eq!(state.dispatcher.runner().calls(), 1);
  }

  #[tokio::test]
  async fn other_methods_are_405() {
    let state = make_state(FakeRunner::new(0, "", ""), ServerConfig::default()).await;
    let (status, body) = oneshot_json(state.clone(), "PUT", "/api/send-daily", vec![]).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "error": "Method not allowed" }));
    assert_eq!(state.dispatcher.runner().calls(), 0);
  }

  #[tokio::test]
  async fn secret_is_checked_before_method() {
    let state = make_state(FakeRunner::new(0, "", ""), with_secret("s3cret")).await;
    let (status, _) = oneshot_json(state, "DELETE", "/api/send-daily", vec![]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test(start_paused = true)]
  async fn overlapping_trigger_is_409_when_disabled() {
    let mut runner = FakeRunner::new(0, "", "");
    runner.delay = Some(Duration::from_secs(5));
    let mut config = ServerConfig::default();
    config.digest.allow_overlap = false;
    let state = make_state(runner, config).await;

    let first = tokio::spawn(oneshot_json(state.clone(), "GET", "/api/send-daily", vec![]));
    while !state.dispatcher.last_state().is_running() {
      tokio::task::yield_now().await;
    }

    let (status, body) = oneshot_json(state.clone(), "GET", "/api/send-daily", vec![]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.dispatcher.runner().calls(), 1);
  }

  // ── digest status ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn status_reports_last_run() {
    let state = make_state(FakeRunner::new(0, "", ""), with_secret("s3cret")).await;
    let auth  = vec![("x-cron-secret", "s3cret")];

    let (status, body) =
      oneshot_json(state.clone(), "GET", "/api/digest/status", auth.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");

    oneshot_json(state.clone(), "GET", "/api/send-daily", auth.clone()).await;
    let (_, body) = oneshot_json(state.clone(), "GET", "/api/digest/status", auth).await;
    assert_eq!(body["state"], "succeeded");

    let (status, _) = oneshot_json(state, "GET", "/api/digest/status", vec![]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  // ── API mount ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn api_is_mounted_without_secret() {
    let state = make_state(FakeRunner::new(0, "", ""), with_secret("s3cret")).await;
    let (status, body) = oneshot_json(state, "GET", "/api/events", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"], json!([]));
  }

  // ── Configuration ───────────────────────────────────────────────────────────

  #[test]
  fn digest_env_skips_unset_values() {
    let mut settings = DigestSettings::default();
    settings.group_chat_id = Some("-100".into());
    settings.extra_env.insert("TIMEZONE".into(), "Europe/Moscow".into());
    assert_eq!(
      settings.env(),
      vec![
        ("GROUP_CHAT_ID".to_string(), "-100".to_string()),
        ("TIMEZONE".to_string(), "Europe/Moscow".to_string()),
      ]
    );
  }

  #[test]
  fn extra_env_names_are_upper_cased() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        "[digest.extra_env]\ntimezone = \"Europe/Moscow\"\n",
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    let parsed: ServerConfig = settings.try_deserialize().unwrap();
    assert_eq!(
      parsed.digest.env(),
      vec![("TIMEZONE".to_string(), "Europe/Moscow".to_string())]
    );
  }

  #[test]
  fn zero_timeout_disables_it() {
    let mut settings = DigestSettings::default();
    assert_eq!(settings.timeout(), Some(Duration::from_secs(300)));
    settings.timeout_secs = 0;
    assert_eq!(settings.timeout(), None);
  }

  #[test]
  fn bad_timezone_is_reported() {
    let config = ServerConfig { timezone: "Mars/Olympus".into(), ..Default::default() };
    assert!(matches!(config.timezone(), Err(Error::InvalidTimezone(_))));
  }

  #[test]
  fn config_overrides_fill_in_defaults() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        "port = 9000\n[digest]\ntimeout_secs = 60\n",
        config::FileFormat::Toml,
      ))
      .set_override("digest.allow_overlap", false)
      .unwrap()
      .build()
      .unwrap();
    let parsed: ServerConfig = settings.try_deserialize().unwrap();
    assert_eq!(parsed.port, 9000);
    assert_eq!(parsed.host, "127.0.0.1");
    assert_eq!(parsed.digest.timeout_secs, 60);
    assert!(!parsed.digest.allow_overlap);
    assert_eq!(parsed.digest.program, "python3");
  }
}
