//! Trigger handling for the daily digest.
//!
//! A trigger passes the secret guard, runs the routine exactly once and
//! records the outcome:
//!
//! ```text
//! Idle ──trigger──▶ Running ──exit 0──▶ Succeeded
//!                      │
//!                      └──spawn error / exit ≠ 0 / timeout──▶ Failed
//! ```
//!
//! There is no retry. A failed run stays failed until the next trigger.
//!
//! When runs overlap, the state reads `Running` while any of them is still
//! going, and the outcome recorded is that of the most recently started run.

use std::{
  sync::{Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use tracing::{error, info, warn};

use crate::{
  error::DispatchError,
  runner::{DigestRequest, DigestRunner},
};

/// Default upper bound on one routine run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatchConfig {
  /// When set, every trigger must present this secret. An empty string
  /// counts as unset.
  pub cron_secret:   Option<String>,
  /// `None` lets the routine run for as long as it takes.
  pub timeout:       Option<Duration>,
  /// When `false`, a trigger arriving while a run is in progress fails with
  /// [`DispatchError::AlreadyRunning`] instead of starting a second run.
  pub allow_overlap: bool,
  /// Environment handed to the routine on every run.
  pub env:           Vec<(String, String)>,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      cron_secret:   None,
      timeout:       Some(DEFAULT_TIMEOUT),
      allow_overlap: true,
      env:           Vec::new(),
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Lifecycle of the most recent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchState {
  Idle,
  Running {
    started_at: DateTime<Utc>,
  },
  Succeeded {
    started_at:  DateTime<Utc>,
    finished_at: DateTime<Utc>,
  },
  Failed {
    started_at:  DateTime<Utc>,
    finished_at: DateTime<Utc>,
    reason:      String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code:        Option<i32>,
  },
}

impl DispatchState {
  pub fn is_running(&self) -> bool { matches!(self, Self::Running { .. }) }
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct DigestReport {
  /// Everything the routine wrote to stdout.
  pub output:      String,
  pub stderr:      String,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

pub struct Dispatcher<R> {
  runner:        R,
  secret_digest: Option<Vec<u8>>,
  timeout:       Option<Duration>,
  allow_overlap: bool,
  env:           Vec<(String, String)>,
  gate:          tokio::sync::Mutex<()>,
  runs:          Mutex<Runs>,
}

/// Bookkeeping behind [`Dispatcher::last_state`].
#[derive(Debug)]
struct Runs {
  active:         usize,
  /// Sequence number of the most recently started run.
  newest:         u64,
  newest_started: Option<DateTime<Utc>>,
  /// Outcome of the newest run that has finished.
  outcome:        DispatchState,
}

fn lock_runs(runs: &Mutex<Runs>) -> MutexGuard<'_, Runs> {
  runs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One in-flight run. Dropping it, even when the dispatch future is
/// cancelled, takes the run out of the active count.
struct ActiveRun<'a> {
  runs: &'a Mutex<Runs>,
  seq:  u64,
}

impl<'a> ActiveRun<'a> {
  fn start(runs: &'a Mutex<Runs>, started_at: DateTime<Utc>) -> Self {
    let mut guard = lock_runs(runs);
    guard.active += 1;
    guard.newest += 1;
    guard.newest_started = Some(started_at);
    let seq = guard.newest;
    drop(guard);
    Self { runs, seq }
  }

  /// Record `outcome` unless a newer run has started meanwhile.
  fn finish(self, outcome: DispatchState) {
    let mut guard = lock_runs(self.runs);
    if guard.newest == self.seq {
      guard.outcome = outcome;
    }
  }
}

impl Drop for ActiveRun<'_> {
  fn drop(&mut self) {
    let mut guard = lock_runs(self.runs);
    guard.active = guard.active.saturating_sub(1);
  }
}

impl<R: DigestRunner> Dispatcher<R> {
  pub fn new(runner: R, config: DispatchConfig) -> Self {
    let secret_digest = config
      .cron_secret
      .filter(|s| !s.is_empty())
      .map(|s| Sha256::digest(s.as_bytes()).to_vec());

    Self {
      runner,
      secret_digest,
      timeout: config.timeout,
      allow_overlap: config.allow_overlap,
      env: config.env,
      gate: tokio::sync::Mutex::new(()),
      runs: Mutex::new(Runs {
        active:         0,
        newest:         0,
        newest_started: None,
        outcome:        DispatchState::Idle,
      }),
    }
  }

  pub fn runner(&self) -> &R { &self.runner }

  /// Whether triggers must present a secret.
  pub fn requires_secret(&self) -> bool { self.secret_digest.is_some() }

  /// Check a presented secret against the configured one.
  ///
  /// Both sides are hashed before comparing.
  pub fn authorize(&self, provided: Option<&str>) -> Result<(), DispatchError> {
    let Some(expected) = &self.secret_digest else {
      return Ok(());
    };
    let provided = provided.ok_or(DispatchError::Unauthorized)?;
    let digest = Sha256::digest(provided.as_bytes());
    if digest.as_slice() == expected.as_slice() {
      Ok(())
    } else {
      Err(DispatchError::Unauthorized)
    }
  }

  /// Authorize and run.
  pub async fn trigger(
    &self,
    provided_secret: Option<&str>,
  ) -> Result<DigestReport, DispatchError> {
    if let Err(e) = self.authorize(provided_secret) {
      warn!("digest trigger rejected: invalid cron secret");
      return Err(e);
    }
    self.dispatch().await
  }

  /// Run the routine once. The caller is responsible for authorization.
  pub async fn dispatch(&self) -> Result<DigestReport, DispatchError> {
    let _guard = if self.allow_overlap {
      None
    } else {
      match self.gate.try_lock() {
        Ok(guard) => Some(guard),
        Err(_) => {
          warn!("digest trigger refused: previous run still in progress");
          return Err(DispatchError::AlreadyRunning);
        }
      }
    };

    let started_at = Utc::now();
    let run = ActiveRun::start(&self.runs, started_at);
    info!(run = run.seq, "digest run started");

    let request = DigestRequest { env: self.env.clone() };
    let outcome = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, self.runner.run(request)).await {
        Ok(result) => result.map_err(DispatchError::from),
        Err(_) => Err(DispatchError::TimedOut(limit)),
      },
      None => self.runner.run(request).await.map_err(DispatchError::from),
    };

    let finished_at = Utc::now();
    let result = outcome.and_then(|out| {
      if out.success() {
        Ok(DigestReport {
          output: out.stdout,
          stderr: out.stderr,
          started_at,
          finished_at,
        })
      } else {
        Err(DispatchError::Exited { code: out.exit_code, stderr: out.stderr })
      }
    });

    match &result {
      Ok(_) => {
        info!(run = run.seq, elapsed_ms = elapsed_ms(started_at, finished_at), "digest sent");
        run.finish(DispatchState::Succeeded { started_at, finished_at });
      }
      Err(e) => {
        error!(run = run.seq, error = %e, code = e.code(), "digest run failed");
        run.finish(DispatchState::Failed {
          started_at,
          finished_at,
          reason: e.to_string(),
          code: e.code(),
        });
      }
    }

    result
  }

  /// `Running` while any run is in progress, otherwise the outcome of the
  /// most recently started run.
  pub fn last_state(&self) -> DispatchState {
    let runs = lock_runs(&self.runs);
    match runs.newest_started {
      Some(started_at) if runs.active > 0 => DispatchState::Running { started_at },
      _ => runs.outcome.clone(),
    }
  }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
  (to - from).num_milliseconds()
}
