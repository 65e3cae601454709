//! The process boundary of a digest run.

use std::{future::Future, io, path::PathBuf, process::Stdio};

use tokio::{
  io::{AsyncBufReadExt as _, AsyncRead, BufReader},
  process::Command,
};
use tracing::{debug, info, warn};

use crate::error::RunError;

/// What a runner is asked to do for one trigger.
#[derive(Debug, Clone, Default)]
pub struct DigestRequest {
  /// Variables added to the routine's environment on top of the inherited
  /// one.
  pub env: Vec<(String, String)>,
}

/// Captured result of a routine that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
  /// `-1` when the process was terminated by a signal.
  pub exit_code: i32,
  pub stdout:    String,
  pub stderr:    String,
}

impl RunOutput {
  pub fn success(&self) -> bool { self.exit_code == 0 }
}

/// Executes the digest routine once per call.
///
/// Implementations must not retry; the dispatcher relies on one call being
/// one delivery attempt.
pub trait DigestRunner: Send + Sync {
  fn run(
    &self,
    request: DigestRequest,
  ) -> impl Future<Output = Result<RunOutput, RunError>> + Send + '_;
}

// ─── ProcessRunner ───────────────────────────────────────────────────────────

/// Runs an external program, streaming its output into the log.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
  program:     String,
  args:        Vec<String>,
  working_dir: Option<PathBuf>,
}

impl ProcessRunner {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self { program: program.into(), args, working_dir: None }
  }

  pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.working_dir = Some(dir.into());
    self
  }

  pub fn program(&self) -> &str { &self.program }
}

impl DigestRunner for ProcessRunner {
  async fn run(&self, request: DigestRequest) -> Result<RunOutput, RunError> {
    let mut cmd = Command::new(&self.program);
    cmd
      .args(&self.args)
      .envs(request.env)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(dir) = &self.working_dir {
      cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
      program: self.program.clone(),
      source,
    })?;
    debug!(program = %self.program, pid = child.id(), "digest routine started");

    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
    let stderr = child
      .stderr
      .take()
      .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

    let (stdout, stderr, status) = tokio::join!(
      drain(stdout, Stream::Stdout),
      drain(stderr, Stream::Stderr),
      child.wait(),
    );

    Ok(RunOutput {
      exit_code: status?.code().unwrap_or(-1),
      stdout:    stdout?,
      stderr:    stderr?,
    })
  }
}

#[derive(Clone, Copy)]
enum Stream {
  Stdout,
  Stderr,
}

/// Read `reader` to the end, logging each line as it arrives and returning
/// everything that was read.
async fn drain<R>(reader: R, stream: Stream) -> io::Result<String>
where
  R: AsyncRead + Unpin,
{
  let mut reader    = BufReader::new(reader);
  let mut collected = String::new();
  let mut buf       = Vec::new();

  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      break;
    }
    let chunk = String::from_utf8_lossy(&buf);
    let line  = chunk.trim_end_matches(['\r', '\n']);
    match stream {
      Stream::Stdout => info!(target: "litcal_digest::routine", "{line}"),
      Stream::Stderr => warn!(target: "litcal_digest::routine", "{line}"),
    }
    collected.push_str(&chunk);
  }

  Ok(collected)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;

  fn sh(script: &str) -> ProcessRunner {
    ProcessRunner::new("sh", vec!["-c".into(), script.into()])
  }

  #[tokio::test]
  async fn captures_stdout_and_exit_code() {
    let out = sh("echo one; echo two").run(DigestRequest::default()).await.unwrap();
    assert!(out.success());
    assert_eq!(out.stdout, "one\ntwo\n");
    assert!(out.stderr.is_empty());
  }

  #[tokio::test]
  async fn captures_stderr_on_failure() {
    let out = sh("echo boom >&2; exit 1")
      .run(DigestRequest::default())
      .await
      .unwrap();
    assert_eq!(out.exit_code, 1);
    assert_eq!(out.stderr, "boom\n");
  }

  #[tokio::test]
  async fn passes_environment() {
    let request = DigestRequest {
      env: vec![("GROUP_CHAT_ID".into(), "-100500".into())],
    };
    let out = sh("printf %s \"$GROUP_CHAT_ID\"").run(request).await.unwrap();
    assert_eq!(out.stdout, "-100500");
  }

  #[tokio::test]
  async fn runs_in_working_dir() {
    let dir = std::env::temp_dir();
    let out = sh("pwd")
      .with_working_dir(&dir)
      .run(DigestRequest::default())
      .await
      .unwrap();
    let reported = std::path::PathBuf::from(out.stdout.trim());
    assert_eq!(
      reported.canonicalize().unwrap(),
      dir.canonicalize().unwrap()
    );
  }

  #[tokio::test]
  async fn missing_program_is_a_spawn_error() {
    let runner = ProcessRunner::new("litcal-definitely-not-installed", vec![]);
    let err = runner.run(DigestRequest::default()).await.unwrap_err();
    assert!(matches!(err, RunError::Spawn { .. }));
  }
}
