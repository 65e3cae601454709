//! litcal server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `LITCAL_*` environment variables, opens the SQLite store, and serves the
//! JSON API and the digest trigger over HTTP.
//!
//! # One-shot digest
//!
//! To run the digest routine once from a system crontab instead of over
//! HTTP:
//!
//! ```
//! litcal-server --config /etc/litcal/config.toml --send-daily
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use litcal_digest::Dispatcher;
use litcal_server::{AppState, ServerConfig};
use litcal_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Literary calendar server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Run the daily digest once, print its output and exit.
  #[arg(long)]
  send_daily: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("LITCAL")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // The scheduler-facing secret is conventionally provided as CRON_SECRET.
  if server_cfg.cron_secret.is_none() {
    server_cfg.cron_secret = std::env::var("CRON_SECRET").ok();
  }

  let timezone = server_cfg.timezone().context("invalid `timezone` setting")?;
  let runner   = server_cfg.digest.runner();
  let dispatcher = Dispatcher::new(runner, server_cfg.dispatch_config());

  if !dispatcher.requires_secret() {
    tracing::warn!("no cron secret configured; /api/send-daily is open to anyone");
  }

  // Helper mode: run the digest once and exit.
  if cli.send_daily {
    let report = dispatcher
      .dispatch()
      .await
      .context("daily digest failed")?;
    print!("{}", report.output);
    return Ok(());
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let state = AppState {
    store: Arc::new(store),
    dispatcher: Arc::new(dispatcher),
    timezone,
  };

  let app = litcal_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(%timezone, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
