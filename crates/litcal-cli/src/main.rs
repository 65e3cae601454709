//! `litcal` — command-line client for the literary calendar server.
//!
//! # Usage
//!
//! ```
//! litcal                                # interactive browser
//! litcal events list --month 6
//! litcal events add --day 6 --month 6 --year 1799 --title "Pushkin born"
//! litcal events export calendar.csv
//! litcal refs add 12 --type author --name "A. S. Pushkin" --uuid auto
//! litcal digest trigger --secret s3cret
//! ```

mod app;
mod client;
mod render;
mod search;
mod ui;

use std::{io, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use app::App;
use chrono::Utc;
use chrono_tz::Tz;
use clap::{Args as ClapArgs, Parser, Subcommand};
use client::{ApiClient, ApiConfig, EventInput, EventUpdate, ReferenceInput, ReferenceUpdate};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use litcal_core::date::MonthDay;
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "litcal", about = "Client for the literary calendar server")]
struct Args {
  /// Path to a TOML config file (url, cron_secret, timezone).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Base URL of the litcal server (default: http://localhost:8080).
  #[arg(long, env = "LITCAL_URL", global = true)]
  url: Option<String>,

  /// Cron secret for the digest endpoints.
  #[arg(long, env = "CRON_SECRET", global = true, hide_env_values = true)]
  secret: Option<String>,

  /// IANA zone deciding what "today" is (default: Europe/Moscow, as on the
  /// server).
  #[arg(long, env = "LITCAL_TIMEZONE", global = true)]
  timezone: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Browse events interactively (default).
  Browse,
  /// Manage events.
  #[command(subcommand)]
  Events(EventsCommand),
  /// Show everything on a calendar day (today by default).
  Today {
    /// Day to show instead of today, as MM-DD.
    #[arg(long, value_parser = parse_month_day)]
    date: Option<MonthDay>,
  },
  /// Manage the references attached to events.
  #[command(subcommand)]
  Refs(RefsCommand),
  /// Trigger or inspect the daily digest.
  #[command(subcommand)]
  Digest(DigestCommand),
}

#[derive(Subcommand, Debug)]
enum EventsCommand {
  /// List events in calendar order.
  List {
    #[arg(long)]
    month: Option<u32>,
  },
  /// Show one event with its references.
  Show { id: i64 },
  /// Create an event.
  Add {
    #[arg(long)]
    title: String,
    #[arg(long)]
    day: u32,
    #[arg(long)]
    month: u32,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long = "type")]
    event_type: Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
  /// Edit the title, description or year of an event.
  Edit {
    id: i64,
    #[command(flatten)]
    changes: EventChanges,
  },
  /// Delete an event and its references.
  Delete { id: i64 },
  /// Fuzzy-search titles and descriptions.
  Search {
    query: String,
    #[arg(long)]
    month: Option<u32>,
  },
  /// Write every event and reference to a CSV file.
  Export { file: PathBuf },
  /// Add the events and references of a CSV file. Nothing is added if any
  /// row is invalid.
  Import { file: PathBuf },
}

#[derive(ClapArgs, Debug)]
struct EventChanges {
  #[arg(long)]
  title: Option<String>,
  #[arg(long, conflicts_with = "clear_description")]
  description: Option<String>,
  #[arg(long)]
  clear_description: bool,
  #[arg(long, conflicts_with = "clear_year")]
  year: Option<i32>,
  #[arg(long)]
  clear_year: bool,
}

impl EventChanges {
  fn into_update(self) -> EventUpdate {
    fn field<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
      if clear { Some(None) } else { value.map(Some) }
    }
    EventUpdate {
      title:       self.title,
      description: field(self.description, self.clear_description),
      year:        field(self.year, self.clear_year),
    }
  }
}

#[derive(Subcommand, Debug)]
enum RefsCommand {
  /// List the references of an event.
  List { event_id: i64 },
  /// Attach a reference to an event.
  Add {
    event_id: i64,
    #[arg(long = "type")]
    reference_type: String,
    #[arg(long = "name")]
    reference_name: String,
    /// Use `auto` to generate one.
    #[arg(long)]
    uuid: Option<String>,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    priority: Option<i64>,
  },
  /// Edit a reference.
  Edit {
    id: i64,
    #[arg(long = "type")]
    reference_type: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    uuid: Option<String>,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    priority: Option<i64>,
  },
  /// Delete a reference.
  Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum DigestCommand {
  /// Run the digest routine now and print its output.
  Trigger,
  /// Show the outcome of the most recent run.
  Status,
}

fn parse_month_day(s: &str) -> Result<MonthDay> {
  let Some((month, day)) = s.split_once('-') else {
    bail!("expected MM-DD, got {s:?}");
  };
  let month = month.parse().with_context(|| format!("bad month in {s:?}"))?;
  let day = day.parse().with_context(|| format!("bad day in {s:?}"))?;
  Ok(MonthDay::new(month, day)?)
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:         String,
  #[serde(default)]
  cron_secret: String,
  #[serde(default)]
  timezone:    String,
}

fn non_empty(s: String) -> Option<String> { (!s.is_empty()).then_some(s) }

fn parse_timezone(name: &str) -> Result<Tz> {
  name.parse().map_err(|_| anyhow::anyhow!("unknown timezone {name:?}"))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url:    args
      .url
      .or_else(|| non_empty(file_cfg.url))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    cron_secret: args.secret.or_else(|| non_empty(file_cfg.cron_secret)),
  };
  let client = ApiClient::new(api_config)?;
  let timezone = parse_timezone(
    &args
      .timezone
      .or_else(|| non_empty(file_cfg.timezone))
      .unwrap_or_else(|| "Europe/Moscow".to_string()),
  )?;

  let command = args.command.unwrap_or(Command::Browse);
  // Logging would garble the TUI, so only subcommands get it.
  if !matches!(command, Command::Browse) {
    tracing_subscriber::fmt()
      .with_writer(io::stderr)
      .with_env_filter(
        EnvFilter::builder()
          .with_default_directive(LevelFilter::WARN.into())
          .from_env_lossy(),
      )
      .init();
  }
  run_command(client, timezone, command).await
}

// ─── Subcommands ──────────────────────────────────────────────────────────────

async fn run_command(client: ApiClient, timezone: Tz, command: Command) -> Result<()> {
  match command {
    Command::Browse => return browse(client, timezone).await,

    Command::Events(cmd) => match cmd {
      EventsCommand::List { month } => {
        let list = client.list_events(month).await?;
        print!("{}", render::events_table(&list.events));
        println!("\n{}", render::stats(&list.stats));
      }
      EventsCommand::Show { id } => {
        let event = client.get_event(id).await?;
        let references = client.list_references(id).await?;
        print!("{}", render::event_detail(&event, &references));
      }
      EventsCommand::Add { title, day, month, year, event_type, description } => {
        let input = EventInput { day, month, title, event_type, description, year };
        let event = client.create_event(&input).await?;
        tracing::info!(id = event.id, "created event");
        println!("created #{} on {}", event.id, event.date());
      }
      EventsCommand::Edit { id, changes } => {
        let event = client.update_event(id, &changes.into_update()).await?;
        print!("{}", render::events_table([&event]));
      }
      EventsCommand::Delete { id } => {
        client.delete_event(id).await?;
        println!("deleted #{id}");
      }
      EventsCommand::Search { query, month } => {
        let list = client.list_events(month).await?;
        let hits = search::fuzzy_filter(&list.events, &query);
        if hits.is_empty() {
          println!("no events match {query:?}");
        } else {
          print!("{}", render::events_table(hits));
        }
      }
      EventsCommand::Export { file } => {
        let sheet = client.export_csv().await?;
        std::fs::write(&file, &sheet).with_context(|| format!("writing {}", file.display()))?;
        println!("exported {} rows to {}", sheet.lines().count().saturating_sub(1), file.display());
      }
      EventsCommand::Import { file } => {
        let sheet = std::fs::read_to_string(&file)
          .with_context(|| format!("reading {}", file.display()))?;
        let summary = client.import_csv(sheet).await?;
        println!(
          "imported {} events and {} references",
          summary.events, summary.references
        );
      }
    },

    Command::Today { date } => {
      let date = date.unwrap_or_else(|| MonthDay::today_in(&timezone, Utc::now()));
      let events = client.events_on(date.month, date.day).await?;
      println!("{date}\n");
      print!("{}", render::date_listing(&events));
    }

    Command::Refs(cmd) => match cmd {
      RefsCommand::List { event_id } => {
        print!("{}", render::references_table(&client.list_references(event_id).await?));
      }
      RefsCommand::Add { event_id, reference_type, reference_name, uuid, slug, priority } => {
        let input = ReferenceInput {
          event_id,
          reference_type,
          reference_name,
          reference_uuid: uuid,
          reference_slug: slug,
          priority,
        };
        let reference = client.create_reference(&input).await?;
        print!("{}", render::references_table(&[reference]));
      }
      RefsCommand::Edit { id, reference_type, name, uuid, slug, priority } => {
        let update = ReferenceUpdate {
          reference_type,
          reference_name: name,
          reference_uuid: uuid,
          reference_slug: slug,
          priority,
        };
        let reference = client.update_reference(id, &update).await?;
        print!("{}", render::references_table(&[reference]));
      }
      RefsCommand::Delete { id } => {
        client.delete_reference(id).await?;
        println!("deleted reference #{id}");
      }
    },

    Command::Digest(cmd) => match cmd {
      DigestCommand::Trigger => {
        let output = client.send_daily().await?;
        println!("Daily digest sent successfully");
        if !output.is_empty() {
          print!("\n{output}");
        }
      }
      DigestCommand::Status => {
        let status = client.digest_status().await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
      }
    },
  }
  Ok(())
}

// ─── Browser ──────────────────────────────────────────────────────────────────

async fn browse(client: ApiClient, timezone: Tz) -> Result<()> {
  let mut app = App::new(client, timezone);
  app.month = Some(app.current_month());

  // Fail before touching the terminal if the server is unreachable.
  app.load_events().await?;

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let run_result = run_event_loop(&mut terminal, &mut app).await;

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      match app.handle_key(key).await {
        Ok(true) => {}
        Ok(false) => break,
        // Request failures are already in the status bar.
        Err(_) => {}
      }
    }
  }

  Ok(())
}
