//! Browser state machine and key dispatcher.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use litcal_core::{
  date::MonthDay,
  event::{Event, EventStats},
  reference::Reference,
};

use crate::{client::ApiClient, search::fuzzy_filter};

// ─── Screen ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the event list.
  EventList,
  /// Focus on the detail pane of the selected event.
  EventDetail,
}

// ─── App ─────────────────────────────────────────────────────────────────────

pub struct App {
  pub screen: Screen,

  /// Events of the current month filter, in calendar order.
  pub events: Vec<Event>,
  pub stats:  EventStats,

  /// `None` shows the whole year.
  pub month:    Option<u32>,
  /// Zone deciding which month `t` jumps to.
  pub timezone: Tz,

  pub filter:        String,
  pub filter_active: bool,

  /// Cursor position within the *filtered* event list.
  pub list_cursor: usize,

  pub detail_scroll: usize,

  /// Event shown in the detail pane.
  pub selected:   Option<Event>,
  pub references: Vec<Reference>,

  /// Set after `d`; the next `y` deletes the selected event.
  pub confirm_delete: bool,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  pub client: Arc<ApiClient>,
}

impl App {
  pub fn new(client: ApiClient, timezone: Tz) -> Self {
    Self {
      screen: Screen::EventList,
      events: Vec::new(),
      stats: EventStats::default(),
      month: None,
      timezone,
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      detail_scroll: 0,
      selected: None,
      references: Vec::new(),
      confirm_delete: false,
      status_msg: String::new(),
      client: Arc::new(client),
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch the events for the current month filter.
  pub async fn load_events(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading events…".into();
    match self.client.list_events(self.month).await {
      Ok(list) => {
        self.events = list.events;
        self.stats = list.stats;
        self.clamp_cursor();
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// Re-fetch the list and, when an event is open, its detail.
  async fn reload(&mut self) -> anyhow::Result<()> {
    self.load_events().await?;
    if let Some(id) = self.selected.as_ref().map(|e| e.id) {
      if self.events.iter().any(|e| e.id == id) {
        self.open_detail(id).await?;
      } else {
        self.close_detail();
      }
    }
    Ok(())
  }

  async fn open_detail(&mut self, id: i64) -> anyhow::Result<()> {
    self.status_msg = "Loading…".into();
    let loaded = async {
      let event = self.client.get_event(id).await?;
      let references = self.client.list_references(id).await?;
      anyhow::Ok((event, references))
    }
    .await;
    match loaded {
      Ok((event, references)) => {
        self.selected = Some(event);
        self.references = references;
        self.detail_scroll = 0;
        self.screen = Screen::EventDetail;
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  fn close_detail(&mut self) {
    self.screen = Screen::EventList;
    self.selected = None;
    self.references.clear();
    self.confirm_delete = false;
  }

  // ── Filtered list ─────────────────────────────────────────────────────────

  pub fn filtered_events(&self) -> Vec<&Event> { fuzzy_filter(&self.events, &self.filter) }

  pub fn cursor_event(&self) -> Option<&Event> {
    self.filtered_events().get(self.list_cursor).copied()
  }

  fn clamp_cursor(&mut self) {
    let len = self.filtered_events().len();
    self.list_cursor = self.list_cursor.min(len.saturating_sub(1));
  }

  pub fn current_month(&self) -> u32 { MonthDay::today_in(&self.timezone, Utc::now()).month }

  pub fn month_label(&self) -> String {
    match self.month {
      Some(m) => format!("month {m:02}"),
      None => "all months".to_string(),
    }
  }

  /// Step the month filter through `all, 1, 2, …, 12, all`.
  async fn shift_month(&mut self, forward: bool) -> anyhow::Result<()> {
    self.month = match (self.month, forward) {
      (None, true) => Some(1),
      (None, false) => Some(12),
      (Some(12), true) | (Some(1), false) => None,
      (Some(m), true) => Some(m + 1),
      (Some(m), false) => Some(m - 1),
    };
    self.list_cursor = 0;
    self.close_detail();
    self.load_events().await
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if self.filter_active {
      return self.handle_filter_key(key).await;
    }

    if self.confirm_delete {
      return self.handle_confirm_key(key).await;
    }

    match self.screen {
      Screen::EventList => self.handle_list_key(key).await,
      Screen::EventDetail => self.handle_detail_key(key).await,
    }
  }

  async fn handle_filter_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
        // Open straight away when exactly one event matches.
        let only = match self.filtered_events().as_slice() {
          [one] => Some(one.id),
          _ => None,
        };
        if let Some(id) = only {
          self.open_detail(id).await?;
        }
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
    Ok(true)
  }

  async fn handle_confirm_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    self.confirm_delete = false;
    let target = self
      .selected
      .as_ref()
      .or_else(|| self.cursor_event())
      .map(|e| (e.id, e.title.clone()));

    match (key.code, target) {
      (KeyCode::Char('y') | KeyCode::Char('Y'), Some((id, title))) => {
        match self.client.delete_event(id).await {
          Ok(()) => {
            self.close_detail();
            self.load_events().await?;
            self.status_msg = format!("Deleted \"{title}\"");
          }
          Err(e) => self.status_msg = format!("Error: {e}"),
        }
      }
      _ => self.status_msg = "Delete cancelled".into(),
    }
    Ok(true)
  }

  async fn handle_list_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_events().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(id) = self.cursor_event().map(|e| e.id) {
          self.open_detail(id).await?;
        }
      }

      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }

      KeyCode::Char('m') => self.shift_month(true).await?,
      KeyCode::Char('M') => self.shift_month(false).await?,
      KeyCode::Char('t') => {
        self.month = Some(self.current_month());
        self.list_cursor = 0;
        self.load_events().await?;
      }
      KeyCode::Char('r') => self.reload().await?,
      KeyCode::Char('d') => self.ask_delete(),

      _ => {}
    }
    Ok(true)
  }

  async fn handle_detail_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => self.close_detail(),

      KeyCode::Down | KeyCode::Char('j') => {
        if self.detail_scroll + 1 < self.references.len() + 8 {
          self.detail_scroll += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.detail_scroll = self.detail_scroll.saturating_sub(1);
      }

      // Step through the list without leaving the detail pane.
      KeyCode::Char(']') | KeyCode::PageDown => {
        let len = self.filtered_events().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
          if let Some(id) = self.cursor_event().map(|e| e.id) {
            self.open_detail(id).await?;
          }
        }
      }
      KeyCode::Char('[') | KeyCode::PageUp => {
        if self.list_cursor > 0 {
          self.list_cursor -= 1;
          if let Some(id) = self.cursor_event().map(|e| e.id) {
            self.open_detail(id).await?;
          }
        }
      }

      KeyCode::Char('r') => self.reload().await?,
      KeyCode::Char('d') => self.ask_delete(),

      _ => {}
    }
    Ok(true)
  }

  fn ask_delete(&mut self) {
    let title = self
      .selected
      .as_ref()
      .or_else(|| self.cursor_event())
      .map(|e| e.title.clone());
    if let Some(title) = title {
      self.confirm_delete = true;
      self.status_msg = format!("Delete \"{title}\" and its references? [y/N]");
    }
  }
}
