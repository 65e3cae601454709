//! Plain-text rendering for the non-interactive subcommands.

use std::fmt::Write as _;

use litcal_core::{
  event::{Event, EventStats, EventWithReferences},
  reference::Reference,
};

pub fn stats(s: &EventStats) -> String {
  format!(
    "{} events, {} today, {} references",
    s.total_events, s.today_events, s.total_references
  )
}

fn year(e: &Event) -> String { e.year.map(|y| y.to_string()).unwrap_or_default() }

/// One row per event: id, date, year, type, title and reference count.
pub fn events_table<'a>(events: impl IntoIterator<Item = &'a Event>) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{:>5}  {:<5}  {:>4}  {:<16}  {}", "ID", "DATE", "YEAR", "TYPE", "TITLE");
  for e in events {
    let refs = match e.references_count {
      0 => String::new(),
      n => format!("  [{n} ref{}]", if n == 1 { "" } else { "s" }),
    };
    let _ = writeln!(
      out,
      "{:>5}  {:<5}  {:>4}  {:<16}  {}{}",
      e.id,
      e.date(),
      year(e),
      truncate(&e.event_type, 16),
      e.title,
      refs
    );
  }
  out
}

pub fn references_table(references: &[Reference]) -> String {
  if references.is_empty() {
    return "  (no references)\n".to_string();
  }
  let mut out = String::new();
  for r in references {
    let _ = write!(
      out,
      "{:>5}  {:<10}  {}",
      r.id,
      truncate(&r.reference_type, 10),
      r.reference_name
    );
    if let Some(uuid) = &r.reference_uuid {
      let _ = write!(out, "  <{uuid}>");
    }
    if r.priority != 0 {
      let _ = write!(out, "  p{}", r.priority);
    }
    out.push('\n');
  }
  out
}

/// Full view of one event with its references.
pub fn event_detail(e: &Event, references: &[Reference]) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "#{}  {}", e.id, e.title);
  let _ = writeln!(out, "  date:     {}", e.date());
  if let Some(y) = e.year {
    let _ = writeln!(out, "  year:     {y}");
  }
  let _ = writeln!(out, "  type:     {}", e.event_type);
  let _ = writeln!(out, "  created:  {}", e.created_at.format("%Y-%m-%d %H:%M UTC"));
  if let Some(d) = &e.description {
    let _ = writeln!(out, "\n  {}", d.replace('\n', "\n  "));
  }
  let _ = writeln!(out, "\nReferences:");
  out.push_str(&references_table(references));
  out
}

/// Everything on one calendar day, as the digest would see it.
pub fn date_listing(events: &[EventWithReferences]) -> String {
  if events.is_empty() {
    return "Nothing on this day.\n".to_string();
  }
  events
    .iter()
    .map(|e| event_detail(&e.event, &e.references))
    .collect::<Vec<_>>()
    .join("\n")
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    return s.to_string();
  }
  let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
  t.push('…');
  t
}
