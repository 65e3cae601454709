//! Event detail pane — right panel.

use litcal_core::{event::Event, reference::Reference};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;

/// Render the detail pane into `area`. Assumes an event is selected.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let Some(event) = &app.selected else {
    return;
  };

  let block = Block::default()
    .title(format!(" #{} ", event.id))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let inner = block.inner(area);
  f.render_widget(block, area);

  let para = Paragraph::new(lines(event, &app.references))
    .wrap(Wrap { trim: false })
    .scroll((app.detail_scroll as u16, 0));
  f.render_widget(para, inner);
}

fn field<'a>(label: &'a str, value: String) -> Line<'a> {
  Line::from(vec![
    Span::styled(
      format!("{label:<10}"),
      Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD),
    ),
    Span::raw(value),
  ])
}

fn lines<'a>(event: &'a Event, references: &'a [Reference]) -> Vec<Line<'a>> {
  let mut lines = vec![
    Line::from(Span::styled(
      event.title.as_str(),
      Style::default().add_modifier(Modifier::BOLD),
    )),
    Line::from(""),
    field("date", event.date().to_string()),
  ];
  if let Some(year) = event.year {
    lines.push(field("year", year.to_string()));
  }
  lines.push(field("type", event.event_type.clone()));
  lines.push(field(
    "created",
    event.created_at.format("%Y-%m-%d %H:%M").to_string(),
  ));

  if let Some(description) = &event.description {
    lines.push(Line::from(""));
    lines.extend(description.lines().map(Line::from));
  }

  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(
    format!("References ({})", references.len()),
    Style::default()
      .fg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  )));

  if references.is_empty() {
    lines.push(Line::from(Span::styled(
      "  none",
      Style::default().fg(Color::DarkGray),
    )));
  }

  for r in references {
    let mut spans = vec![
      Span::styled(
        format!("  {:<10}", r.reference_type),
        Style::default().fg(Color::Yellow),
      ),
      Span::raw(r.reference_name.as_str()),
    ];
    if let Some(slug) = &r.reference_slug {
      spans.push(Span::styled(
        format!("  /{slug}"),
        Style::default().fg(Color::DarkGray),
      ));
    }
    if r.priority != 0 {
      spans.push(Span::styled(
        format!("  p{}", r.priority),
        Style::default().fg(Color::DarkGray),
      ));
    }
    lines.push(Line::from(spans));
  }

  lines
}
