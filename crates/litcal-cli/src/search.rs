//! Fuzzy event search, shared by `events search` and the browser's filter.

use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use litcal_core::event::Event;

/// Events whose title or description fuzzily match `query`, best match
/// first. Ties keep calendar order. An empty query matches everything.
pub fn fuzzy_filter<'a>(events: &'a [Event], query: &str) -> Vec<&'a Event> {
  let query = query.trim();
  if query.is_empty() {
    return events.iter().collect();
  }

  let matcher = SkimMatcherV2::default().ignore_case();
  let mut scored: Vec<(i64, &Event)> = events
    .iter()
    .filter_map(|e| {
      let title = matcher.fuzzy_match(&e.title, query);
      let description = e
        .description
        .as_deref()
        .and_then(|d| matcher.fuzzy_match(d, query));
      title.max(description).map(|score| (score, e))
    })
    .collect();

  scored.sort_by(|a, b| b.0.cmp(&a.0));
  scored.into_iter().map(|(_, e)| e).collect()
}
