//! Integration tests for `SqliteStore` against an in-memory database.

use litcal_core::{
  date::MonthDay,
  event::{EventPatch, NewEvent},
  reference::{AUTO_UUID, NewReference, ReferencePatch},
  store::CalendarStore,
  transfer::{ImportSummary, TransferRow},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_year() -> NewEvent {
  NewEvent::new(1, 1, "New Year", "holiday")
}

/// Assert that every event's `references_count` matches its live references.
async fn assert_counts_consistent(s: &SqliteStore) {
  for event in s.list_events(None).await.unwrap() {
    let refs = s.list_references(event.id).await.unwrap();
    assert_eq!(
      event.references_count,
      refs.len() as u64,
      "count mismatch for event {}",
      event.id
    );
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_event() {
  let s = store().await;

  let event = s.create_event(new_year()).await.unwrap();
  assert_eq!(event.references_count, 0);
  assert_eq!((event.month, event.day), (1, 1));

  let fetched = s.get_event(event.id).await.unwrap().unwrap();
  assert_eq!(fetched, event);
}

#[tokio::test]
async fn get_event_missing_returns_none() {
  let s = store().await;
  assert!(s.get_event(42).await.unwrap().is_none());
}

#[tokio::test]
async fn create_event_rejects_invalid_date() {
  let s = store().await;

  let err = s
    .create_event(NewEvent::new(31, 4, "April 31st", "holiday"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(litcal_core::Error::Validation(_))));

  let err = s
    .create_event(NewEvent::new(1, 13, "Smarch", "holiday"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(litcal_core::Error::Validation(_))));
}

#[tokio::test]
async fn create_event_rejects_empty_title() {
  let s = store().await;
  let err = s
    .create_event(NewEvent::new(1, 1, "", "holiday"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(litcal_core::Error::Validation(_))));
  assert!(s.list_events(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_events_ordered_by_date() {
  let s = store().await;
  s.create_event(NewEvent::new(6, 6, "Pushkin", "birthday")).await.unwrap();
  s.create_event(NewEvent::new(21, 3, "Poetry Day", "memorable_day")).await.unwrap();
  s.create_event(NewEvent::new(1, 3, "Spring", "holiday")).await.unwrap();

  let titles: Vec<_> = s
    .list_events(None)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.title)
    .collect();
  assert_eq!(titles, ["Spring", "Poetry Day", "Pushkin"]);
}

#[tokio::test]
async fn list_events_filtered_by_month() {
  let s = store().await;
  s.create_event(NewEvent::new(6, 6, "Pushkin", "birthday")).await.unwrap();
  s.create_event(NewEvent::new(21, 3, "Poetry Day", "memorable_day")).await.unwrap();

  let march = s.list_events(Some(3)).await.unwrap();
  assert_eq!(march.len(), 1);
  assert_eq!(march[0].title, "Poetry Day");

  assert!(s.list_events(Some(13)).await.is_err());
}

#[tokio::test]
async fn list_events_is_idempotent() {
  let s = store().await;
  let e = s.create_event(new_year()).await.unwrap();
  s.create_reference(NewReference::new(e.id, "article", "Wiki")).await.unwrap();
  s.create_event(NewEvent::new(2, 2, "Groundhog", "holiday")).await.unwrap();

  let today = MonthDay::new(1, 1).unwrap();
  let first = (s.list_events(None).await.unwrap(), s.stats(today).await.unwrap());
  let second = (s.list_events(None).await.unwrap(), s.stats(today).await.unwrap());
  assert_eq!(first, second);
}

#[tokio::test]
async fn update_event_changes_only_editable_fields() {
  let s = store().await;
  let event = s
    .create_event(new_year().with_description("Party").with_year(2000))
    .await
    .unwrap();

  let patch = EventPatch {
    title:       Some("New Year's Day".into()),
    description: Some(None),
    year:        Some(Some(1999)),
  };
  let updated = s.update_event(event.id, patch).await.unwrap();

  assert_eq!(updated.title, "New Year's Day");
  assert_eq!(updated.description, None);
  assert_eq!(updated.year, Some(1999));
  assert_eq!(updated.day, event.day);
  assert_eq!(updated.month, event.month);
  assert_eq!(updated.event_type, event.event_type);
  assert_eq!(updated.created_at, event.created_at);
}

#[tokio::test]
async fn update_event_with_empty_patch_is_a_no_op() {
  let s = store().await;
  let event = s.create_event(new_year().with_year(1900)).await.unwrap();
  let updated = s.update_event(event.id, EventPatch::default()).await.unwrap();
  assert_eq!(updated, event);
}

#[tokio::test]
async fn update_missing_event_is_not_found() {
  let s = store().await;
  let err = s.update_event(7, EventPatch::default()).await.unwrap_err();
  assert!(matches!(err, Error::EventNotFound(7)));
}

#[tokio::test]
async fn update_event_rejects_year_that_breaks_leap_day() {
  let s = store().await;
  let event = s
    .create_event(NewEvent::new(29, 2, "Leap", "holiday"))
    .await
    .unwrap();
  let patch = EventPatch { year: Some(Some(2001)), ..Default::default() };
  assert!(s.update_event(event.id, patch).await.is_err());
}

#[tokio::test]
async fn delete_missing_event_is_not_found() {
  let s = store().await;
  assert!(matches!(s.delete_event(1).await, Err(Error::EventNotFound(1))));
}

// ─── References ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_year_scenario() {
  let s = store().await;

  let event = s.create_event(new_year()).await.unwrap();
  assert_eq!(event.references_count, 0);

  let reference = s
    .create_reference(NewReference::new(event.id, "article", "Wiki").with_uuid(AUTO_UUID))
    .await
    .unwrap();
  let uuid = reference.reference_uuid.clone().unwrap();
  assert!(uuid::Uuid::parse_str(&uuid).is_ok());
  assert_eq!(reference.reference_slug.as_deref(), Some(uuid.as_str()));

  s.delete_event(event.id).await.unwrap();

  let err = s.list_references(event.id).await.unwrap_err();
  assert!(matches!(err, Error::EventNotFound(id) if id == event.id));
  assert!(s.get_reference(reference.id).await.unwrap().is_none());
  assert!(matches!(
    s.delete_reference(reference.id).await,
    Err(Error::ReferenceNotFound(_))
  ));
}

#[tokio::test]
async fn generated_uuids_are_distinct() {
  let s = store().await;
  let event = s.create_event(new_year()).await.unwrap();

  let a = s
    .create_reference(NewReference::new(event.id, "tag", "Poetry"))
    .await
    .unwrap();
  let b = s
    .create_reference(NewReference::new(event.id, "tag", "Poetry").with_uuid(AUTO_UUID))
    .await
    .unwrap();
  assert_ne!(a.reference_uuid, b.reference_uuid);
}

#[tokio::test]
async fn create_reference_for_unknown_event_is_validation_error() {
  let s = store().await;
  let err = s
    .create_reference(NewReference::new(99, "book", "Onegin"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownEvent(99)));
  assert!(matches!(
    litcal_core::Error::from(err),
    litcal_core::Error::Validation(_)
  ));
}

#[tokio::test]
async fn create_reference_rejects_empty_name() {
  let s = store().await;
  let event = s.create_event(new_year()).await.unwrap();
  let err = s
    .create_reference(NewReference::new(event.id, "book", ""))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(litcal_core::Error::Validation(_))));
}

#[tokio::test]
async fn references_count_tracks_mutations() {
  let s = store().await;
  let a = s.create_event(new_year()).await.unwrap();
  let b = s.create_event(NewEvent::new(6, 6, "Pushkin", "birthday")).await.unwrap();

  let r1 = s.create_reference(NewReference::new(a.id, "book", "One")).await.unwrap();
  s.create_reference(NewReference::new(a.id, "book", "Two")).await.unwrap();
  s.create_reference(NewReference::new(b.id, "author", "Pushkin")).await.unwrap();
  assert_counts_consistent(&s).await;
  assert_eq!(s.get_event(a.id).await.unwrap().unwrap().references_count, 2);

  s.update_reference(r1.id, ReferencePatch {
    reference_name: Some("Uno".into()),
    ..Default::default()
  })
  .await
  .unwrap();
  assert_counts_consistent(&s).await;

  s.delete_reference(r1.id).await.unwrap();
  assert_counts_consistent(&s).await;
  assert_eq!(s.get_event(a.id).await.unwrap().unwrap().references_count, 1);

  s.delete_event(b.id).await.unwrap();
  assert_counts_consistent(&s).await;

  let stats = s.stats(MonthDay::new(1, 1).unwrap()).await.unwrap();
  assert_eq!(stats.total_events, 1);
  assert_eq!(stats.today_events, 1);
  assert_eq!(stats.total_references, 1);
}

#[tokio::test]
async fn references_ordered_by_priority() {
  let s = store().await;
  let event = s.create_event(new_year()).await.unwrap();

  let mut low = NewReference::new(event.id, "book", "Later");
  low.priority = 5;
  s.create_reference(low).await.unwrap();
  s.create_reference(NewReference::new(event.id, "author", "First")).await.unwrap();

  let names: Vec<_> = s
    .list_references(event.id)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.reference_name)
    .collect();
  assert_eq!(names, ["First", "Later"]);
}

#[tokio::test]
async fn update_reference_applies_fields_and_metadata() {
  let s = store().await;
  let event = s.create_event(new_year()).await.unwrap();
  let r = s
    .create_reference(NewReference::new(event.id, "book", "Onegin").with_uuid("U-1"))
    .await
    .unwrap();

  let updated = s
    .update_reference(r.id, ReferencePatch {
      reference_type: Some("film".into()),
      reference_slug: Some("onegin-1999".into()),
      metadata:       Some(serde_json::json!({ "cover_url": "https://example.com/c.jpg" })),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.reference_type, "film");
  assert_eq!(updated.reference_name, "Onegin");
  assert_eq!(updated.reference_uuid.as_deref(), Some("U-1"));
  assert_eq!(updated.reference_slug.as_deref(), Some("onegin-1999"));
  assert_eq!(
    updated.metadata.as_ref().and_then(|m| m.get("cover_url")).and_then(|v| v.as_str()),
    Some("https://example.com/c.jpg")
  );
  assert_eq!(updated.event_id, event.id);
}

#[tokio::test]
async fn update_missing_reference_is_not_found() {
  let s = store().await;
  let err = s
    .update_reference(3, ReferencePatch::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ReferenceNotFound(3)));
}

// ─── Per-date listing ────────────────────────────────────────────────────────

#[tokio::test]
async fn events_on_date_include_references() {
  let s = store().await;
  let pushkin = s
    .create_event(NewEvent::new(6, 6, "Pushkin born", "birthday").with_year(1799))
    .await
    .unwrap();
  s.create_event(NewEvent::new(6, 6, "Russian Language Day", "memorable_day"))
    .await
    .unwrap();
  s.create_event(new_year()).await.unwrap();
  s.create_reference(NewReference::new(pushkin.id, "author", "Pushkin"))
    .await
    .unwrap();

  let day = s.events_on(MonthDay::new(6, 6).unwrap()).await.unwrap();
  assert_eq!(day.len(), 2);
  assert_eq!(day[0].event.title, "Pushkin born");
  assert_eq!(day[0].references.len(), 1);
  assert_eq!(day[0].event.references_count, 1);
  assert!(day[1].references.is_empty());
}

// ─── Bulk transfer ───────────────────────────────────────────────────────────

#[tokio::test]
async fn export_then_import_reproduces_the_calendar() {
  let source = store().await;
  let pushkin = source
    .create_event(NewEvent::new(6, 6, "Pushkin born", "birthday").with_year(1799))
    .await
    .unwrap();
  let mut book = NewReference::new(pushkin.id, "book", "Eugene Onegin").with_uuid("onegin-1");
  book.priority = 1;
  book.metadata = Some(serde_json::json!({ "cover": "onegin.jpg" }));
  source.create_reference(book).await.unwrap();
  source
    .create_reference(NewReference::new(pushkin.id, "author", "A. S. Pushkin").with_uuid("pushkin"))
    .await
    .unwrap();
  source
    .create_event(new_year().with_description("Fireworks, \"quoted\", and commas"))
    .await
    .unwrap();

  let rows = source.export_rows().await.unwrap();
  assert_eq!(rows.len(), 3);
  assert_eq!(rows[0].title, "New Year");
  assert_eq!(rows[0].reference_type, None);
  assert_eq!(rows[1].reference_name.as_deref(), Some("A. S. Pushkin"));
  assert_eq!(rows[2].metadata_json.as_deref(), Some(r#"{"cover":"onegin.jpg"}"#));

  let target = store().await;
  let summary = target.import_rows(rows.clone()).await.unwrap();
  assert_eq!(summary, ImportSummary { events: 2, references: 2 });
  assert_eq!(target.export_rows().await.unwrap(), rows);
  assert_counts_consistent(&target).await;
}

#[tokio::test]
async fn import_is_all_or_nothing() {
  let s = store().await;
  let good = TransferRow {
    month: 1,
    day: 1,
    title: "New Year".into(),
    reference_type: Some("tag".into()),
    reference_name: Some("holidays".into()),
    ..Default::default()
  };
  let bad = TransferRow { month: 2, day: 30, title: "Nope".into(), ..Default::default() };

  let err = s.import_rows(vec![good.clone(), bad]).await.unwrap_err();
  assert!(matches!(err, Error::Core(litcal_core::Error::Validation(_))));
  assert!(s.list_events(None).await.unwrap().is_empty());

  let summary = s.import_rows(vec![good]).await.unwrap();
  assert_eq!(summary, ImportSummary { events: 1, references: 1 });
  let event = &s.list_events(None).await.unwrap()[0];
  assert_eq!(event.event_type, "literary_event");
  assert_eq!(event.references_count, 1);
}

// ─── Id assignment ───────────────────────────────────────────────────────────

#[tokio::test]
async fn ids_are_never_reused() {
  let s = store().await;
  let first = s.create_event(new_year()).await.unwrap();
  let r1 = s
    .create_reference(NewReference::new(first.id, "book", "One"))
    .await
    .unwrap();
  s.delete_event(first.id).await.unwrap();

  let second = s.create_event(new_year()).await.unwrap();
  let r2 = s
    .create_reference(NewReference::new(second.id, "book", "One"))
    .await
    .unwrap();
  assert!(second.id > first.id);
  assert!(r2.id > r1.id);
}

#[tokio::test]
async fn ids_survive_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("calendar.db");

  let first_id = {
    let s = SqliteStore::open(&path).await.unwrap();
    let e = s.create_event(new_year()).await.unwrap();
    s.delete_event(e.id).await.unwrap();
    e.id
  };

  let s = SqliteStore::open(&path).await.unwrap();
  let e = s.create_event(new_year()).await.unwrap();
  assert!(e.id > first_id);
}

// ─── Concurrent mutations ────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_reference_patches_keep_both_fields() {
  let s = store().await;
  let event = s.create_event(new_year()).await.unwrap();
  let r = s
    .create_reference(NewReference::new(event.id, "book", "Onegin"))
    .await
    .unwrap();

  let rename = ReferencePatch {
    reference_name: Some("Eugene Onegin".into()),
    ..Default::default()
  };
  let reprioritise = ReferencePatch { priority: Some(7), ..Default::default() };
  let (a, b) = tokio::join!(
    s.update_reference(r.id, rename),
    s.update_reference(r.id, reprioritise)
  );
  a.unwrap();
  b.unwrap();

  let stored = s.get_reference(r.id).await.unwrap().unwrap();
  assert_eq!(stored.reference_name, "Eugene Onegin");
  assert_eq!(stored.priority, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_mutations_keep_counts_consistent() {
  let s = store().await;

  let mut events = Vec::new();
  for day in 1..=3 {
    let e = s
      .create_event(NewEvent::new(day, 6, format!("June {day}"), "holiday"))
      .await
      .unwrap();
    events.push(e);
  }
  let mut seeded = Vec::new();
  for e in &events {
    for n in 0..4 {
      let r = s
        .create_reference(NewReference::new(e.id, "tag", format!("seed {n}")))
        .await
        .unwrap();
      seeded.push(r);
    }
  }

  let mut tasks = tokio::task::JoinSet::new();

  // Every seeded reference is either deleted or patched, and each task also
  // attaches a fresh reference to the same event.
  for (n, r) in seeded.iter().enumerate() {
    let s = s.clone();
    let (id, event_id) = (r.id, r.event_id);
    tasks.spawn(async move {
      if n % 2 == 0 {
        s.delete_reference(id).await.unwrap();
      } else {
        let patch = ReferencePatch {
          reference_name: Some(format!("renamed {id}")),
          priority: Some(n as i64),
          ..Default::default()
        };
        s.update_reference(id, patch).await.unwrap();
      }
      s.create_reference(NewReference::new(event_id, "author", format!("added {id}")))
        .await
        .unwrap();
    });
  }

  // Readers running alongside must never see a stale count.
  for day in 1..=3 {
    let s = s.clone();
    tasks.spawn(async move {
      for _ in 0..10 {
        let date = MonthDay::new(6, day).unwrap();
        for listed in s.events_on(date).await.unwrap() {
          assert_eq!(listed.event.references_count, listed.references.len() as u64);
        }
        let listed = s.list_events(Some(6)).await.unwrap();
        assert_eq!(listed.len(), 3);
      }
    });
  }

  while let Some(joined) = tasks.join_next().await {
    joined.unwrap();
  }

  assert_counts_consistent(&s).await;
  for e in &events {
    // 4 seeded, 2 deleted, 4 added.
    assert_eq!(s.list_references(e.id).await.unwrap().len(), 6);
  }
  for (n, r) in seeded.iter().enumerate() {
    let stored = s.get_reference(r.id).await.unwrap();
    if n % 2 == 0 {
      assert!(stored.is_none(), "reference {} should be deleted", r.id);
    } else {
      let stored = stored.unwrap();
      assert_eq!(stored.reference_name, format!("renamed {}", r.id));
      assert_eq!(stored.priority, n as i64);
      assert_eq!(stored.reference_type, "tag");
      assert_eq!(stored.reference_uuid, r.reference_uuid);
    }
  }
}
