//! [`SqliteStore`] — the SQLite implementation of [`CalendarStore`].

use std::path::Path;

use chrono::Utc;
use litcal_core::{
  date::{MonthDay, validate_month},
  event::{Event, EventPatch, EventStats, EventWithReferences, NewEvent},
  reference::{NewReference, Reference, ReferencePatch},
  store::CalendarStore,
  transfer::{ImportSummary, TransferRow, plan_import},
};
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::{
    EVENT_COLUMNS, RawEvent, RawReference, encode_dt, encode_metadata,
    event_exists, select_event, select_reference, select_references_for,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A calendar store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CalendarStore impl ──────────────────────────────────────────────────────

impl CalendarStore for SqliteStore {
  type Error = Error;

  // ── Events ────────────────────────────────────────────────────────────────

  async fn list_events(&self, month: Option<u32>) -> Result<Vec<Event>> {
    if let Some(m) = month {
      validate_month(m)?;
    }

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM events e
           WHERE ?1 IS NULL OR e.month = ?1
           ORDER BY e.month, e.day, e.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![month], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn stats(&self, today: MonthDay) -> Result<EventStats> {
    let (total_events, today_events, total_references): (i64, i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM events),
             (SELECT COUNT(*) FROM events WHERE month = ?1 AND day = ?2),
             (SELECT COUNT(*) FROM event_references)",
          rusqlite::params![today.month, today.day],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?)
      })
      .await?;

    Ok(EventStats {
      total_events:     total_events.max(0) as u64,
      today_events:     today_events.max(0) as u64,
      total_references: total_references.max(0) as u64,
    })
  }

  async fn get_event(&self, id: i64) -> Result<Option<Event>> {
    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| Ok(select_event(conn, id)?))
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn create_event(&self, input: NewEvent) -> Result<Event> {
    let input  = input.validate()?;
    let at_str = encode_dt(Utc::now());

    let raw: RawEvent = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO events (month, day, year, event_type, title, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            input.month,
            input.day,
            input.year,
            input.event_type,
            input.title,
            input.description,
            at_str,
          ],
        )?;
        let id  = tx.last_insert_rowid();
        let raw = select_event(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let event = raw.into_event()?;
    debug!(id = event.id, date = %event.date(), "event created");
    Ok(event)
  }

  async fn update_event(&self, id: i64, patch: EventPatch) -> Result<Event> {
    // Day and month never change, so the patch can be validated against a
    // snapshot read outside the write transaction.
    let current = self.get_event(id).await?.ok_or(Error::EventNotFound(id))?;
    let patch   = patch.validate_for(&current)?;

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(existing) = select_event(&tx, id)? else {
          return Ok(None);
        };
        let title       = patch.title.unwrap_or(existing.title);
        let description = patch.description.unwrap_or(existing.description);
        let year        = patch.year.unwrap_or(existing.year);
        tx.execute(
          "UPDATE events SET title = ?1, description = ?2, year = ?3 WHERE id = ?4",
          rusqlite::params![title, description, year, id],
        )?;
        let raw = select_event(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let event = raw.ok_or(Error::EventNotFound(id))?.into_event()?;
    debug!(id, "event updated");
    Ok(event)
  }

  async fn delete_event(&self, id: i64) -> Result<()> {
    let removed: Option<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !event_exists(&tx, id)? {
          return Ok(None);
        }
        let refs = tx.execute(
          "DELETE FROM event_references WHERE event_id = ?1",
          rusqlite::params![id],
        )?;
        tx.execute("DELETE FROM events WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(Some(refs))
      })
      .await?;

    let refs = removed.ok_or(Error::EventNotFound(id))?;
    debug!(id, references = refs, "event deleted");
    Ok(())
  }

  async fn events_on(&self, date: MonthDay) -> Result<Vec<EventWithReferences>> {
    let rows: Vec<(RawEvent, Vec<RawReference>)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let events = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e
             WHERE e.month = ?1 AND e.day = ?2
             ORDER BY e.event_type, e.year DESC, e.id"
          ))?;
          let events = stmt
            .query_map(rusqlite::params![date.month, date.day], RawEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          events
        };
        let mut rows = Vec::with_capacity(events.len());
        for event in events {
          let refs = select_references_for(&tx, event.id)?;
          rows.push((event, refs));
        }
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(event, refs)| -> Result<EventWithReferences> {
        Ok(EventWithReferences {
          event:      event.into_event()?,
          references: refs
            .into_iter()
            .map(RawReference::into_reference)
            .collect::<Result<_>>()?,
        })
      })
      .collect()
  }

  // ── References ────────────────────────────────────────────────────────────

  async fn list_references(&self, event_id: i64) -> Result<Vec<Reference>> {
    let raws: Option<Vec<RawReference>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !event_exists(&tx, event_id)? {
          return Ok(None);
        }
        let refs = select_references_for(&tx, event_id)?;
        tx.commit()?;
        Ok(Some(refs))
      })
      .await?;

    raws
      .ok_or(Error::EventNotFound(event_id))?
      .into_iter()
      .map(RawReference::into_reference)
      .collect()
  }

  async fn get_reference(&self, id: i64) -> Result<Option<Reference>> {
    let raw: Option<RawReference> = self
      .conn
      .call(move |conn| Ok(select_reference(conn, id)?))
      .await?;

    raw.map(RawReference::into_reference).transpose()
  }

  async fn create_reference(&self, input: NewReference) -> Result<Reference> {
    let input        = input.validate()?;
    let event_id     = input.event_id;
    let metadata_str = encode_metadata(input.metadata.as_ref())?;

    let raw: Option<RawReference> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !event_exists(&tx, input.event_id)? {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO event_references (
             event_id, reference_type, reference_name, reference_uuid,
             reference_slug, priority, metadata
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            input.event_id,
            input.reference_type,
            input.reference_name,
            input.reference_uuid,
            input.reference_slug,
            input.priority,
            metadata_str,
          ],
        )?;
        let raw = select_reference(&tx, tx.last_insert_rowid())?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    let reference = raw.ok_or(Error::UnknownEvent(event_id))?.into_reference()?;
    debug!(id = reference.id, event_id, "reference created");
    Ok(reference)
  }

  async fn update_reference(&self, id: i64, patch: ReferencePatch) -> Result<Reference> {
    let patch = patch.validate()?;

    // Read, patch and write back in one transaction so concurrent patches
    // to the same reference each see the other's committed fields.
    let raw: Option<RawReference> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(existing) = select_reference(&tx, id)? else {
          return Ok(None);
        };
        let next = patch.apply(&existing.into_reference().map_err(abort)?);
        let metadata_str = encode_metadata(next.metadata.as_ref()).map_err(abort)?;
        tx.execute(
          "UPDATE event_references
           SET reference_type = ?1, reference_name = ?2, reference_uuid = ?3,
               reference_slug = ?4, priority = ?5, metadata = ?6
           WHERE id = ?7",
          rusqlite::params![
            next.reference_type,
            next.reference_name,
            next.reference_uuid,
            next.reference_slug,
            next.priority,
            metadata_str,
            id,
          ],
        )?;
        let raw = select_reference(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let reference = raw.ok_or(Error::ReferenceNotFound(id))?.into_reference()?;
    debug!(id, "reference updated");
    Ok(reference)
  }

  async fn delete_reference(&self, id: i64) -> Result<()> {
    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM event_references WHERE id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ReferenceNotFound(id));
    }
    debug!(id, "reference deleted");
    Ok(())
  }

  // ── Bulk transfer ─────────────────────────────────────────────────────────

  async fn import_rows(&self, rows: Vec<TransferRow>) -> Result<ImportSummary> {
    let groups = plan_import(rows)?;
    let at_str = encode_dt(Utc::now());
    let groups = groups
      .into_iter()
      .map(|group| {
        let references = group
          .references
          .into_iter()
          .map(|r| Ok((encode_metadata(r.metadata.as_ref())?, r)))
          .collect::<Result<Vec<_>>>()?;
        Ok((group.event, references))
      })
      .collect::<Result<Vec<_>>>()?;

    let summary: ImportSummary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut summary = ImportSummary::default();
        {
          let mut insert_event = tx.prepare(
            "INSERT INTO events (month, day, year, event_type, title, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          let mut insert_reference = tx.prepare(
            "INSERT INTO event_references (
               event_id, reference_type, reference_name, reference_uuid,
               reference_slug, priority, metadata
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for (event, references) in groups {
            let event_id = insert_event.insert(rusqlite::params![
              event.month,
              event.day,
              event.year,
              event.event_type,
              event.title,
              event.description,
              at_str,
            ])?;
            summary.events += 1;
            for (metadata_str, r) in references {
              insert_reference.execute(rusqlite::params![
                event_id,
                r.reference_type,
                r.reference_name,
                r.reference_uuid,
                r.reference_slug,
                r.priority,
                metadata_str,
              ])?;
              summary.references += 1;
            }
          }
        }
        tx.commit()?;
        Ok(summary)
      })
      .await?;

    info!(events = summary.events, references = summary.references, "calendar imported");
    Ok(summary)
  }

  async fn export_rows(&self) -> Result<Vec<TransferRow>> {
    let rows: Vec<(RawEvent, Vec<RawReference>)> = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let events = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e ORDER BY e.month, e.day, e.id"
          ))?;
          let events = stmt
            .query_map([], RawEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          events
        };
        let mut rows = Vec::with_capacity(events.len());
        for event in events {
          let refs = select_references_for(&tx, event.id)?;
          rows.push((event, refs));
        }
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    let mut out = Vec::new();
    for (raw_event, raw_refs) in rows {
      let event = raw_event.into_event()?;
      if raw_refs.is_empty() {
        out.push(TransferRow::from_event(&event, None));
      }
      for raw in raw_refs {
        out.push(TransferRow::from_event(&event, Some(&raw.into_reference()?)));
      }
    }
    debug!(rows = out.len(), "calendar exported");
    Ok(out)
  }
}

/// Carry a decoding failure out of a connection-thread closure.
fn abort(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }
