//! SQL schema for the calendar SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- AUTOINCREMENT guarantees ids are never reused, even after the row with
-- the highest id has been deleted.
CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    month       INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    day         INTEGER NOT NULL CHECK (day BETWEEN 1 AND 31),
    year        INTEGER,          -- NULL for a recurring date with no year
    event_type  TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL     -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS event_references (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id       INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
    reference_type TEXT NOT NULL,   -- 'author' | 'book' | 'tag' | 'article' ...
    reference_name TEXT NOT NULL,
    reference_uuid TEXT,
    reference_slug TEXT,
    priority       INTEGER NOT NULL DEFAULT 0,
    metadata       TEXT            -- JSON object or NULL
);

CREATE INDEX IF NOT EXISTS events_date_idx      ON events(month, day);
CREATE INDEX IF NOT EXISTS references_event_idx ON event_references(event_id);
CREATE INDEX IF NOT EXISTS references_type_idx  ON event_references(reference_type);

PRAGMA user_version = 1;
";
