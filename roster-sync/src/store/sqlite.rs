//! Local SQLite shift store.
//!
//! The scrape upsert is one `INSERT .. ON CONFLICT .. DO UPDATE` statement.
//! Its time, status and official-flag assignments are guarded by the row's
//! status at the moment of writing, so a request committed after the engine's
//! read still keeps its times.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use roster_core::{ShiftKey, ShiftRecord};

use super::{date_key, ShiftRequest, ShiftStore, ShiftWrite, StoredRow};
use crate::error::{io_err, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS shifts (
    member_id           TEXT    NOT NULL,
    shift_date          TEXT    NOT NULL,
    display_name        TEXT    NOT NULL DEFAULT '',
    start_time          TEXT,
    end_time            TEXT,
    status              TEXT    NOT NULL DEFAULT 'none',
    is_official_present INTEGER NOT NULL DEFAULT 0,
    is_official         INTEGER NOT NULL DEFAULT 0,
    published_start     TEXT,
    published_end       TEXT,
    updated_at          TEXT,
    UNIQUE (member_id, shift_date)
);
CREATE TABLE IF NOT EXISTS sync_log (
    id           INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync_at TEXT    NOT NULL
);
";

const SELECT_COLUMNS: &str = "
SELECT member_id, shift_date, display_name, start_time, end_time, status,
       is_official_present, is_official, published_start, published_end, updated_at
FROM shifts";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        tracing::debug!(path = %path.display(), "opening sqlite store");
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Direct access for tooling and tests that need raw SQL.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn stored_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        member_id: row.get(0)?,
        shift_date: row.get(1)?,
        display_name: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        status: row.get(5)?,
        is_official_present: Some(row.get(6)?),
        is_official: Some(row.get(7)?),
        published_start: row.get(8)?,
        published_end: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl ShiftStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM shifts", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn fetch(&mut self, key: &ShiftKey) -> Result<Option<ShiftRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE member_id = ?1 AND shift_date = ?2"),
                params![key.member_id.as_str(), date_key(key.shift_date)],
                stored_row,
            )
            .optional()?;
        row.map(StoredRow::into_record).transpose()
    }

    fn upsert(&mut self, write: &ShiftWrite) -> Result<(), StoreError> {
        let status = if write.includes_times() { "official" } else { "none" };
        self.conn.execute(
            "
            INSERT INTO shifts (
                member_id, shift_date, display_name, start_time, end_time, status,
                is_official_present, is_official, published_start, published_end, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9, ?10)
            ON CONFLICT(member_id, shift_date) DO UPDATE SET
                display_name        = excluded.display_name,
                is_official_present = 1,
                published_start     = excluded.published_start,
                published_end       = excluded.published_end,
                updated_at          = excluded.updated_at,
                start_time  = CASE WHEN ?7 AND shifts.status <> 'requested'
                                   THEN excluded.start_time ELSE shifts.start_time END,
                end_time    = CASE WHEN ?7 AND shifts.status <> 'requested'
                                   THEN excluded.end_time ELSE shifts.end_time END,
                is_official = CASE WHEN ?7 AND shifts.status <> 'requested'
                                   THEN 1 ELSE shifts.is_official END,
                status      = CASE WHEN ?7 AND shifts.status <> 'requested'
                                   THEN 'official' ELSE shifts.status END
            ",
            params![
                write.key.member_id.as_str(),
                date_key(write.key.shift_date),
                write.display_name,
                write.official.map(|t| t.start.to_string()),
                write.official.map(|t| t.end.to_string()),
                status,
                write.includes_times(),
                write.published.start.to_string(),
                write.published.end.to_string(),
                write.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn submit_request(&mut self, request: &ShiftRequest) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO shifts (
                member_id, shift_date, display_name, start_time, end_time, status,
                is_official_present, is_official, updated_at
            ) VALUES (?1, ?2, COALESCE(?3, ''), ?4, ?5, 'requested', 0, 0, ?6)
            ON CONFLICT(member_id, shift_date) DO UPDATE SET
                display_name = CASE WHEN shifts.display_name = ''
                                    THEN COALESCE(?3, '') ELSE shifts.display_name END,
                start_time   = excluded.start_time,
                end_time     = excluded.end_time,
                status       = 'requested',
                is_official  = 0,
                updated_at   = excluded.updated_at
            ",
            params![
                request.key.member_id.as_str(),
                date_key(request.key.shift_date),
                request.display_name,
                request.times.start.to_string(),
                request.times.end.to_string(),
                request.requested_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_date(&mut self, date: NaiveDate) -> Result<Vec<ShiftRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} WHERE shift_date = ?1 ORDER BY member_id"))?;
        let rows = stmt
            .query_map(params![date_key(date)], stored_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(StoredRow::into_record).collect()
    }

    fn last_sync_at(&mut self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT last_sync_at FROM sync_log WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StoreError::Corrupt {
                    key: "sync_log".to_string(),
                    detail: format!("last_sync_at '{s}': {e}"),
                })
        })
        .transpose()
    }

    fn mark_synced(&mut self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO sync_log (id, last_sync_at) VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET last_sync_at = excluded.last_sync_at
            ",
            params![at.to_rfc3339()],
        )?;
        Ok(())
    }
}
