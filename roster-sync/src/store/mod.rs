//! Shift stores.
//!
//! A store is a keyed table of [`ShiftRecord`]s with a point read and a
//! partial-field upsert on `(member_id, shift_date)`. Three backends:
//!
//! - [`memory::MemoryStore`] — in-process map
//! - [`sqlite::SqliteStore`] — local database, conditional upsert in one statement
//! - [`rest::RestStore`] — PostgREST-style HTTP table
//!
//! Every backend applies the same guard as [`ShiftWrite::apply_to`]: time and
//! status fields are never written over a row whose current status is
//! `requested`. The REST backend can only enforce this through the read that
//! precedes the write.

pub mod memory;
pub mod rest;
pub mod sqlite;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use roster_core::{
    CoreError, MemberId, ShiftKey, ShiftRecord, ShiftStatus, ShiftTime, ShiftTimes, StoreConfig,
};

use crate::error::{StoreError, SyncError};

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Keyed shift table.
pub trait ShiftStore {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Cheap round trip proving the store is reachable and the table exists.
    fn ping(&mut self) -> Result<(), StoreError>;

    /// Point read by key.
    fn fetch(&mut self, key: &ShiftKey) -> Result<Option<ShiftRecord>, StoreError>;

    /// Partial-field upsert of a scrape write.
    fn upsert(&mut self, write: &ShiftWrite) -> Result<(), StoreError>;

    /// Record a human request: times set, status `requested`, official flag
    /// cleared. Presence is left as it is.
    fn submit_request(&mut self, request: &ShiftRequest) -> Result<(), StoreError>;

    /// Every record for `date`, ordered by member id.
    fn list_date(&mut self, date: NaiveDate) -> Result<Vec<ShiftRecord>, StoreError>;

    fn last_sync_at(&mut self) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn mark_synced(&mut self, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Open the configured store and ping it. Any failure here is fatal.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn ShiftStore>, SyncError> {
    let mut store: Box<dyn ShiftStore> = match config {
        StoreConfig::Sqlite { path } => {
            let path = path.as_deref().ok_or_else(|| {
                CoreError::InvalidConfig("sqlite store has no path".to_string())
            })?;
            Box::new(
                SqliteStore::open(path).map_err(|source| SyncError::StoreUnavailable {
                    backend: "sqlite",
                    source,
                })?,
            )
        }
        StoreConfig::Rest {
            url,
            api_key,
            table,
        } => {
            let url = url
                .as_deref()
                .ok_or(CoreError::MissingCredentials("store url"))?;
            let api_key = api_key
                .as_deref()
                .ok_or(CoreError::MissingCredentials("store api_key"))?;
            Box::new(RestStore::new(url, api_key, table))
        }
    };
    let backend = store.backend();
    store
        .ping()
        .map_err(|source| SyncError::StoreUnavailable { backend, source })?;
    tracing::debug!(backend, "store ready");
    Ok(store)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// The partial-field payload of one scrape upsert.
///
/// Base fields (`display_name`, presence, published times, `updated_at`) are
/// always written. `official` carries the time fields; when it is `None` the
/// row's times, status and official flag are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftWrite {
    pub key: ShiftKey,
    pub display_name: String,
    pub published: ShiftTimes,
    pub official: Option<ShiftTimes>,
    pub updated_at: DateTime<Utc>,
}

impl ShiftWrite {
    pub fn includes_times(&self) -> bool {
        self.official.is_some()
    }

    /// The row that results from applying this write to `existing`.
    ///
    /// Time fields are only taken when the row is not `requested` at the
    /// moment of writing, even if the write carries them.
    pub fn apply_to(&self, existing: Option<ShiftRecord>) -> ShiftRecord {
        let mut record = existing.unwrap_or_else(|| empty_record(&self.key));
        record.display_name = self.display_name.clone();
        record.is_official_present = true;
        record.published_start = Some(self.published.start);
        record.published_end = Some(self.published.end);
        record.updated_at = Some(self.updated_at);

        if let Some(times) = self.official {
            if !record.status.protects_times() {
                record.start_time = Some(times.start);
                record.end_time = Some(times.end);
                record.status = ShiftStatus::Official;
                record.is_official = true;
            }
        }
        record
    }
}

/// A human-originated shift request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftRequest {
    pub key: ShiftKey,
    /// Label for a row that has none yet; a named row always keeps its name.
    pub display_name: Option<String>,
    pub times: ShiftTimes,
    pub requested_at: DateTime<Utc>,
}

impl ShiftRequest {
    pub fn apply_to(&self, existing: Option<ShiftRecord>) -> ShiftRecord {
        let mut record = existing.unwrap_or_else(|| empty_record(&self.key));
        if let Some(name) = self.display_name.as_ref().filter(|_| record.display_name.is_empty()) {
            record.display_name = name.clone();
        }
        record.start_time = Some(self.times.start);
        record.end_time = Some(self.times.end);
        record.status = ShiftStatus::Requested;
        record.is_official = false;
        record.updated_at = Some(self.requested_at);
        record
    }
}

fn empty_record(key: &ShiftKey) -> ShiftRecord {
    ShiftRecord {
        member_id: key.member_id.clone(),
        shift_date: key.shift_date,
        display_name: String::new(),
        start_time: None,
        end_time: None,
        status: ShiftStatus::None,
        is_official_present: false,
        is_official: false,
        published_start: None,
        published_end: None,
        updated_at: None,
    }
}

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// A row as the sqlite and REST backends hand it back: plain strings, checked
/// on conversion into a [`ShiftRecord`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoredRow {
    pub member_id: String,
    pub shift_date: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_official_present: Option<bool>,
    #[serde(default)]
    pub is_official: Option<bool>,
    #[serde(default)]
    pub published_start: Option<String>,
    #[serde(default)]
    pub published_end: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl StoredRow {
    pub(crate) fn into_record(self) -> Result<ShiftRecord, StoreError> {
        let row = self;
        let key = format!("{}@{}", row.member_id, row.shift_date);
        let corrupt = |detail: String| StoreError::Corrupt {
            key: key.clone(),
            detail,
        };

        let shift_date = parse_stored_date(&row.shift_date).map_err(&corrupt)?;
        let status = row
            .status
            .as_deref()
            .unwrap_or_default()
            .parse::<ShiftStatus>()
            .map_err(|e| corrupt(e.to_string()))?;
        let time = |raw: Option<String>| -> Result<Option<ShiftTime>, StoreError> {
            raw.filter(|s| !s.trim().is_empty())
                .map(|s| parse_stored_time(&s).map_err(&corrupt))
                .transpose()
        };
        let updated_at = row
            .updated_at
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| corrupt(format!("updated_at '{s}': {e}")))
            })
            .transpose()?;

        Ok(ShiftRecord {
            member_id: MemberId::new(&row.member_id),
            shift_date,
            display_name: row.display_name.unwrap_or_default(),
            start_time: time(row.start_time)?,
            end_time: time(row.end_time)?,
            status,
            is_official_present: row.is_official_present.unwrap_or(false),
            is_official: row.is_official.unwrap_or(false),
            published_start: time(row.published_start)?,
            published_end: time(row.published_end)?,
            updated_at,
        })
    }
}

fn parse_stored_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("shift_date '{raw}': {e}"))
}

/// Accepts `HH:MM` and the `HH:MM:SS` a SQL `time` column returns.
fn parse_stored_time(raw: &str) -> Result<ShiftTime, String> {
    let trimmed = raw.trim();
    let hm = match trimmed.rsplit_once(':') {
        Some((head, secs)) if head.contains(':') && secs.len() == 2 => head,
        _ => trimmed,
    };
    hm.parse::<ShiftTime>().map_err(|e| e.to_string())
}

pub(crate) fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key() -> ShiftKey {
        ShiftKey::new(MemberId::from("7"), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn write(official: bool) -> ShiftWrite {
        let times = ShiftTimes::parse("20:00", "05:00").unwrap();
        ShiftWrite {
            key: key(),
            display_name: "みか".to_string(),
            published: times,
            official: official.then_some(times),
            updated_at: at(1),
        }
    }

    fn requested() -> ShiftRecord {
        ShiftRequest {
            key: key(),
            display_name: Some("みか".to_string()),
            times: ShiftTimes::parse("19:00", "23:00").unwrap(),
            requested_at: at(0),
        }
        .apply_to(None)
    }

    #[test]
    fn write_with_times_creates_official_row() {
        let record = write(true).apply_to(None);
        assert_eq!(record.status, ShiftStatus::Official);
        assert!(record.is_official && record.is_official_present);
        assert_eq!(record.times(), Some(write(true).published));
    }

    #[test]
    fn write_without_times_creates_presence_only_row() {
        let record = write(false).apply_to(None);
        assert_eq!(record.status, ShiftStatus::None);
        assert!(record.is_official_present);
        assert_eq!(record.times(), None);
        assert_eq!(record.published_start, Some(write(false).published.start));
    }

    #[test]
    fn write_with_times_never_lands_on_a_request() {
        let before = requested();
        let after = write(true).apply_to(Some(before.clone()));
        assert_eq!(after.status, ShiftStatus::Requested);
        assert_eq!(after.times(), before.times());
        assert!(!after.is_official);
        assert!(after.is_official_present);
    }

    #[test]
    fn request_keeps_presence_and_published_times() {
        let official = write(true).apply_to(None);
        let after = ShiftRequest {
            key: key(),
            display_name: None,
            times: ShiftTimes::parse("18:00", "22:00").unwrap(),
            requested_at: at(2),
        }
        .apply_to(Some(official.clone()));
        assert_eq!(after.status, ShiftStatus::Requested);
        assert!(!after.is_official);
        assert!(after.is_official_present);
        assert_eq!(after.display_name, official.display_name);
        assert_eq!(after.published_start, official.published_start);
    }

    #[test]
    fn request_name_only_fills_an_unnamed_row() {
        let official = write(true).apply_to(None);
        let mut request = ShiftRequest {
            key: key(),
            display_name: Some("OTHER".to_string()),
            times: ShiftTimes::parse("18:00", "22:00").unwrap(),
            requested_at: at(2),
        };
        assert_eq!(request.apply_to(Some(official)).display_name, "みか");

        let presence_only = empty_record(&key());
        assert_eq!(request.apply_to(Some(presence_only)).display_name, "OTHER");

        request.display_name = None;
        assert_eq!(request.apply_to(None).display_name, "");
    }

    #[test]
    fn stored_row_accepts_sql_time_values() {
        let row = StoredRow {
            member_id: "600037".to_string(),
            shift_date: "2024-06-01".to_string(),
            start_time: Some("20:00:00".to_string()),
            end_time: Some("05:00".to_string()),
            status: Some("official".to_string()),
            is_official_present: Some(true),
            ..StoredRow::default()
        };
        let record = row.into_record().expect("row");
        assert_eq!(record.member_id, MemberId::from("00600037"));
        assert_eq!(record.start_time.map(|t| t.to_string()).as_deref(), Some("20:00"));
        assert_eq!(record.status, ShiftStatus::Official);
    }

    #[test]
    fn stored_row_with_unknown_status_is_corrupt() {
        let row = StoredRow {
            member_id: "7".to_string(),
            shift_date: "2024-06-01".to_string(),
            status: Some("absent".to_string()),
            ..StoredRow::default()
        };
        let err = row.into_record().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got: {err}");
        assert!(err.to_string().contains("absent"));
    }
}
