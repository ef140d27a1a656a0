//! PostgREST-style HTTP shift store.
//!
//! ```text
//! GET  {url}/rest/v1/{table}?member_id=eq.<id>&shift_date=eq.<date>
//! POST {url}/rest/v1/{table}?on_conflict=member_id,shift_date
//!      Prefer: resolution=merge-duplicates
//! ```
//!
//! A merge-duplicates POST only touches the columns present in the body, which
//! is the partial-field upsert the engine needs. Unlike the sqlite backend the
//! request guard cannot be expressed in the write itself; a request committed
//! between the engine's read and its write is overwritten until the next run.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use roster_core::{ShiftKey, ShiftRecord};

use super::{date_key, ShiftRequest, ShiftStore, ShiftWrite, StoredRow};
use crate::error::StoreError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SYNC_LOG_TABLE: &str = "sync_logs";

pub struct RestStore {
    agent: ureq::Agent,
    base: String,
    table: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SyncLogRow {
    last_sync_at: Option<String>,
}

impl RestStore {
    pub fn new(url: &str, api_key: &str, table: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            base: format!("{}/rest/v1", url.trim_end_matches('/')),
            table: table.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base, table)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
    }

    fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table);
        let mut req = self.request("GET", &url);
        for (name, value) in query {
            req = req.query(name, value);
        }
        let response = send(req.call(), &url)?;
        response
            .into_json()
            .map_err(|source| StoreError::Decode { url, source })
    }

    fn merge(&self, table: &str, conflict: &str, body: Value) -> Result<(), StoreError> {
        let url = self.table_url(table);
        let req = self
            .request("POST", &url)
            .query("on_conflict", conflict)
            .set("Prefer", "resolution=merge-duplicates,return=minimal");
        send(req.send_json(body), &url)?;
        Ok(())
    }
}

fn send(
    result: Result<ureq::Response, ureq::Error>,
    url: &str,
) -> Result<ureq::Response, StoreError> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => Err(StoreError::Status {
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(err) => Err(StoreError::Http {
            url: url.to_string(),
            source: Box::new(err),
        }),
    }
}

/// JSON body of a scrape upsert. Time fields are only present when the write
/// carries them.
fn write_body(write: &ShiftWrite) -> Value {
    let mut body = Map::new();
    body.insert("member_id".into(), json!(write.key.member_id.as_str()));
    body.insert("shift_date".into(), json!(date_key(write.key.shift_date)));
    body.insert("display_name".into(), json!(write.display_name));
    body.insert("is_official_present".into(), json!(true));
    body.insert("published_start".into(), json!(write.published.start.to_string()));
    body.insert("published_end".into(), json!(write.published.end.to_string()));
    body.insert("updated_at".into(), json!(write.updated_at.to_rfc3339()));
    if let Some(times) = write.official {
        body.insert("start_time".into(), json!(times.start.to_string()));
        body.insert("end_time".into(), json!(times.end.to_string()));
        body.insert("status".into(), json!("official"));
        body.insert("is_official".into(), json!(true));
    }
    Value::Object(body)
}

/// JSON body of a request. `display_name` is only sent when the row read
/// just before has no name yet.
fn request_body(request: &ShiftRequest, existing: Option<&ShiftRecord>) -> Value {
    let mut body = json!({
        "member_id": request.key.member_id.as_str(),
        "shift_date": date_key(request.key.shift_date),
        "start_time": request.times.start.to_string(),
        "end_time": request.times.end.to_string(),
        "status": "requested",
        "is_official": false,
        "updated_at": request.requested_at.to_rfc3339(),
    });
    let unnamed = existing.map_or(true, |r| r.display_name.is_empty());
    if let (Some(name), true, Some(map)) = (&request.display_name, unnamed, body.as_object_mut()) {
        map.insert("display_name".into(), json!(name));
    }
    body
}

impl ShiftStore for RestStore {
    fn backend(&self) -> &'static str {
        "rest"
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        self.get_rows::<Value>(
            &self.table,
            &[("select", "member_id".to_string()), ("limit", "1".to_string())],
        )?;
        Ok(())
    }

    fn fetch(&mut self, key: &ShiftKey) -> Result<Option<ShiftRecord>, StoreError> {
        let rows: Vec<StoredRow> = self.get_rows(
            &self.table,
            &[
                ("member_id", format!("eq.{}", key.member_id)),
                ("shift_date", format!("eq.{}", date_key(key.shift_date))),
                ("limit", "1".to_string()),
            ],
        )?;
        rows.into_iter().next().map(StoredRow::into_record).transpose()
    }

    fn upsert(&mut self, write: &ShiftWrite) -> Result<(), StoreError> {
        self.merge(&self.table, "member_id,shift_date", write_body(write))
    }

    fn submit_request(&mut self, request: &ShiftRequest) -> Result<(), StoreError> {
        let existing = match request.display_name {
            Some(_) => self.fetch(&request.key)?,
            None => None,
        };
        let body = request_body(request, existing.as_ref());
        self.merge(&self.table, "member_id,shift_date", body)
    }

    fn list_date(&mut self, date: NaiveDate) -> Result<Vec<ShiftRecord>, StoreError> {
        let rows: Vec<StoredRow> = self.get_rows(
            &self.table,
            &[
                ("shift_date", format!("eq.{}", date_key(date))),
                ("order", "member_id.asc".to_string()),
            ],
        )?;
        rows.into_iter().map(StoredRow::into_record).collect()
    }

    fn last_sync_at(&mut self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let rows: Vec<SyncLogRow> = self.get_rows(
            SYNC_LOG_TABLE,
            &[("id", "eq.1".to_string()), ("select", "last_sync_at".to_string())],
        )?;
        let Some(raw) = rows.into_iter().next().and_then(|r| r.last_sync_at) else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| StoreError::Corrupt {
                key: SYNC_LOG_TABLE.to_string(),
                detail: format!("last_sync_at '{raw}': {e}"),
            })
    }

    fn mark_synced(&mut self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.merge(
            SYNC_LOG_TABLE,
            "id",
            json!({ "id": 1, "last_sync_at": at.to_rfc3339() }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use roster_core::{MemberId, ShiftTimes};

    fn write(official: bool) -> ShiftWrite {
        let times = ShiftTimes::parse("20:00", "05:00").unwrap();
        ShiftWrite {
            key: ShiftKey::new(
                MemberId::from("600037"),
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ),
            display_name: "みか".to_string(),
            published: times,
            official: official.then_some(times),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn base_url_is_normalised() {
        let store = RestStore::new("https://db.example/", "key", "shifts");
        assert_eq!(store.table_url("shifts"), "https://db.example/rest/v1/shifts");
    }

    #[test]
    fn write_body_omits_time_fields_for_presence_only_writes() {
        let body = write_body(&write(false));
        let map = body.as_object().expect("object");
        assert_eq!(map["member_id"], "00600037");
        assert_eq!(map["shift_date"], "2024-06-01");
        assert_eq!(map["is_official_present"], true);
        assert_eq!(map["published_start"], "20:00");
        for field in ["start_time", "end_time", "status", "is_official"] {
            assert!(!map.contains_key(field), "{field} must not be written");
        }
    }

    #[test]
    fn write_body_carries_official_times() {
        let body = write_body(&write(true));
        assert_eq!(body["start_time"], "20:00");
        assert_eq!(body["end_time"], "05:00");
        assert_eq!(body["status"], "official");
        assert_eq!(body["is_official"], true);
    }

    #[test]
    fn request_body_never_touches_presence() {
        let request = ShiftRequest {
            key: write(true).key,
            display_name: None,
            times: ShiftTimes::parse("19:00", "23:00").unwrap(),
            requested_at: Utc.with_ymd_and_hms(2024, 5, 30, 12, 0, 0).unwrap(),
        };
        let body = request_body(&request, None);
        assert_eq!(body["status"], "requested");
        assert_eq!(body["is_official"], false);
        assert!(body.get("is_official_present").is_none());
        assert!(body.get("display_name").is_none());
    }

    #[test]
    fn request_body_sends_name_only_for_unnamed_rows() {
        let request = ShiftRequest {
            key: write(true).key,
            display_name: Some("OTHER".to_string()),
            times: ShiftTimes::parse("19:00", "23:00").unwrap(),
            requested_at: Utc.with_ymd_and_hms(2024, 5, 30, 12, 0, 0).unwrap(),
        };
        let named = write(true).apply_to(None);
        assert!(request_body(&request, Some(&named)).get("display_name").is_none());
        assert_eq!(request_body(&request, None)["display_name"], "OTHER");

        let mut unnamed = named;
        unnamed.display_name.clear();
        assert_eq!(request_body(&request, Some(&unnamed))["display_name"], "OTHER");
    }

    #[test]
    fn unreachable_store_fails_ping() {
        let mut store = RestStore::new("http://127.0.0.1:9", "key", "shifts");
        let err = store.ping().unwrap_err();
        assert!(matches!(err, StoreError::Http { .. }), "got: {err}");
    }
}
