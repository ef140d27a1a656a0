//! Driver runs with a canned source and misbehaving stores.

use std::cell::Cell;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use roster_core::{
    Member, MemberDirectory, MemberId, ShiftKey, ShiftRecord, ShiftStatus, ShiftTimes, Shop,
    ShopId, StoreConfig,
};
use roster_extract::{ExtractError, RosterSource};
use roster_sync::{
    open_store, MemoryStore, ShiftRequest, ShiftStore, ShiftWrite, StoreError, SyncDriver,
    SyncError,
};

const PAGE: &str = r#"
<ul class="cast_list">
  <li><h3>みか（24）</h3><p class="time">20:00-05:00</p></li>
  <li><h3>さくら（19）</h3><p class="time">12:00-18:00</p></li>
  <li><h3>りん</h3><p class="time">19:00-24:00</p></li>
</ul>
"#;

/// Same page for every date; counts fetches.
struct StaticSource {
    fetches: Cell<usize>,
}

impl RosterSource for StaticSource {
    fn fetch_page(&self, _shop: &Shop, _date: NaiveDate) -> Result<String, ExtractError> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(PAGE.to_string())
    }
}

/// Which store call fails for the broken member.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Failing {
    Reads,
    Writes,
}

/// Memory store whose reads or upserts fail for one member.
struct FlakyStore {
    inner: MemoryStore,
    broken: MemberId,
    failing: Failing,
}

impl FlakyStore {
    fn new(broken: &str, failing: Failing) -> Self {
        Self {
            inner: MemoryStore::new(),
            broken: MemberId::from(broken),
            failing,
        }
    }

    fn fails(&self, key: &ShiftKey, call: Failing) -> Result<(), StoreError> {
        if self.failing == call && key.member_id == self.broken {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                detail: "simulated store failure".to_string(),
            });
        }
        Ok(())
    }
}

impl ShiftStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }
    fn ping(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
    fn fetch(&mut self, key: &ShiftKey) -> Result<Option<ShiftRecord>, StoreError> {
        self.fails(key, Failing::Reads)?;
        self.inner.fetch(key)
    }
    fn upsert(&mut self, write: &ShiftWrite) -> Result<(), StoreError> {
        self.fails(&write.key, Failing::Writes)?;
        self.inner.upsert(write)
    }
    fn submit_request(&mut self, request: &ShiftRequest) -> Result<(), StoreError> {
        self.inner.submit_request(request)
    }
    fn list_date(&mut self, date: NaiveDate) -> Result<Vec<ShiftRecord>, StoreError> {
        self.inner.list_date(date)
    }
    fn last_sync_at(&mut self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.last_sync_at()
    }
    fn mark_synced(&mut self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.mark_synced(at)
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 31, 16, 0, 0).unwrap()
}

fn shop() -> Shop {
    Shop {
        id: ShopId::from("006"),
        name: "Ikebukuro West".to_string(),
        base_url: "https://ikebukuro.example/attend.php".to_string(),
    }
}

fn directory() -> MemberDirectory {
    let member = |id: &str, name: &str| Member {
        member_id: MemberId::from(id),
        display_name: name.to_string(),
        home_shop: Some(ShopId::from("6")),
    };
    MemberDirectory {
        members: vec![
            member("600037", "みか"),
            member("600040", "サクラ"),
            member("600052", "りん"),
        ],
    }
}

fn source() -> StaticSource {
    StaticSource {
        fetches: Cell::new(0),
    }
}

#[test]
fn one_failing_key_does_not_stop_the_others() {
    let source = source();
    let dir = directory();
    let mut store = FlakyStore::new("600040", Failing::Reads);

    let report = SyncDriver::new(&source, &dir, 2, false).run(&mut store, &[shop()], today(), now());

    assert_eq!(source.fetches.get(), 2);
    assert_eq!(report.totals.failed, 2);
    assert_eq!(report.totals.created, 4);
    assert_eq!(store.inner.len(), 4);
    assert!(store
        .inner
        .get(&ShiftKey::new(MemberId::from("600040"), today()))
        .is_none());
    assert_eq!(report.last_sync_at, Some(now()));
}

#[test]
fn failed_upsert_is_counted_and_later_keys_still_land() {
    let source = source();
    let dir = directory();
    // みか is first on the page; さくら and りん come after the failing write.
    let mut store = FlakyStore::new("600037", Failing::Writes);

    let report = SyncDriver::new(&source, &dir, 2, false).run(&mut store, &[shop()], today(), now());

    assert_eq!(report.totals.failed, 2);
    assert_eq!(report.totals.created, 4);
    assert_eq!(report.skipped_dates(), 0);
    assert!(report.dates.iter().all(|d| d.counts.failed == 1));
    assert_eq!(store.inner.len(), 4);
    for date in [today(), today().succ_opt().unwrap()] {
        let written = |id: &str| store.inner.get(&ShiftKey::new(MemberId::from(id), date)).is_some();
        assert!(!written("600037"));
        assert!(written("600040"));
        assert!(written("600052"));
    }
    assert_eq!(report.last_sync_at, Some(now()));
}

#[test]
fn sqlite_run_end_to_end_then_rerun_is_stable() {
    let tmp = TempDir::new().expect("tmp");
    let config = StoreConfig::Sqlite {
        path: Some(tmp.path().join("shifts.db")),
    };
    let source = source();
    let dir = directory();

    let mut store = open_store(&config).expect("open");
    let first = SyncDriver::new(&source, &dir, 1, false).run(store.as_mut(), &[shop()], today(), now());
    assert_eq!(first.totals.created, 3);

    store
        .submit_request(&ShiftRequest {
            key: ShiftKey::new(MemberId::from("600037"), today()),
            display_name: None,
            times: ShiftTimes::parse("19:00", "23:00").expect("times"),
            requested_at: now(),
        })
        .expect("request");

    let second = SyncDriver::new(&source, &dir, 1, false).run(store.as_mut(), &[shop()], today(), now());
    assert_eq!(second.totals.synced_official, 2);
    assert_eq!(second.totals.preserved_request, 1);

    let rows = store.list_date(today()).expect("list");
    assert_eq!(rows.len(), 3);
    let mika = &rows[0];
    assert_eq!(mika.member_id, MemberId::from("600037"));
    assert_eq!(mika.status, ShiftStatus::Requested);
    assert_eq!(mika.times().map(|t| t.to_string()).as_deref(), Some("19:00-23:00"));
    assert_eq!(mika.display_name, "みか");
    let rin = &rows[2];
    assert_eq!(rin.times().map(|t| t.to_string()).as_deref(), Some("19:00-00:00"));
    assert_eq!(store.last_sync_at().expect("last sync"), Some(now()));
}

#[test]
fn rest_store_without_credentials_is_fatal() {
    let config = StoreConfig::Rest {
        url: Some("https://db.example".to_string()),
        api_key: None,
        table: "shifts".to_string(),
    };
    let err = open_store(&config).err().expect("must fail");
    assert!(matches!(err, SyncError::Core(_)), "got: {err}");
    assert!(err.to_string().contains("api_key"));
}

#[test]
fn unreachable_rest_store_is_fatal() {
    let config = StoreConfig::Rest {
        url: Some("http://127.0.0.1:9".to_string()),
        api_key: Some("key".to_string()),
        table: "shifts".to_string(),
    };
    let err = open_store(&config).err().expect("must fail");
    assert!(
        matches!(err, SyncError::StoreUnavailable { backend: "rest", .. }),
        "got: {err}"
    );
}
