//! Reconciliation engine.
//!
//! The published roster and a human request are two independent writers to
//! the same `(member_id, shift_date)` key. [`decide`] is the single merge rule
//! between them:
//!
//! | prior status | time fields written | outcome             |
//! |--------------|---------------------|---------------------|
//! | absent/none  | yes, as `official`  | `created`           |
//! | `official`   | yes, as `official`  | `synced_official`   |
//! | `requested`  | no                  | `preserved_request` |
//!
//! Presence, display name and published times are written in every case.

use chrono::{DateTime, Utc};
use serde::Serialize;

use roster_core::{ResolvedObservation, ShiftRecord, ShiftStatus};

use crate::error::StoreError;
use crate::store::{ShiftStore, ShiftWrite};

/// What one reconciliation did to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// No prior record (or one with no provenance); times written as official.
    Created,
    /// Prior official record; times refreshed from the scrape.
    SyncedOfficial,
    /// Prior request; times and status left alone, presence refreshed.
    PreservedRequest,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::SyncedOfficial => "synced_official",
            Outcome::PreservedRequest => "preserved_request",
        }
    }
}

/// Compute the write for `obs` given the stored record `prior`.
pub fn decide(
    prior: Option<&ShiftRecord>,
    obs: &ResolvedObservation,
    now: DateTime<Utc>,
) -> (ShiftWrite, Outcome) {
    let prior_status = prior.map_or(ShiftStatus::None, |r| r.status);
    let (official, outcome) = match prior_status {
        ShiftStatus::Requested => (None, Outcome::PreservedRequest),
        ShiftStatus::Official => (Some(obs.times), Outcome::SyncedOfficial),
        ShiftStatus::None => (Some(obs.times), Outcome::Created),
    };
    let write = ShiftWrite {
        key: obs.key.clone(),
        display_name: obs.display_name.clone(),
        published: obs.times,
        official,
        updated_at: now,
    };
    (write, outcome)
}

/// Runs read → [`decide`] → upsert against a store, one key at a time.
pub struct Reconciler<'s> {
    store: &'s mut dyn ShiftStore,
    dry_run: bool,
}

impl<'s> Reconciler<'s> {
    pub fn new(store: &'s mut dyn ShiftStore, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Reconcile one observation: exactly one read, and one upsert unless this
    /// is a dry run.
    pub fn reconcile(
        &mut self,
        obs: &ResolvedObservation,
        now: DateTime<Utc>,
    ) -> Result<Outcome, StoreError> {
        let prior = self.store.fetch(&obs.key)?;
        let (write, outcome) = decide(prior.as_ref(), obs, now);
        if !self.dry_run {
            self.store.upsert(&write)?;
        }
        Ok(outcome)
    }

    pub fn store(&mut self) -> &mut dyn ShiftStore {
        &mut *self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ShiftRequest};
    use chrono::{NaiveDate, TimeZone};
    use roster_core::{MemberId, ShiftKey, ShiftTimes};

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn obs(start: &str, end: &str) -> ResolvedObservation {
        ResolvedObservation {
            key: ShiftKey::new(MemberId::from("7"), june_first()),
            display_name: "みか".to_string(),
            times: ShiftTimes::parse(start, end).unwrap(),
        }
    }

    fn times(start: &str, end: &str) -> Option<ShiftTimes> {
        Some(ShiftTimes::parse(start, end).unwrap())
    }

    fn store_with(status: ShiftStatus, start: &str, end: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        let key = obs(start, end).key;
        match status {
            ShiftStatus::Requested => store
                .submit_request(&ShiftRequest {
                    key,
                    display_name: Some("みか".to_string()),
                    times: ShiftTimes::parse(start, end).unwrap(),
                    requested_at: at(0),
                })
                .unwrap(),
            ShiftStatus::Official => store
                .upsert(&decide(None, &obs(start, end), at(0)).0)
                .unwrap(),
            ShiftStatus::None => {}
        }
        store
    }

    #[test]
    fn empty_store_creates_official_record() {
        let mut store = MemoryStore::new();
        let outcome = Reconciler::new(&mut store, false)
            .reconcile(&obs("20:00", "05:00"), at(1))
            .unwrap();
        assert_eq!(outcome, Outcome::Created);

        let stored = store.get(&obs("20:00", "05:00").key).expect("row");
        assert_eq!(stored.status, ShiftStatus::Official);
        assert!(stored.is_official_present);
        assert!(stored.is_official);
        assert_eq!(stored.times(), times("20:00", "05:00"));
    }

    #[test]
    fn requested_record_keeps_its_times() {
        let mut store = store_with(ShiftStatus::Requested, "19:00", "23:00");
        let key = obs("19:00", "23:00").key;
        let before = store.get(&key).cloned().expect("row");
        assert!(!before.is_official_present);

        let outcome = Reconciler::new(&mut store, false)
            .reconcile(&obs("20:00", "05:00"), at(1))
            .unwrap();
        assert_eq!(outcome, Outcome::PreservedRequest);

        let after = store.get(&key).expect("row");
        assert_eq!(after.start_time, before.start_time);
        assert_eq!(after.end_time, before.end_time);
        assert_eq!(after.status, ShiftStatus::Requested);
        assert_eq!(after.is_official, before.is_official);
        assert!(after.is_official_present);
        assert_eq!(after.published_start, times("20:00", "05:00").map(|t| t.start));
    }

    #[test]
    fn official_record_takes_new_times() {
        let mut store = store_with(ShiftStatus::Official, "18:00", "02:00");
        let outcome = Reconciler::new(&mut store, false)
            .reconcile(&obs("20:00", "05:00"), at(1))
            .unwrap();
        assert_eq!(outcome, Outcome::SyncedOfficial);
        let after = store.get(&obs("20:00", "05:00").key).expect("row");
        assert_eq!(after.times(), times("20:00", "05:00"));
        assert_eq!(after.status, ShiftStatus::Official);
    }

    #[test]
    fn presence_only_record_counts_as_created() {
        let mut store = MemoryStore::new();
        let mut presence = decide(None, &obs("20:00", "05:00"), at(0)).0;
        presence.official = None;
        store.upsert(&presence).unwrap();
        assert_eq!(
            store.get(&presence.key).map(|r| r.status),
            Some(ShiftStatus::None)
        );

        let outcome = Reconciler::new(&mut store, false)
            .reconcile(&obs("20:00", "05:00"), at(1))
            .unwrap();
        assert_eq!(outcome, Outcome::Created);
        assert_eq!(
            store.get(&presence.key).map(|r| r.status),
            Some(ShiftStatus::Official)
        );
    }

    #[test]
    fn reconciling_twice_is_idempotent() {
        for status in [ShiftStatus::None, ShiftStatus::Official, ShiftStatus::Requested] {
            let mut store = store_with(status, "18:00", "02:00");
            let o = obs("20:00", "05:00");
            Reconciler::new(&mut store, false).reconcile(&o, at(1)).unwrap();
            let once = store.clone();
            Reconciler::new(&mut store, false).reconcile(&o, at(1)).unwrap();
            assert_eq!(
                store.records().collect::<Vec<_>>(),
                once.records().collect::<Vec<_>>(),
                "prior status {status}"
            );
        }
    }

    #[test]
    fn dry_run_reads_and_decides_without_writing() {
        let mut store = store_with(ShiftStatus::Official, "18:00", "02:00");
        let before = store.clone();
        let mut reconciler = Reconciler::new(&mut store, true);
        assert!(reconciler.is_dry_run());
        let outcome = reconciler.reconcile(&obs("20:00", "05:00"), at(1)).unwrap();
        assert_eq!(outcome, Outcome::SyncedOfficial);
        assert_eq!(
            store.records().collect::<Vec<_>>(),
            before.records().collect::<Vec<_>>()
        );
    }

    #[test]
    fn decision_is_exhaustive_over_prior_status() {
        let o = obs("20:00", "05:00");
        let (write, outcome) = decide(None, &o, at(1));
        assert_eq!((write.official, outcome), (Some(o.times), Outcome::Created));

        let requested = store_with(ShiftStatus::Requested, "19:00", "23:00");
        let prior = requested.get(&o.key);
        let (write, outcome) = decide(prior, &o, at(1));
        assert_eq!(outcome, Outcome::PreservedRequest);
        assert!(!write.includes_times());
        assert_eq!(write.published, o.times);
    }
}
