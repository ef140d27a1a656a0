//! Sync driver shared by `roster sync` and tests.
//!
//! For each selected shop and each date of the window: fetch the page,
//! extract observations, resolve identities, reconcile each resolved
//! observation in document order. Failures are contained at the smallest
//! scope that has them: a date whose page cannot be fetched is skipped, an
//! observation without a member is skipped, a key whose read or upsert fails
//! is counted and the next observation proceeds.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use roster_core::{
    names, IdentityResolver, MemberDirectory, ResolvedObservation, ShiftKey, Shop, ShopId,
};
use roster_extract::{extract_observations, RosterSource};

use crate::reconcile::{Outcome, Reconciler};
use crate::store::ShiftStore;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub synced_official: usize,
    pub preserved_request: usize,
    /// Name found on the page but not in the directory. Page labels are
    /// not counted.
    pub skipped_unresolved: usize,
    /// Name found on the page without a time range.
    pub skipped_no_time: usize,
    /// Second and later sightings of a member on one page.
    pub duplicates: usize,
    /// Store read or upsert failed for the key.
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::SyncedOfficial => self.synced_official += 1,
            Outcome::PreservedRequest => self.preserved_request += 1,
        }
    }

    pub fn add(&mut self, other: &OutcomeCounts) {
        self.created += other.created;
        self.synced_official += other.synced_official;
        self.preserved_request += other.preserved_request;
        self.skipped_unresolved += other.skipped_unresolved;
        self.skipped_no_time += other.skipped_no_time;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }

    /// Observations that reached the store.
    pub fn reconciled(&self) -> usize {
        self.created + self.synced_official + self.preserved_request
    }
}

/// Result of one shop/date pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateReport {
    pub shop: ShopId,
    pub date: NaiveDate,
    pub counts: OutcomeCounts,
    /// Published names with no directory entry, annotations stripped.
    pub unmatched: Vec<String>,
    /// Why the date was skipped, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub dates: Vec<DateReport>,
    pub totals: OutcomeCounts,
    /// Set when the run's completion was recorded in the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn skipped_dates(&self) -> usize {
        self.dates.iter().filter(|d| d.error.is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct SyncDriver<'a> {
    source: &'a dyn RosterSource,
    directory: &'a MemberDirectory,
    window_days: u32,
    dry_run: bool,
}

impl<'a> SyncDriver<'a> {
    pub fn new(
        source: &'a dyn RosterSource,
        directory: &'a MemberDirectory,
        window_days: u32,
        dry_run: bool,
    ) -> Self {
        Self {
            source,
            directory,
            window_days,
            dry_run,
        }
    }

    /// Dates processed by a run starting on `today`.
    pub fn window(&self, today: NaiveDate) -> Vec<NaiveDate> {
        today.iter_days().take(self.window_days as usize).collect()
    }

    /// Sync every shop over the window starting at `today`.
    ///
    /// Never fails: every error below setup is recorded in the report.
    pub fn run(
        &self,
        store: &mut dyn ShiftStore,
        shops: &[Shop],
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> SyncReport {
        let mut reconciler = Reconciler::new(store, self.dry_run);
        let mut report = SyncReport {
            started_at: now,
            dry_run: self.dry_run,
            dates: Vec::new(),
            totals: OutcomeCounts::default(),
            last_sync_at: None,
        };

        for shop in shops {
            let resolver = self.directory.for_shop(&shop.id);
            if resolver.is_empty() {
                tracing::warn!(shop = %shop.id, "no directory members for shop");
            }
            for date in self.window(today) {
                let date_report = self.sync_date(&mut reconciler, shop, &resolver, date, now);
                report.totals.add(&date_report.counts);
                report.dates.push(date_report);
            }
        }

        if !self.dry_run {
            match reconciler.store().mark_synced(now) {
                Ok(()) => report.last_sync_at = Some(now),
                Err(err) => tracing::warn!(error = %err, "failed to record last sync time"),
            }
        }

        let t = &report.totals;
        tracing::info!(
            created = t.created,
            synced_official = t.synced_official,
            preserved_request = t.preserved_request,
            skipped_unresolved = t.skipped_unresolved,
            failed = t.failed,
            skipped_dates = report.skipped_dates(),
            dry_run = self.dry_run,
            "sync finished"
        );
        report
    }

    fn sync_date(
        &self,
        reconciler: &mut Reconciler<'_>,
        shop: &Shop,
        resolver: &dyn IdentityResolver,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DateReport {
        let mut report = DateReport {
            shop: shop.id.clone(),
            date,
            counts: OutcomeCounts::default(),
            unmatched: Vec::new(),
            error: None,
        };

        let page = match self.source.fetch_page(shop, date) {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(shop = %shop.id, %date, error = %err, "skipping date");
                report.error = Some(err.to_string());
                return report;
            }
        };

        let extraction = extract_observations(&page);
        if extraction.observations.is_empty() && extraction.without_times.is_empty() {
            tracing::info!(shop = %shop.id, %date, "no roster entries on page");
        }

        for raw in &extraction.without_times {
            if names::looks_like_label(raw) {
                continue;
            }
            report.counts.skipped_no_time += 1;
            tracing::debug!(shop = %shop.id, %date, name = %raw, "skipped: no time range");
        }

        let mut seen = HashSet::new();
        for obs in &extraction.observations {
            let display_name = names::strip_annotation(&obs.display_name);
            let Some(member_id) = resolver.resolve(&obs.display_name) else {
                if names::looks_like_label(&obs.display_name) {
                    tracing::debug!(shop = %shop.id, %date, label = %display_name, "skipped: page label");
                    continue;
                }
                report.counts.skipped_unresolved += 1;
                tracing::info!(shop = %shop.id, %date, name = %display_name, "skipped: unresolved name");
                report.unmatched.push(display_name.to_string());
                continue;
            };
            if !seen.insert(member_id.clone()) {
                report.counts.duplicates += 1;
                tracing::debug!(shop = %shop.id, %date, %member_id, "skipped: duplicate on page");
                continue;
            }

            let resolved = ResolvedObservation {
                key: ShiftKey::new(member_id, date),
                display_name: display_name.to_string(),
                times: obs.times,
            };
            match reconciler.reconcile(&resolved, now) {
                Ok(outcome) => {
                    report.counts.record(outcome);
                    tracing::info!(
                        shop = %shop.id,
                        key = %resolved.key,
                        times = %resolved.times,
                        outcome = outcome.as_str(),
                        dry_run = self.dry_run,
                        "reconciled"
                    );
                }
                Err(err) => {
                    report.counts.failed += 1;
                    tracing::warn!(shop = %shop.id, key = %resolved.key, error = %err, "reconcile failed");
                }
            }
        }
        report
    }
}
