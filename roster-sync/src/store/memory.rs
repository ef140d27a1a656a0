//! In-process shift store.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use roster_core::{ShiftKey, ShiftRecord};

use super::{ShiftRequest, ShiftStore, ShiftWrite};
use crate::error::StoreError;

/// `BTreeMap`-backed store. The map key is the table's uniqueness key.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<ShiftKey, ShiftRecord>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a whole row, bypassing the merge rules.
    pub fn put(&mut self, record: ShiftRecord) {
        self.records.insert(record.key(), record);
    }

    pub fn get(&self, key: &ShiftKey) -> Option<&ShiftRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &ShiftRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ShiftStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn fetch(&mut self, key: &ShiftKey) -> Result<Option<ShiftRecord>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn upsert(&mut self, write: &ShiftWrite) -> Result<(), StoreError> {
        let existing = self.records.remove(&write.key);
        self.records.insert(write.key.clone(), write.apply_to(existing));
        Ok(())
    }

    fn submit_request(&mut self, request: &ShiftRequest) -> Result<(), StoreError> {
        let existing = self.records.remove(&request.key);
        self.records
            .insert(request.key.clone(), request.apply_to(existing));
        Ok(())
    }

    fn list_date(&mut self, date: NaiveDate) -> Result<Vec<ShiftRecord>, StoreError> {
        Ok(self
            .records
            .values()
            .filter(|r| r.shift_date == date)
            .cloned()
            .collect())
    }

    fn last_sync_at(&mut self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.last_sync_at)
    }

    fn mark_synced(&mut self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.last_sync_at = Some(at);
        Ok(())
    }
}
