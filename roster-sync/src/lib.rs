//! # roster-sync
//!
//! Reconciles scraped roster observations into the shift store without
//! touching rows a human has requested.
//!
//! [`open_store`] connects the configured [`ShiftStore`]; [`SyncDriver`] walks
//! shops and dates and hands every resolved observation to the
//! [`Reconciler`], which applies the merge rule in [`reconcile::decide`].

pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod store;

pub use error::{StoreError, SyncError};
pub use pipeline::{DateReport, OutcomeCounts, SyncDriver, SyncReport};
pub use reconcile::{decide, Outcome, Reconciler};
pub use store::{
    open_store, MemoryStore, RestStore, ShiftRequest, ShiftStore, ShiftWrite, SqliteStore,
};
