//! Roster core library — domain types, name normalisation, member directory,
//! configuration, errors.
//!
//! - [`types`] — newtypes, shift times, provenance status, records
//! - [`names`] — display-name cleanup used by identity resolution
//! - [`directory`] — member directory / identity resolver
//! - [`config`] — sync configuration load / validate
//! - [`error`] — [`CoreError`]

pub mod config;
pub mod directory;
pub mod error;
pub mod names;
pub mod types;

pub use config::{Shop, StoreConfig, SyncConfig};
pub use directory::{IdentityResolver, Member, MemberDirectory, ShopDirectory};
pub use error::CoreError;
pub use types::{
    MemberId, Observation, ResolvedObservation, ShiftKey, ShiftRecord, ShiftStatus, ShiftTime,
    ShiftTimes, ShopId,
};
