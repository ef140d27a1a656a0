//! # roster-extract
//!
//! Turns a shop's published roster page into [`Observation`]s.
//!
//! [`RosterSource`] fetches the page for a date, [`extract_observations`]
//! scans it. The scanner in [`html`] never rejects input; these pages are
//! hand-maintained and rarely well-formed.
//!
//! [`Observation`]: roster_core::Observation

pub mod error;
pub mod extract;
pub mod html;
pub mod source;

pub use error::ExtractError;
pub use extract::{extract_observations, parse_time_range, Extraction};
pub use source::{page_url, HttpSource, RosterSource};
