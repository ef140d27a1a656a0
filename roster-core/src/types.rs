//! Domain types for roster reconciliation.
//!
//! Identifiers are newtypes that normalise on construction, so two spellings
//! of the same member or shop compare equal everywhere downstream.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Width of a normalised numeric member id.
pub const MEMBER_ID_WIDTH: usize = 8;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Directory entries may carry ids as YAML numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// Stable identifier of a roster member (the login id).
///
/// Numeric ids are left-padded with zeros to [`MEMBER_ID_WIDTH`] digits, so
/// `600037` and `"00600037"` are the same member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Self(format!("{trimmed:0>width$}", width = MEMBER_ID_WIDTH))
        } else {
            Self(trimmed.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<RawId> for MemberId {
    fn from(raw: RawId) -> Self {
        Self::new(&String::from(raw))
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

/// Identifier of a shop publishing its own roster page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct ShopId(pub String);

impl ShopId {
    /// Shop ids compare equal with or without leading zeros (`"6"` == `"006"`).
    pub fn matches(&self, other: &ShopId) -> bool {
        self.canonical() == other.canonical()
    }

    fn canonical(&self) -> &str {
        let trimmed = self.0.trim();
        let stripped = trimmed.trim_start_matches('0');
        if stripped.is_empty() && !trimmed.is_empty() {
            "0"
        } else {
            stripped
        }
    }
}

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ShopId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_owned())
    }
}

impl From<String> for ShopId {
    fn from(s: String) -> Self {
        Self(s.trim().to_owned())
    }
}

impl From<RawId> for ShopId {
    fn from(raw: RawId) -> Self {
        Self::from(String::from(raw))
    }
}

impl From<ShopId> for String {
    fn from(id: ShopId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Shift times
// ---------------------------------------------------------------------------

/// Local time of day, rendered as `HH:MM`.
///
/// Parsing accepts one- or two-digit hours. Hours from 24 to 47 (the
/// "25:00 = 1am" convention of late-night rosters) wrap into the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShiftTime(NaiveTime);

impl ShiftTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour % 24, minute, 0)
            .filter(|_| hour < 48)
            .map(Self)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl FromStr for ShiftTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidTime(s.to_owned());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for ShiftTime {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ShiftTime> for String {
    fn from(t: ShiftTime) -> Self {
        t.to_string()
    }
}

impl fmt::Display for ShiftTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

/// A start/end pair. `end < start` is an overnight shift, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShiftTimes {
    pub start: ShiftTime,
    pub end: ShiftTime,
}

impl ShiftTimes {
    pub fn new(start: ShiftTime, end: ShiftTime) -> Self {
        Self { start, end }
    }

    /// Parse a pair of `H:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, CoreError> {
        Ok(Self::new(start.parse()?, end.parse()?))
    }

    pub fn is_overnight(&self) -> bool {
        self.end < self.start
    }

    /// Length of the shift, crossing midnight when `end < start`.
    pub fn duration(&self) -> Duration {
        let span = self.end.0.signed_duration_since(self.start.0);
        if self.is_overnight() {
            span + Duration::hours(24)
        } else {
            span
        }
    }
}

impl fmt::Display for ShiftTimes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Which writer owns a record's time fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    /// No provenance yet (absent record, or a presence-only row).
    #[default]
    None,
    /// Times mirror the most recent scrape of the published roster.
    Official,
    /// Times were set by a human request and are owned by that request.
    Requested,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::None => "none",
            ShiftStatus::Official => "official",
            ShiftStatus::Requested => "requested",
        }
    }

    /// Whether a scrape must leave the time and status fields untouched.
    pub fn protects_times(&self) -> bool {
        matches!(self, ShiftStatus::Requested)
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(ShiftStatus::None),
            "official" => Ok(ShiftStatus::Official),
            "requested" => Ok(ShiftStatus::Requested),
            other => Err(CoreError::UnknownStatus(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Keys, observations, records
// ---------------------------------------------------------------------------

/// Composite uniqueness key of the shift table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShiftKey {
    pub member_id: MemberId,
    pub shift_date: NaiveDate,
}

impl ShiftKey {
    pub fn new(member_id: MemberId, shift_date: NaiveDate) -> Self {
        Self {
            member_id,
            shift_date,
        }
    }
}

impl fmt::Display for ShiftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.member_id, self.shift_date)
    }
}

/// One scraped `(display_name, start, end)` tuple, before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Raw text of the name element, annotations included.
    pub display_name: String,
    pub times: ShiftTimes,
}

/// An observation whose display name resolved to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedObservation {
    pub key: ShiftKey,
    /// Published label with annotations stripped.
    pub display_name: String,
    pub times: ShiftTimes,
}

/// One row of the shift table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub member_id: MemberId,
    pub shift_date: NaiveDate,
    pub display_name: String,
    pub start_time: Option<ShiftTime>,
    pub end_time: Option<ShiftTime>,
    pub status: ShiftStatus,
    /// The published roster currently has a slot for this member on this date.
    pub is_official_present: bool,
    /// Official-provenance flag: the time fields came from the published roster.
    pub is_official: bool,
    /// Times as last published, recorded even while a request owns the row.
    pub published_start: Option<ShiftTime>,
    pub published_end: Option<ShiftTime>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ShiftRecord {
    pub fn key(&self) -> ShiftKey {
        ShiftKey::new(self.member_id.clone(), self.shift_date)
    }

    pub fn times(&self) -> Option<ShiftTimes> {
        Some(ShiftTimes::new(self.start_time?, self.end_time?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
