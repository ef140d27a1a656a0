//! `roster request` — record a human shift request.
//!
//! A requested row keeps its times through every later sync until it is
//! requested again or edited directly in the store.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;
use colored::Colorize;

use roster_core::{MemberId, ShiftKey, ShiftTimes};
use roster_sync::ShiftRequest;

use super::{connect, load_config};

/// Arguments for `roster request`.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Member (login) id; numeric ids are zero-padded.
    pub member_id: String,

    /// Shift date, YYYY-MM-DD.
    pub date: NaiveDate,

    /// Start time, H:MM or HH:MM.
    pub start: String,

    /// End time; earlier than start means the shift ends the next day.
    pub end: String,

    /// Display name for a member not yet on the roster for this date.
    #[arg(long)]
    pub name: Option<String>,
}

impl RequestArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let times = ShiftTimes::parse(&self.start, &self.end)
            .with_context(|| format!("invalid shift times '{}'-'{}'", self.start, self.end))?;
        let config = load_config(config_path)?;
        let mut store = connect(&config)?;

        let request = ShiftRequest {
            key: ShiftKey::new(MemberId::new(&self.member_id), self.date),
            display_name: self.name,
            times,
            requested_at: Utc::now(),
        };
        store
            .submit_request(&request)
            .with_context(|| format!("failed to record request for {}", request.key))?;

        tracing::info!(key = %request.key, %times, "request recorded");
        println!("{} requested {} {times}", "✓".green().bold(), request.key);
        Ok(())
    }
}
