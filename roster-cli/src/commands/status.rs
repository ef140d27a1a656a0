//! `roster status` — stored shifts for one date.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use roster_core::{ShiftRecord, ShiftStatus};

use super::{connect, format_age, format_minutes, load_config};

/// Arguments for `roster status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Date to show, YYYY-MM-DD (default: today in the source timezone).
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    date: NaiveDate,
    last_sync_at: Option<DateTime<Utc>>,
    shifts: Vec<ShiftJson>,
}

#[derive(Serialize)]
struct ShiftJson {
    #[serde(flatten)]
    record: ShiftRecord,
    duration_minutes: Option<i64>,
    overnight: bool,
}

#[derive(Tabled)]
struct ShiftTableRow {
    #[tabled(rename = "member")]
    member: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "shift")]
    shift: String,
    #[tabled(rename = "length")]
    length: String,
    #[tabled(rename = "on roster")]
    present: String,
    #[tabled(rename = "published")]
    published: String,
}

impl StatusArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let mut store = connect(&config)?;
        let now = Utc::now();
        let date = match self.date {
            Some(date) => date,
            None => config.today(now).context("invalid source timezone")?,
        };

        let records = store
            .list_date(date)
            .with_context(|| format!("failed to list shifts for {date}"))?;
        let last_sync_at = store.last_sync_at().context("failed to read last sync time")?;

        if self.json {
            let payload = StatusJson {
                date,
                last_sync_at,
                shifts: records.into_iter().map(shift_json).collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(date, last_sync_at, now, records);
        Ok(())
    }
}

fn shift_json(record: ShiftRecord) -> ShiftJson {
    let times = record.times();
    ShiftJson {
        duration_minutes: times.map(|t| t.duration().num_minutes()),
        overnight: times.map_or(false, |t| t.is_overnight()),
        record,
    }
}

fn print_table(
    date: NaiveDate,
    last_sync_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    records: Vec<ShiftRecord>,
) {
    let last_sync = last_sync_at.map_or_else(
        || "never".to_string(),
        |at| format!("{} ago", format_age(now.signed_duration_since(at).num_seconds())),
    );
    println!(
        "Roster v{} | {date} | {} shifts | last sync {last_sync}",
        env!("CARGO_PKG_VERSION"),
        records.len(),
    );
    if records.is_empty() {
        println!("No shifts stored for {date}.");
        return;
    }

    let rows: Vec<ShiftTableRow> = records.iter().map(table_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn table_row(record: &ShiftRecord) -> ShiftTableRow {
    let times = record.times();
    let published = match (record.published_start, record.published_end) {
        (Some(start), Some(end)) => format!("{start}-{end}"),
        _ => "-".to_string(),
    };
    ShiftTableRow {
        member: record.member_id.to_string(),
        name: record.display_name.clone(),
        status: status_label(record.status),
        shift: times.map_or_else(|| "-".to_string(), |t| t.to_string()),
        length: times.map_or_else(
            || "-".to_string(),
            |t| {
                let length = format_minutes(t.duration().num_minutes());
                if t.is_overnight() {
                    format!("{length} (overnight)")
                } else {
                    length
                }
            },
        ),
        present: if record.is_official_present { "yes" } else { "no" }.to_string(),
        published,
    }
}

fn status_label(status: ShiftStatus) -> String {
    match status {
        ShiftStatus::Official => status.as_str().green().to_string(),
        ShiftStatus::Requested => status.as_str().yellow().bold().to_string(),
        ShiftStatus::None => status.as_str().bright_black().to_string(),
    }
}
