//! `roster sync` — scrape the window and reconcile it into the store.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use roster_core::MemberDirectory;
use roster_extract::HttpSource;
use roster_sync::{DateReport, OutcomeCounts, SyncDriver, SyncReport};

use super::{connect, load_config};

/// Arguments for `roster sync`.
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Only this shop (repeatable). Leading zeros are ignored.
    #[arg(long = "shop", value_name = "ID")]
    pub shops: Vec<String>,

    /// Only the n-th group of three shops, in config order.
    #[arg(long, value_name = "N", conflicts_with = "shops")]
    pub group: Option<usize>,

    /// Window length in days, starting today (overrides `window_days`).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=31))]
    pub days: Option<u32>,

    /// Read and decide, but write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let shops = config
            .select_shops(&self.shops, self.group)
            .context("invalid shop selection")?;
        let members_path = config
            .members_path
            .as_deref()
            .context("no member directory configured")?;
        let directory = MemberDirectory::load_at(members_path)
            .with_context(|| format!("failed to load member directory '{}'", members_path.display()))?;

        let mut store = connect(&config)?;
        let source = HttpSource::new(&config);
        let now = Utc::now();
        let today = config.today(now).context("invalid source timezone")?;
        let window = self.days.unwrap_or(config.window_days);

        tracing::info!(
            shops = shops.len(),
            %today,
            window_days = window,
            backend = store.backend(),
            dry_run = self.dry_run,
            "sync started"
        );
        let report =
            SyncDriver::new(&source, &directory, window, self.dry_run).run(store.as_mut(), &shops, today, now);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize sync report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    for date in &report.dates {
        print_date(prefix, date);
    }

    let t = &report.totals;
    println!(
        "{prefix}{} {} reconciled ({} created, {} synced, {} preserved), {} unresolved, {} failed, {} dates skipped",
        "Σ".bold(),
        t.reconciled(),
        t.created,
        t.synced_official,
        t.preserved_request,
        t.skipped_unresolved,
        t.failed,
        report.skipped_dates(),
    );
}

fn print_date(prefix: &str, date: &DateReport) {
    let label = format!("{} {}", date.shop, date.date);
    if let Some(error) = &date.error {
        println!("{prefix}{} {label} skipped: {error}", "✗".red().bold());
        return;
    }
    let marker = if date.counts.failed > 0 {
        "!".yellow().bold()
    } else {
        "✓".green().bold()
    };
    println!("{prefix}{marker} {label}  {}", counts_line(&date.counts));
    for name in &date.unmatched {
        println!("  {}  {name}", "?".bright_black());
    }
}

fn counts_line(c: &OutcomeCounts) -> String {
    let mut parts = vec![
        format!("created {}", c.created),
        format!("synced {}", c.synced_official),
        format!("preserved {}", c.preserved_request),
    ];
    if c.skipped_unresolved > 0 {
        parts.push(format!("unresolved {}", c.skipped_unresolved));
    }
    if c.skipped_no_time > 0 {
        parts.push(format!("no time {}", c.skipped_no_time));
    }
    if c.failed > 0 {
        parts.push(format!("failed {}", c.failed).red().to_string());
    }
    parts.join(" · ")
}
