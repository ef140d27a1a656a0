//! Subcommands and the setup they share.

pub mod request;
pub mod status;
pub mod sync;

use std::path::Path;

use anyhow::{Context, Result};

use roster_core::SyncConfig;
use roster_sync::{open_store, ShiftStore};

/// Load, apply `ROSTER_*` overrides, validate.
pub fn load_config(explicit: Option<&Path>) -> Result<SyncConfig> {
    let mut config = SyncConfig::load(explicit)
        .context("failed to load config (create ~/.roster/config.yaml or pass --config)")?;
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("invalid ROSTER_* environment override")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

pub fn connect(config: &SyncConfig) -> Result<Box<dyn ShiftStore>> {
    open_store(&config.store).context("shift store setup failed")
}

/// `90` → `"1h30m"`.
pub fn format_minutes(minutes: i64) -> String {
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

/// Coarse age of a timestamp: `42s`, `5m`, `3h`, `2d`.
pub fn format_age(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
