//! Sync configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.roster/
//!   config.yaml     (SyncConfig)
//!   members.yaml    (MemberDirectory, default location)
//!   shifts.db       (sqlite store, default location)
//! ```
//!
//! # API pattern
//!
//! Loaders have two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Environment overrides are applied after the file is read, through a lookup
//! closure so tests never touch the process environment.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::types::ShopId;

pub const ENV_STORE_URL: &str = "ROSTER_STORE_URL";
pub const ENV_STORE_KEY: &str = "ROSTER_STORE_KEY";
pub const ENV_SQLITE_PATH: &str = "ROSTER_SQLITE_PATH";
pub const ENV_WINDOW_DAYS: &str = "ROSTER_WINDOW_DAYS";
pub const ENV_UTC_OFFSET_HOURS: &str = "ROSTER_UTC_OFFSET_HOURS";

/// Shops per `--group`, in configuration order.
pub const SHOPS_PER_GROUP: usize = 3;

/// A shop publishing its own roster page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    /// Roster page endpoint, e.g. `https://example.com/attend.php`.
    pub base_url: String,
}

/// Where shift records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Local SQLite database.
    Sqlite {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// PostgREST-style HTTP table API.
    Rest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default = "default_table")]
        table: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite { path: None }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Query parameter carrying the `YYYY/MM/DD` date.
    #[serde(default = "default_date_param")]
    pub date_param: String,
    /// Append `&t=<unix millis>` so caches never answer.
    #[serde(default = "default_cache_bust")]
    pub cache_bust: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_path: Option<PathBuf>,
    #[serde(default)]
    pub shops: Vec<Shop>,
    #[serde(default)]
    pub store: StoreConfig,
    /// Directory relative paths resolve against: the config file's directory
    /// once loaded.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            utc_offset_hours: default_utc_offset_hours(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            date_param: default_date_param(),
            cache_bust: default_cache_bust(),
            members_path: None,
            shops: Vec::new(),
            store: StoreConfig::default(),
            base_dir: None,
        }
    }
}

fn default_window_days() -> u32 {
    7
}
fn default_utc_offset_hours() -> i32 {
    9
}
fn default_fetch_timeout_secs() -> u64 {
    6
}
fn default_user_agent() -> String {
    format!("roster/{}", env!("CARGO_PKG_VERSION"))
}
fn default_date_param() -> String {
    "date_get".to_string()
}
fn default_cache_bust() -> bool {
    true
}
fn default_table() -> String {
    "shifts".to_string()
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.roster/`
pub fn roster_dir_at(home: &Path) -> PathBuf {
    home.join(".roster")
}

/// `<home>/.roster/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    roster_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Load the configuration from `explicit`, or `<home>/.roster/config.yaml`.
    ///
    /// Relative `members_path` / sqlite `path` values are resolved against the
    /// config file's directory; unset ones default to `<home>/.roster/`.
    pub fn load_at(home: &Path, explicit: Option<&Path>) -> Result<Self, CoreError> {
        let path = explicit.map_or_else(|| config_path_at(home), Path::to_path_buf);
        if !path.exists() {
            return Err(CoreError::ConfigNotFound { path });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let mut config: SyncConfig =
            serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
                path: path.clone(),
                source: e,
            })?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(home, base);
        config.base_dir = Some(base.to_path_buf());
        Ok(config)
    }

    /// `load_at` convenience wrapper.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CoreError> {
        let home = dirs::home_dir().ok_or(CoreError::HomeNotFound)?;
        Self::load_at(&home, explicit)
    }

    fn resolve_paths(&mut self, home: &Path, base: &Path) {
        let members = self
            .members_path
            .take()
            .unwrap_or_else(|| roster_dir_at(home).join("members.yaml"));
        self.members_path = Some(absolutize(base, members));

        if let StoreConfig::Sqlite { path } = &mut self.store {
            let db = path
                .take()
                .unwrap_or_else(|| roster_dir_at(home).join("shifts.db"));
            *path = Some(absolutize(base, db));
        }
    }

    /// Apply `ROSTER_*` overrides. `lookup` is usually `|k| std::env::var(k).ok()`.
    ///
    /// A relative `ROSTER_SQLITE_PATH` resolves against [`Self::base_dir`],
    /// like a relative `path` in the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_WINDOW_DAYS) {
            self.window_days = raw.trim().parse().map_err(|_| {
                CoreError::InvalidConfig(format!("{ENV_WINDOW_DAYS}='{raw}' is not a day count"))
            })?;
        }
        if let Some(raw) = lookup(ENV_UTC_OFFSET_HOURS) {
            self.utc_offset_hours = raw.trim().parse().map_err(|_| {
                CoreError::InvalidConfig(format!("{ENV_UTC_OFFSET_HOURS}='{raw}' is not an hour offset"))
            })?;
        }

        let env_url = lookup(ENV_STORE_URL);
        let env_key = lookup(ENV_STORE_KEY);
        if let Some(db) = lookup(ENV_SQLITE_PATH) {
            let db = PathBuf::from(db);
            let path = match &self.base_dir {
                Some(base) => absolutize(base, db),
                None => db,
            };
            self.store = StoreConfig::Sqlite { path: Some(path) };
        } else if env_url.is_some() || env_key.is_some() {
            match &mut self.store {
                StoreConfig::Rest { url, api_key, .. } => {
                    if env_url.is_some() {
                        *url = env_url;
                    }
                    if env_key.is_some() {
                        *api_key = env_key;
                    }
                }
                StoreConfig::Sqlite { .. } => {
                    self.store = StoreConfig::Rest {
                        url: env_url,
                        api_key: env_key,
                        table: default_table(),
                    };
                }
            }
        }
        Ok(())
    }

    /// Reject out-of-range values and missing store credentials.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=31).contains(&self.window_days) {
            return Err(CoreError::InvalidConfig(format!(
                "window_days must be between 1 and 31, got {}",
                self.window_days
            )));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(CoreError::InvalidConfig(format!(
                "utc_offset_hours must be between -12 and 14, got {}",
                self.utc_offset_hours
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "fetch_timeout_secs must be positive".to_string(),
            ));
        }
        if self.shops.is_empty() {
            return Err(CoreError::InvalidConfig("no shops configured".to_string()));
        }
        for (i, shop) in self.shops.iter().enumerate() {
            if self.shops[..i].iter().any(|other| other.id.matches(&shop.id)) {
                return Err(CoreError::InvalidConfig(format!(
                    "duplicate shop id '{}'",
                    shop.id
                )));
            }
            if !(shop.base_url.starts_with("http://") || shop.base_url.starts_with("https://")) {
                return Err(CoreError::InvalidConfig(format!(
                    "shop '{}' base_url must be http(s), got '{}'",
                    shop.id, shop.base_url
                )));
            }
        }
        if let StoreConfig::Rest { url, api_key, .. } = &self.store {
            if url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                return Err(CoreError::MissingCredentials("store url"));
            }
            if api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(CoreError::MissingCredentials("store api_key"));
            }
        }
        Ok(())
    }

    /// The fixed source timezone.
    pub fn source_offset(&self) -> Result<FixedOffset, CoreError> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            CoreError::InvalidConfig(format!(
                "utc_offset_hours {} is not a valid offset",
                self.utc_offset_hours
            ))
        })
    }

    /// Calendar date of `now` in the source timezone.
    pub fn today(&self, now: DateTime<Utc>) -> Result<NaiveDate, CoreError> {
        Ok(now.with_timezone(&self.source_offset()?).date_naive())
    }

    /// Choose the shops for a run.
    ///
    /// `ids` wins over `group`; neither selects every configured shop. Groups
    /// are 1-based slices of [`SHOPS_PER_GROUP`] shops in configuration order.
    pub fn select_shops(&self, ids: &[String], group: Option<usize>) -> Result<Vec<Shop>, CoreError> {
        if !ids.is_empty() {
            return ids
                .iter()
                .map(|raw| {
                    let wanted = ShopId::from(raw.as_str());
                    self.shops
                        .iter()
                        .find(|shop| shop.id.matches(&wanted))
                        .cloned()
                        .ok_or_else(|| CoreError::UnknownShop(format!("shop id '{raw}'")))
                })
                .collect();
        }
        match group {
            None => Ok(self.shops.clone()),
            Some(n) => {
                let start = n.checked_sub(1).map(|i| i * SHOPS_PER_GROUP);
                match start {
                    Some(start) if start < self.shops.len() => {
                        let end = (start + SHOPS_PER_GROUP).min(self.shops.len());
                        Ok(self.shops[start..end].to_vec())
                    }
                    _ => Err(CoreError::UnknownShop(format!("group {n}"))),
                }
            }
        }
    }
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
