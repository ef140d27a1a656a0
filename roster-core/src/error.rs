//! Error types for roster-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration, directory and domain parsing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The configuration file did not exist at the expected path.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// The member directory did not exist at the expected path.
    #[error("member directory not found at {path}")]
    DirectoryNotFound { path: PathBuf },

    /// A configuration value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The configured store has no usable credentials.
    #[error("missing store credentials: {0}")]
    MissingCredentials(&'static str),

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.roster/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A shop selection referenced an id or group that is not configured.
    #[error("unknown shop selection: {0}")]
    UnknownShop(String),

    /// A time-of-day string was not `H:MM` / `HH:MM`.
    #[error("invalid time of day '{0}'")]
    InvalidTime(String),

    /// A provenance status string was not one of `none`, `official`, `requested`.
    #[error("unknown shift status '{0}'")]
    UnknownStatus(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
