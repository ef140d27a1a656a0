//! Error types for roster-sync.

use std::path::PathBuf;

use thiserror::Error;

use roster_core::CoreError;

/// Failures talking to a shift store. Outside of startup these are per-key:
/// the driver logs them and moves on to the next observation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection, DNS, TLS or timeout failure against the REST store.
    #[error("store request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// The REST store answered with a non-2xx status.
    #[error("store returned HTTP {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The REST store's response body was not the expected JSON.
    #[error("unreadable store response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored row holds a value this system cannot interpret.
    #[error("stored row {key} is unreadable: {detail}")]
    Corrupt { key: String, detail: String },
}

/// All errors that can arise from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store failed its startup ping; nothing was processed.
    #[error("{backend} store is unavailable: {source}")]
    StoreUnavailable {
        backend: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
