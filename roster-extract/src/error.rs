//! Error types for roster-extract.

use thiserror::Error;

/// Failures fetching a roster page. All of them are per-date recoverable.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, DNS, TLS or timeout failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// Reading the response body failed part-way.
    #[error("reading body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The page came back with no content at all.
    #[error("empty page from {url}")]
    EmptyPage { url: String },
}
