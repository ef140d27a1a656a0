//! Roster page fetching.

use std::io::Read;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use roster_core::{Shop, SyncConfig};

use crate::error::ExtractError;

/// Bodies beyond this are truncated; real roster pages are a few hundred KB.
const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

/// Anything that can hand back the roster page of a shop for a date.
pub trait RosterSource {
    fn fetch_page(&self, shop: &Shop, date: NaiveDate) -> Result<String, ExtractError>;
}

/// Fetches pages over HTTP with `ureq`.
pub struct HttpSource {
    agent: ureq::Agent,
    date_param: String,
    cache_bust: bool,
}

impl HttpSource {
    pub fn new(config: &SyncConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        Self {
            agent,
            date_param: config.date_param.clone(),
            cache_bust: config.cache_bust,
        }
    }
}

impl RosterSource for HttpSource {
    fn fetch_page(&self, shop: &Shop, date: NaiveDate) -> Result<String, ExtractError> {
        let bust = self.cache_bust.then(|| Utc::now().timestamp_millis());
        let url = page_url(&shop.base_url, &self.date_param, date, bust);
        tracing::debug!(shop = %shop.id, %url, "fetching roster page");

        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(ExtractError::Status { url, status });
            }
            Err(err) => {
                return Err(ExtractError::Transport {
                    url,
                    source: Box::new(err),
                });
            }
        };

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|source| ExtractError::Body {
                url: url.clone(),
                source,
            })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ExtractError::EmptyPage { url });
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// `base?param=YYYY/MM/DD[&t=millis]`, appending with `&` when `base` already
/// has a query string.
pub fn page_url(base: &str, date_param: &str, date: NaiveDate, cache_bust: Option<i64>) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    let mut url = format!("{base}{sep}{date_param}={}", date.format("%Y/%m/%d"));
    if let Some(millis) = cache_bust {
        url.push_str(&format!("&t={millis}"));
    }
    url
}
