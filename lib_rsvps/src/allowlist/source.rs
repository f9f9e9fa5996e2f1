use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::configs::AllowlistSettings;
use crate::retrieve::ky_http::{effective_deadline, ApiClient, HttpError};

/// Fetches the raw text of one allow-list source.
pub trait SourceFetcher: Send + Sync {
    /// Returns the body of `url`, giving up at `deadline`.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        deadline: Option<Instant>,
    ) -> BoxFuture<'a, Result<String, HttpError>>;
}

/// [`SourceFetcher`] over plain HTTP(S) GETs with a bounded body.
pub struct HttpSourceFetcher {
    api: ApiClient,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpSourceFetcher {
    /// Builds a fetcher from the allow-list settings.
    pub fn new(settings: &AllowlistSettings) -> Result<Self, HttpError> {
        Ok(Self {
            api: ApiClient::new(None, None, settings.max_retries)?,
            timeout: settings.fetch_timeout,
            max_bytes: settings.max_source_bytes,
        })
    }

    async fn fetch_text(&self, url: &str, deadline: Option<Instant>) -> Result<String, HttpError> {
        let body = self
            .api
            .get_text_limited(url, self.max_bytes, effective_deadline(self.timeout, deadline))
            .await?;

        if body.truncated {
            warn!(url, limit = self.max_bytes, "allow-list source exceeds size limit, truncated");
        }
        Ok(body.text)
    }
}

impl SourceFetcher for HttpSourceFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        deadline: Option<Instant>,
    ) -> BoxFuture<'a, Result<String, HttpError>> {
        self.fetch_text(url, deadline).boxed()
    }
}

/// Splits a source body into entries: one per line, trimmed, blanks dropped.
pub fn parse_entries(body: &str) -> HashSet<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
