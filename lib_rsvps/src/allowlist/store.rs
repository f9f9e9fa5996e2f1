use futures_util::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use super::source::{parse_entries, SourceFetcher};
use crate::retrieve::ky_http::HttpError;

/// Why a refresh did not install a new snapshot.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// One source could not be fetched; the refresh was abandoned.
    #[error("failed to fetch allow-list source {url}: {source}")]
    Source {
        /// The failing source.
        url: String,
        /// Underlying HTTP failure.
        #[source]
        source: HttpError,
    },

    /// The refresh was interrupted by shutdown.
    #[error("allow-list refresh cancelled")]
    Cancelled,
}

/// Holds the current allow-list snapshot.
///
/// Readers clone an `Arc` to the immutable set under a short read lock, so
/// lookups never wait on the network. A refresh builds the next set off to
/// the side and swaps the pointer in one write.
pub struct AllowlistStore {
    sources: Vec<String>,
    fetcher: Arc<dyn SourceFetcher>,
    snapshot: RwLock<Arc<HashSet<String>>>,
    refresh_gate: Mutex<()>,
}

impl AllowlistStore {
    /// Creates an empty store over `sources`. Nothing is fetched until
    /// [`AllowlistStore::refresh`] runs.
    pub fn new(sources: Vec<String>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            sources,
            fetcher,
            snapshot: RwLock::new(Arc::new(HashSet::new())),
            refresh_gate: Mutex::new(()),
        }
    }

    /// `true` when `reference` is in the current snapshot. Exact string match.
    pub async fn contains(&self, reference: &str) -> bool {
        self.snapshot.read().await.contains(reference)
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<HashSet<String>> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// `true` while no entries are installed.
    pub async fn is_empty(&self) -> bool {
        self.snapshot.read().await.is_empty()
    }

    /// Fetches every source and installs their union as the new snapshot.
    ///
    /// All sources are fetched concurrently. If any of them fails the
    /// installed snapshot stays as it was. Returns the size of the new
    /// snapshot.
    pub async fn refresh(&self, deadline: Option<Instant>) -> Result<usize, RefreshError> {
        let _gate = self.refresh_gate.lock().await;

        let fetches = self.sources.iter().map(|url| async move {
            self.fetcher
                .fetch(url, deadline)
                .await
                .map(|body| (url.as_str(), body))
                .map_err(|source| RefreshError::Source {
                    url: url.clone(),
                    source,
                })
        });
        let bodies = try_join_all(fetches).await?;

        let mut candidate = HashSet::new();
        for (url, body) in bodies {
            let entries = parse_entries(&body);
            debug!(url, entries = entries.len(), "fetched allow-list source");
            candidate.extend(entries);
        }

        let size = candidate.len();
        *self.snapshot.write().await = Arc::new(candidate);
        info!(entries = size, sources = self.sources.len(), "allow-list updated");
        Ok(size)
    }
}
