use lib_rsvps::{ResultCache, RsvpAggregator};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<RsvpAggregator>,
    pub request_timeout: Duration,
    /// Each batch runs under a child of this token.
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(aggregator: Arc<RsvpAggregator>, request_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            aggregator,
            request_timeout,
            cancel,
        }
    }
}

/// Periodically drops expired cache entries so they stop occupying slots
/// that fresh records could use.
pub fn spawn_cache_janitor(
    cache: Arc<ResultCache>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let purged = cache.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "dropped expired cache entries");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_rsvps::EventRecord;
    use lib_rsvps::cache::CacheKey;

    #[tokio::test(start_paused = true)]
    async fn janitor_purges_until_cancelled() {
        let cache = Arc::new(ResultCache::with_capacity(4).unwrap());
        cache
            .put(CacheKey::meetup("g", "1"), Arc::new(EventRecord::default()), Duration::from_secs(5))
            .await;
        let cancel = CancellationToken::new();
        let handle = spawn_cache_janitor(cache.clone(), Duration::from_secs(10), cancel.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(cache.len().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
