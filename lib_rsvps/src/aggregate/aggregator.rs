//! # Batch Resolver
//!
//! For every reference in a batch: parse it, check it against the allow-list,
//! serve it from the cache or fetch it upstream, then fold it into the
//! response and the [`Summary`].
//!
//! Invalid and non-allow-listed references are skipped and counted in
//! [`SkipStats`]. A failed upstream fetch fails the whole batch, so callers
//! never see partial results.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::summary::Summary;
use crate::allowlist::AllowlistStore;
use crate::cache::{CacheKey, ResultCache, TtlPolicy};
use crate::meetup::client::{EventSource, UpstreamError};
use crate::meetup::model::EventRecord;
use crate::meetup::url::parse_event_url;

/// Why a batch produced no result.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Fetching one event failed.
    #[error("failed to fetch rsvps for {reference}: {source}")]
    Upstream {
        /// The reference being resolved.
        reference: String,
        /// Underlying failure.
        #[source]
        source: UpstreamError,
    },

    /// The caller went away.
    #[error("batch cancelled")]
    Cancelled,

    /// The batch deadline passed.
    #[error("batch deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline and cancellation for one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl BatchContext {
    /// No deadline, never cancelled unless [`BatchContext::cancel_token`] is used.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token, usually with a child of a
    /// server-wide one.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token observed by the batch.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails when the batch was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), BatchError> {
        if self.cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }
        if self.expired() {
            return Err(BatchError::DeadlineExceeded);
        }
        Ok(())
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// References skipped while resolving a batch. Logged, never serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipStats {
    /// References that are not meetup.com event URLs.
    pub unparseable: usize,
    /// Valid references missing from the allow-list.
    pub not_allowed: usize,
}

impl SkipStats {
    /// Total skipped references.
    pub fn total(&self) -> usize {
        self.unparseable + self.not_allowed
    }
}

/// One resolved event in the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRsvp {
    /// The reference as the caller sent it.
    #[serde(rename = "eventURL")]
    pub event_url: String,
    /// The event's RSVP record.
    pub rsvp: Arc<EventRecord>,
}

/// Result of a successful batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Resolved events keyed by the caller's reference.
    pub meetups: BTreeMap<String, EventRsvp>,
    /// Cross-event attendance.
    pub summary: Summary,
    /// What was left out and why.
    #[serde(skip)]
    pub skipped: SkipStats,
}

/// Resolves batches of event references.
pub struct RsvpAggregator {
    source: Arc<dyn EventSource>,
    allowlist: Arc<AllowlistStore>,
    cache: Arc<ResultCache>,
    ttl: TtlPolicy,
}

impl RsvpAggregator {
    /// Wires the aggregator to its collaborators.
    pub fn new(
        source: Arc<dyn EventSource>,
        allowlist: Arc<AllowlistStore>,
        cache: Arc<ResultCache>,
        ttl: TtlPolicy,
    ) -> Self {
        Self {
            source,
            allowlist,
            cache,
            ttl,
        }
    }

    /// Resolves `references` in order.
    pub async fn resolve_batch(
        &self,
        references: &[String],
        ctx: &BatchContext,
    ) -> Result<BatchOutcome, BatchError> {
        let mut outcome = BatchOutcome::default();

        for reference in references {
            ctx.check()?;

            let event = match parse_event_url(reference) {
                Ok(event) => event,
                Err(e) => {
                    debug!(reference = %reference, error = %e, "skipping unparseable reference");
                    outcome.skipped.unparseable += 1;
                    continue;
                }
            };

            if !self.allowlist.contains(reference).await {
                warn!(reference = %reference, "reference is not on the allow-list");
                outcome.skipped.not_allowed += 1;
                continue;
            }

            let key = CacheKey::meetup(&event.group, &event.event_id);
            let record = self.lookup_or_fetch(reference, key, ctx).await?;

            outcome.summary.absorb(&record);
            outcome.meetups.insert(
                reference.clone(),
                EventRsvp {
                    event_url: reference.clone(),
                    rsvp: record,
                },
            );
        }

        debug!(
            requested = references.len(),
            resolved = outcome.meetups.len(),
            skipped = outcome.skipped.total(),
            "batch resolved"
        );
        Ok(outcome)
    }

    async fn lookup_or_fetch(
        &self,
        reference: &str,
        key: CacheKey,
        ctx: &BatchContext,
    ) -> Result<Arc<EventRecord>, BatchError> {
        if let Some(record) = self.cache.get(&key).await {
            debug!(key = %key, "cache hit");
            return Ok(record);
        }

        let fetched = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(BatchError::Cancelled),
            result = self.source.fetch_event_record(key.group(), key.event_id(), ctx.deadline) => result,
        };

        let record = match fetched {
            Ok(record) => Arc::new(record),
            Err(_) if ctx.expired() => return Err(BatchError::DeadlineExceeded),
            Err(source) => {
                return Err(BatchError::Upstream {
                    reference: reference.to_string(),
                    source,
                })
            }
        };

        let ttl = self.ttl.ttl_for(record.lifecycle());
        debug!(key = %key, ttl = ?ttl, "caching fetched record");
        self.cache.put(key, Arc::clone(&record), ttl).await;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, FakeEvents, ScriptedFetcher};

    const LIST: &str = "https://lists.example/allowed.txt";
    const E1: &str = "https://www.meetup.com/graz-rust/events/1/";
    const E2: &str = "https://www.meetup.com/graz-rust/events/2/";
    const HIDDEN: &str = "https://www.meetup.com/graz-rust/events/3/";

    const UPCOMING_TTL: Duration = Duration::from_secs(600);
    const PAST_TTL: Duration = Duration::from_secs(7200);

    struct Fixture {
        events: Arc<FakeEvents>,
        aggregator: RsvpAggregator,
    }

    async fn fixture() -> Fixture {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond(LIST, &format!("{E1}\n{E2}\n"));
        let allowlist = Arc::new(AllowlistStore::new(vec![LIST.into()], fetcher));
        allowlist.refresh(None).await.unwrap();

        let events = Arc::new(FakeEvents::default());
        events.insert("graz-rust", "1", record("upcoming", &[(42, 1), (7, 0)]));
        events.insert("graz-rust", "2", record("past", &[(42, 2), (9, 0)]));
        events.insert("graz-rust", "3", record("upcoming", &[(1, 0)]));

        let aggregator = RsvpAggregator::new(
            events.clone(),
            allowlist,
            Arc::new(ResultCache::with_capacity(16).unwrap()),
            TtlPolicy::new(UPCOMING_TTL, PAST_TTL),
        );
        Fixture { events, aggregator }
    }

    fn batch(refs: &[&str]) -> Vec<String> {
        refs.iter().map(|r| r.to_string()).collect()
    }

    #[tokio::test]
    async fn member_in_two_events_is_summarized_once() {
        let f = fixture().await;
        let outcome = f
            .aggregator
            .resolve_batch(&batch(&[E1, E2]), &BatchContext::new())
            .await
            .unwrap();

        assert_eq!(outcome.meetups.len(), 2);
        assert_eq!(outcome.meetups[E1].rsvp.yes_count, 3);
        assert_eq!(outcome.meetups[E2].rsvp.yes_count, 4);
        assert_eq!(outcome.meetups[E1].event_url, E1);
        assert_eq!(outcome.summary.all_yes_ids, vec!["42", "7", "9"]);
        assert_eq!(outcome.summary.all_yes_guests, 3);
    }

    #[tokio::test]
    async fn skips_unparseable_and_unlisted_references() {
        let f = fixture().await;
        let outcome = f
            .aggregator
            .resolve_batch(
                &batch(&["not a url", "https://example.org/x/events/1/", HIDDEN, E1]),
                &BatchContext::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.meetups.keys().collect::<Vec<_>>(), vec![E1]);
        assert_eq!(
            outcome.skipped,
            SkipStats {
                unparseable: 2,
                not_allowed: 1
            }
        );
        assert_eq!(f.events.calls(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_fails_the_batch() {
        let f = fixture().await;
        let missing = "https://www.meetup.com/graz-rust/events/404/";
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.respond(LIST, &format!("{E1}\n{missing}\n"));
        let allowlist = Arc::new(AllowlistStore::new(vec![LIST.into()], fetcher));
        allowlist.refresh(None).await.unwrap();
        let aggregator = RsvpAggregator::new(
            f.events.clone(),
            allowlist,
            Arc::new(ResultCache::with_capacity(16).unwrap()),
            TtlPolicy::new(UPCOMING_TTL, PAST_TTL),
        );

        let err = aggregator
            .resolve_batch(&batch(&[E1, missing]), &BatchContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Upstream { ref reference, .. } if reference == missing));
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_outcome() {
        let f = fixture().await;
        let outcome = f.aggregator.resolve_batch(&[], &BatchContext::new()).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());

        let outcome = f
            .aggregator
            .resolve_batch(&batch(&["", HIDDEN]), &BatchContext::new())
            .await
            .unwrap();
        assert!(outcome.meetups.is_empty());
        assert_eq!(outcome.summary, Summary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_repeats_until_ttl_for_lifecycle() {
        let f = fixture().await;
        let refs = batch(&[E1, E2]);

        f.aggregator.resolve_batch(&refs, &BatchContext::new()).await.unwrap();
        f.aggregator.resolve_batch(&refs, &BatchContext::new()).await.unwrap();
        assert_eq!(f.events.calls(), 2);

        // the upcoming event expires first, the past one is still cached
        tokio::time::advance(UPCOMING_TTL).await;
        f.aggregator.resolve_batch(&refs, &BatchContext::new()).await.unwrap();
        assert_eq!(f.events.calls(), 3);

        tokio::time::advance(PAST_TTL).await;
        f.aggregator.resolve_batch(&refs, &BatchContext::new()).await.unwrap();
        assert_eq!(f.events.calls(), 5);
    }

    #[tokio::test]
    async fn duplicate_reference_counts_guests_per_occurrence() {
        let f = fixture().await;
        let outcome = f
            .aggregator
            .resolve_batch(&batch(&[E1, E1]), &BatchContext::new())
            .await
            .unwrap();

        assert_eq!(outcome.meetups.len(), 1);
        assert_eq!(outcome.summary.all_yes_ids, vec!["42", "7"]);
        assert_eq!(outcome.summary.all_yes_guests, 2);
        assert_eq!(f.events.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_context_stops_the_batch() {
        let f = fixture().await;
        let ctx = BatchContext::new();
        ctx.cancel_token().cancel();

        let err = f.aggregator.resolve_batch(&batch(&[E1]), &ctx).await.unwrap_err();
        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(f.events.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_stops_the_batch() {
        let f = fixture().await;
        let ctx = BatchContext::with_timeout(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;

        let err = f.aggregator.resolve_batch(&batch(&[E1]), &ctx).await.unwrap_err();
        assert!(matches!(err, BatchError::DeadlineExceeded));
    }
}
