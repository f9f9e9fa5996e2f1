//! # meetup.com API Client
//!
//! Fetches one event's RSVP state with two reads against `api.meetup.com`:
//! the event metadata and the RSVP list. Both run concurrently, each under its
//! own timeout composed with the caller's deadline, and are folded into an
//! [`EventRecord`]. If either read fails the whole fetch fails; no partial
//! record is ever returned.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use super::model::{EventRecord, MeetupEvent, MeetupRsvp};
use crate::configs::MeetupSettings;
use crate::retrieve::ky_http::{effective_deadline, ApiClient, HttpError};

/// Production API root.
pub const MEETUP_API_BASE: &str = "https://api.meetup.com/";

/// Namespace used in cache keys for records from this provider.
pub const PROVIDER_NAMESPACE: &str = "meetupcom";

/// Failure of an upstream fetch. Any of these fails the caller's batch.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The event metadata read failed.
    #[error("failed to fetch event {group}/{event_id}: {source}")]
    Details {
        /// Group url name.
        group: String,
        /// Event id.
        event_id: String,
        /// Underlying HTTP failure.
        #[source]
        source: HttpError,
    },

    /// The RSVP list read failed.
    #[error("failed to fetch rsvps of {group}/{event_id}: {source}")]
    Rsvps {
        /// Group url name.
        group: String,
        /// Event id.
        event_id: String,
        /// Underlying HTTP failure.
        #[source]
        source: HttpError,
    },

    /// The provider sent an RSVP response outside yes/no/waitlist.
    #[error("unexpected rsvp response {0:?}")]
    UnexpectedResponse(String),

    /// The provider's numbers do not fit the named counter.
    #[error("rsvp {0} count overflows")]
    CountOverflow(&'static str),
}

/// Source of normalized event records.
///
/// The aggregator only depends on this trait, which keeps it independent of
/// the HTTP client.
pub trait EventSource: Send + Sync {
    /// Fetches a fresh record for `group`/`event_id`, giving up at `deadline`.
    fn fetch_event_record<'a>(
        &'a self,
        group: &'a str,
        event_id: &'a str,
        deadline: Option<Instant>,
    ) -> BoxFuture<'a, Result<EventRecord, UpstreamError>>;
}

/// HTTP client for the meetup.com REST API.
pub struct MeetupClient {
    api: ApiClient,
    timeout: Duration,
}

impl MeetupClient {
    /// Builds a client from validated settings. The API key is sent as a
    /// bearer token on every read.
    pub fn new(settings: &MeetupSettings) -> Result<Self, HttpError> {
        let api = ApiClient::new(
            Some(&settings.api_base),
            Some(settings.api_key.clone()),
            settings.max_retries,
        )?;

        Ok(Self {
            api,
            timeout: settings.timeout,
        })
    }

    /// Reads the event metadata.
    pub async fn get_event_details(
        &self,
        group: &str,
        event_id: &str,
        deadline: Option<Instant>,
    ) -> Result<MeetupEvent, HttpError> {
        let path = format!("{}/events/{}", urlencoding::encode(group), urlencoding::encode(event_id));
        self.api
            .get_json(&path, effective_deadline(self.timeout, deadline))
            .await
    }

    /// Reads the RSVP list.
    pub async fn get_rsvps(
        &self,
        group: &str,
        event_id: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<MeetupRsvp>, HttpError> {
        let path = format!(
            "{}/events/{}/rsvps",
            urlencoding::encode(group),
            urlencoding::encode(event_id)
        );
        self.api
            .get_json(&path, effective_deadline(self.timeout, deadline))
            .await
    }

    /// Fetches both reads concurrently and folds them into one record.
    pub async fn get_event_record(
        &self,
        group: &str,
        event_id: &str,
        deadline: Option<Instant>,
    ) -> Result<EventRecord, UpstreamError> {
        let (details, rsvps) = tokio::join!(
            self.get_event_details(group, event_id, deadline),
            self.get_rsvps(group, event_id, deadline),
        );

        let details = details.map_err(|source| UpstreamError::Details {
            group: group.to_string(),
            event_id: event_id.to_string(),
            source,
        })?;
        let rsvps = rsvps.map_err(|source| UpstreamError::Rsvps {
            group: group.to_string(),
            event_id: event_id.to_string(),
            source,
        })?;

        debug!(group, event_id, rsvps = rsvps.len(), "fetched event from meetup.com");
        EventRecord::fold(details, rsvps)
    }
}

impl EventSource for MeetupClient {
    fn fetch_event_record<'a>(
        &'a self,
        group: &'a str,
        event_id: &'a str,
        deadline: Option<Instant>,
    ) -> BoxFuture<'a, Result<EventRecord, UpstreamError>> {
        self.get_event_record(group, event_id, deadline).boxed()
    }
}
