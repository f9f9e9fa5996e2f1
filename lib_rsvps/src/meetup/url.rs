//! # Event Reference Parsing
//!
//! Callers identify events by their public meetup.com URL, e.g.
//! `https://www.meetup.com/graz-rust/events/123456/`. Only the host
//! `www.meetup.com` is accepted and the path must look like
//! `/{group}/events/{event id}`; anything else is rejected so the aggregator
//! can skip it.

use thiserror::Error;
use url::Url;

/// The only host accepted in event references.
pub const MEETUP_HOST: &str = "www.meetup.com";

/// A parsed event reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventRef {
    /// Group url name, percent-decoded.
    pub group: String,
    /// Event id, percent-decoded.
    pub event_id: String,
}

/// Why a reference could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// Not an absolute URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Host other than [`MEETUP_HOST`].
    #[error("host must be www.meetup.com, got {0:?}")]
    WrongHost(Option<String>),

    /// Path is not `/{group}/events/{event id}`.
    #[error("not an event URL")]
    NotEventUrl,

    /// A path segment did not decode to UTF-8.
    #[error("failed to unescape {what} {raw:?}")]
    Unescape {
        /// Which segment failed.
        what: &'static str,
        /// The raw segment.
        raw: String,
    },
}

/// Parses a meetup.com event URL into its group and event id.
///
/// ```
/// use lib_rsvps::meetup::parse_event_url;
///
/// let event = parse_event_url("https://www.meetup.com/graz-rust/events/123456/").unwrap();
/// assert_eq!(event.group, "graz-rust");
/// assert_eq!(event.event_id, "123456");
/// ```
pub fn parse_event_url(reference: &str) -> Result<EventRef, ReferenceError> {
    let parsed = Url::parse(reference)?;

    if parsed.host_str() != Some(MEETUP_HOST) {
        return Err(ReferenceError::WrongHost(
            parsed.host_str().map(str::to_string),
        ));
    }

    // "/group/events/123/" splits into ["", "group", "events", "123", ""]
    let segments: Vec<&str> = parsed.path().split('/').collect();
    if segments.len() < 4 || segments[2] != "events" {
        return Err(ReferenceError::NotEventUrl);
    }

    let group = unescape(segments[1], "group name")?;
    let event_id = unescape(segments[3], "event id")?;
    if group.is_empty() || event_id.is_empty() {
        return Err(ReferenceError::NotEventUrl);
    }

    Ok(EventRef { group, event_id })
}

fn unescape(raw: &str, what: &'static str) -> Result<String, ReferenceError> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ReferenceError::Unescape {
            what,
            raw: raw.to_string(),
        })
}
