//! # meetup.com Provider
//!
//! Everything that knows about the upstream event provider:
//!
//! - **`url`**: parses caller-supplied event URLs into `(group, event id)`.
//! - **`model`**: wire types for the two API reads and the normalized
//!   [`EventRecord`] they fold into.
//! - **`client`**: the [`MeetupClient`] and the [`EventSource`] seam the
//!   aggregator depends on.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// HTTP client for the two per-event reads.
pub mod client;
/// Provider wire types and the normalized record.
pub mod model;
/// Event reference parsing.
pub mod url;

pub use client::{EventSource, MeetupClient, UpstreamError, MEETUP_API_BASE, PROVIDER_NAMESPACE};
pub use model::{EventRecord, LifecycleState, Member, MeetupEvent, MeetupRsvp, Photo, RsvpResponse};
pub use self::url::{parse_event_url, EventRef, ReferenceError, MEETUP_HOST};
