//! # lib_rsvps
//!
//! Building blocks for the RSVP aggregation service: an allow-list of event
//! references refreshed from remote text sources, a bounded result cache with
//! lifecycle-dependent expiry, a meetup.com client, and the aggregator that
//! folds per-event RSVPs into a deduplicated summary.
//!
//! The `servers` crate wires these together behind an HTTP endpoint.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod aggregate;
pub mod allowlist;
pub mod cache;
pub mod configs;
pub mod meetup;
pub mod retrieve;

#[cfg(test)]
mod test_support;

// Re-export the types most callers need.
pub use aggregate::{BatchContext, BatchError, BatchOutcome, RsvpAggregator, Summary};
pub use allowlist::{AllowlistRefresher, AllowlistStore, HttpSourceFetcher};
pub use cache::{ResultCache, TtlMapping, TtlPolicy};
pub use configs::{ConfigError, RsvpsSettings};
pub use meetup::{EventRecord, MeetupClient};
