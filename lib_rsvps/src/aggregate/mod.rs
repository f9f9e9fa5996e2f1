//! # Batch Aggregation
//!
//! Resolves a batch of event references into per-event RSVP records and a
//! summary of everyone attending, counted once across all events.

/// The batch resolver.
pub mod aggregator;
/// Cross-event attendance rollup.
pub mod summary;

pub use aggregator::{BatchContext, BatchError, BatchOutcome, EventRsvp, RsvpAggregator, SkipStats};
pub use summary::{Profile, Summary};
