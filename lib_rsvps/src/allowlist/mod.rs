//! # Allow-list
//!
//! The set of event references the service is willing to resolve. It is
//! loaded from one or more plain-text sources (one reference per line),
//! installed as an immutable snapshot and replaced wholesale on every
//! successful refresh.
//!
//! - **`source`**: fetching and parsing of the text sources.
//! - **`store`**: the snapshot holder queried on every request.
//! - **`refresher`**: the background task that keeps the snapshot current.

/// Background refresh loop.
pub mod refresher;
/// Source fetching and line parsing.
pub mod source;
/// Snapshot store.
pub mod store;

pub use refresher::AllowlistRefresher;
pub use source::{parse_entries, HttpSourceFetcher, SourceFetcher};
pub use store::{AllowlistStore, RefreshError};
