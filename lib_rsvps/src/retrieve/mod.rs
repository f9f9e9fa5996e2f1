//! # Data Retrieval Module
//!
//! Shared HTTP plumbing for everything that talks to the outside world: the
//! meetup.com client and the allow-list source fetcher both go through the
//! same `ApiClient`, so retries, auth headers, size limits and deadlines are
//! handled in one place.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: a `reqwest` + `reqwest-middleware` client with exponential
//!   backoff retries, JSON and size-bounded text reads, and the deadline
//!   helpers used to compose per-operation timeouts with request deadlines.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;

pub use ky_http::{effective_deadline, ApiClient, HttpError};
