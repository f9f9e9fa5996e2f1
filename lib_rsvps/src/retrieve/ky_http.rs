//! # HTTP Retrieval Utilities
//!
//! This module provides a robust, asynchronous API client wrapper around `reqwest`.
//! It includes middleware support for exponential backoff retries, standardized
//! JSON response handling, size-bounded text reads and deadline enforcement.
//!
//! Every read takes an absolute `tokio::time::Instant` deadline. Callers build
//! it with [`effective_deadline`], which composes a fixed per-operation timeout
//! with an optional inherited deadline (the earlier of the two wins).

use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};

/// Errors produced by [`ApiClient`] reads.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying `reqwest` client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection, TLS or middleware failure (after retries).
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Target URL.
        url: String,
        /// Middleware or transport error.
        #[source]
        source: reqwest_middleware::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("{url} returned status {status}: {body}")]
    Status {
        /// Target URL.
        url: String,
        /// Numeric HTTP status.
        status: u16,
        /// Error body, possibly empty.
        body: String,
    },

    /// The body could not be read or deserialized.
    #[error("failed to read body from {url}: {source}")]
    Body {
        /// Target URL.
        url: String,
        /// Read or decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The deadline passed before the read completed.
    #[error("request to {0} timed out")]
    Timeout(String),
}

/// A text body read with an upper size bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitedBody {
    /// Body decoded as UTF-8 (lossy).
    pub text: String,
    /// `true` when the server sent more than the limit and the rest was dropped.
    pub truncated: bool,
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles an optional base URL,
/// bearer authentication and automatic retries of transient failures.
#[derive(Clone)]
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL relative paths are joined to. `None` means every path is absolute.
    base_url: Option<Url>,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a new `ApiClient` with an exponential backoff retry policy.
    ///
    /// # Arguments
    /// * `base_url` - Absolute base URL (e.g. `"https://api.meetup.com/"`), or `None`
    ///   when callers always pass absolute URLs.
    /// * `auth_token` - Optional value for the `Authorization: Bearer` header.
    /// * `max_retries` - Retries for transient failures; `0` disables retrying.
    pub fn new(
        base_url: Option<&str>,
        auth_token: Option<String>,
        max_retries: u32,
    ) -> Result<Self, HttpError> {
        let base_url = base_url.map(Url::parse).transpose()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = reqwest::Client::builder()
            .user_agent(concat!("rsvps/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HttpError::Client)?;

        let inner = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner,
            base_url,
            auth_token,
        })
    }

    /// Joins `path` onto the base URL, or parses it as absolute when no base is set.
    pub fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        match &self.base_url {
            Some(base) => Ok(base.join(path)?),
            None => Ok(Url::parse(path)?),
        }
    }

    /// GETs `path` and deserializes the JSON body into `T`.
    ///
    /// # Errors
    /// Non-2xx responses become [`HttpError::Status`]; an elapsed `deadline`
    /// becomes [`HttpError::Timeout`].
    pub async fn get_json<T>(&self, path: &str, deadline: Instant) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        let label = url.to_string();

        let read = async {
            let response = self.send_get(url).await?;
            response.json::<T>().await.map_err(|source| HttpError::Body {
                url: label.clone(),
                source,
            })
        };

        let outcome = timeout_at(deadline, read).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout(label)),
        }
    }

    /// GETs `path` and returns at most `limit` bytes of its body as text.
    ///
    /// The body is consumed chunk by chunk so an oversized response never
    /// occupies more than `limit` bytes of memory.
    pub async fn get_text_limited(
        &self,
        path: &str,
        limit: usize,
        deadline: Instant,
    ) -> Result<LimitedBody, HttpError> {
        let url = self.resolve(path)?;
        let label = url.to_string();

        let read = async {
            let mut response = self.send_get(url).await?;
            let mut buf: Vec<u8> = Vec::new();
            let mut truncated = false;

            while let Some(chunk) = response.chunk().await.map_err(|source| HttpError::Body {
                url: label.clone(),
                source,
            })? {
                let room = limit.saturating_sub(buf.len());
                if chunk.len() > room {
                    buf.extend_from_slice(&chunk[..room]);
                    truncated = true;
                    break;
                }
                buf.extend_from_slice(&chunk);
            }

            Ok::<_, HttpError>(LimitedBody {
                text: String::from_utf8_lossy(&buf).into_owned(),
                truncated,
            })
        };

        let outcome = timeout_at(deadline, read).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout(label)),
        }
    }

    fn request(&self, url: Url) -> RequestBuilder {
        let mut req = self.inner.get(url);
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        req
    }

    async fn send_get(&self, url: Url) -> Result<reqwest::Response, HttpError> {
        let label = url.to_string();
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|source| HttpError::Transport {
                url: label.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Capture the error body as a string for debugging
        let body = response.text().await.unwrap_or_default();
        Err(HttpError::Status {
            url: label,
            status: status.as_u16(),
            body,
        })
    }
}

/// Deadline for one external operation: `now + per_op`, tightened to `parent`
/// when the caller already runs under an earlier deadline.
pub fn effective_deadline(per_op: Duration, parent: Option<Instant>) -> Instant {
    let own = Instant::now() + per_op;
    match parent {
        Some(parent) => own.min(parent),
        None => own,
    }
}
