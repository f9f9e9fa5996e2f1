//! # Service Settings
//!
//! Plain data structs with defaults, plus a single [`RsvpsSettings::validate`]
//! pass that turns a half-filled configuration into a typed error before any
//! component is built.

use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cache::ttl::{TtlMapping, TtlPolicy};
use crate::meetup::client::MEETUP_API_BASE;

/// Per-read timeout for meetup.com calls.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);
/// Retries of transient HTTP failures.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Per-source timeout for allow-list fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Allow-list refresh period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// Upper bound of one allow-list source body.
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 1024 * 1024;
/// Result cache entry limit.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
/// Configured "upcoming" cache duration.
pub const DEFAULT_CACHE_DURATION_UPCOMING: Duration = Duration::from_secs(10 * 60);
/// Configured "past" cache duration.
pub const DEFAULT_CACHE_DURATION_PAST: Duration = Duration::from_secs(120 * 60);
/// Deadline for resolving one batch request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration problems detected at startup. All of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The allow-list has nowhere to load from.
    #[error("no URLs specified for the allow-list")]
    NoAllowlistSources,

    /// An allow-list source is not an absolute http(s) URL.
    #[error("invalid allow-list source {url:?}: {reason}")]
    InvalidSourceUrl {
        /// The offending value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No meetup.com credential.
    #[error("no meetup.com API key set")]
    MissingApiKey,

    /// The meetup.com API root is not an absolute http(s) URL.
    #[error("invalid meetup.com API base {0:?}")]
    InvalidApiBase(String),

    /// A count, size or duration that has to be positive is zero.
    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    /// Unknown value for the cache TTL mapping.
    #[error("unknown cache ttl mapping {0:?}, expected \"by-name\" or \"transposed\"")]
    UnknownTtlMapping(String),

    /// The HTTP listen address does not parse as `host:port`.
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),

    /// A CORS origin is not a valid header value.
    #[error("invalid allowed origin {0:?}")]
    InvalidOrigin(String),
}

/// meetup.com client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetupSettings {
    /// API root, normally [`MEETUP_API_BASE`].
    pub api_base: String,
    /// API credential.
    pub api_key: String,
    /// Timeout of each of the two reads.
    pub timeout: Duration,
    /// Retries of transient failures.
    pub max_retries: u32,
}

impl Default for MeetupSettings {
    fn default() -> Self {
        Self {
            api_base: MEETUP_API_BASE.to_string(),
            api_key: String::new(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Allow-list sources and refresh behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistSettings {
    /// Plain-text sources, one reference per line.
    pub source_urls: Vec<String>,
    /// Period of the background refresh.
    pub refresh_interval: Duration,
    /// Timeout of each source fetch.
    pub fetch_timeout: Duration,
    /// Bytes read from one source at most.
    pub max_source_bytes: usize,
    /// Retries of transient failures.
    pub max_retries: u32,
}

impl Default for AllowlistSettings {
    fn default() -> Self {
        Self {
            source_urls: Vec::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Result cache sizing and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of cached events.
    pub capacity: usize,
    /// Lifecycle state to TTL mapping.
    pub ttl: TtlPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: TtlPolicy::from_configured(
                DEFAULT_CACHE_DURATION_UPCOMING,
                DEFAULT_CACHE_DURATION_PAST,
                TtlMapping::ByName,
            ),
        }
    }
}

/// Everything the library components need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RsvpsSettings {
    /// Upstream client.
    pub meetup: MeetupSettings,
    /// Allow-list store and refresher.
    pub allowlist: AllowlistSettings,
    /// Result cache.
    pub cache: CacheSettings,
    /// Deadline applied to each batch request.
    pub request_timeout: Duration,
}

impl RsvpsSettings {
    /// Checks every field once and returns the settings unchanged when valid.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.meetup.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if http_url(&self.meetup.api_base).is_err() {
            return Err(ConfigError::InvalidApiBase(self.meetup.api_base.clone()));
        }

        if self.allowlist.source_urls.is_empty() {
            return Err(ConfigError::NoAllowlistSources);
        }
        for source in &self.allowlist.source_urls {
            http_url(source).map_err(|reason| ConfigError::InvalidSourceUrl {
                url: source.clone(),
                reason,
            })?;
        }

        positive(self.meetup.timeout, "upstream timeout")?;
        positive(self.allowlist.refresh_interval, "allow-list update interval")?;
        positive(self.allowlist.fetch_timeout, "allow-list fetch timeout")?;
        positive(self.request_timeout, "request timeout")?;
        positive(self.cache.ttl.upcoming(), "upcoming cache duration")?;
        positive(self.cache.ttl.past(), "past cache duration")?;

        if self.allowlist.max_source_bytes == 0 {
            return Err(ConfigError::MustBePositive("allow-list source size limit"));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::MustBePositive("cache capacity"));
        }

        Ok(self)
    }
}

fn positive(value: Duration, what: &'static str) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::MustBePositive(what));
    }
    Ok(())
}

fn http_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme {other:?}")),
    }
}
