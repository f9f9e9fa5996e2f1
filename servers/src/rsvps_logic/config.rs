use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use lib_rsvps::configs::settings::{
    AllowlistSettings, CacheSettings, ConfigError, MeetupSettings, RsvpsSettings,
    DEFAULT_MAX_SOURCE_BYTES,
};
use lib_rsvps::meetup::MEETUP_API_BASE;
use lib_rsvps::{TtlMapping, TtlPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "server_rsvps.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Aggregates meetup.com RSVPs for allow-listed events", version)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[clap(long, env = "RSVPS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "RSVPS_HTTP_ADDR", help = "Address to listen on for HTTP requests.")]
    pub http_addr: Option<String>,

    #[clap(long, env = "RSVPS_MEETUP_API_KEY", help = "meetup.com API key.")]
    pub meetup_api_key: Option<String>,

    #[clap(long, env = "RSVPS_MEETUP_API_BASE", help = "meetup.com API root URL.")]
    pub meetup_api_base: Option<String>,

    #[clap(
        long = "whitelist-url",
        env = "RSVPS_WHITELIST_URLS",
        value_delimiter = ',',
        help = "Allow-list source URL, one event URL per line. Repeatable."
    )]
    pub whitelist_urls: Option<Vec<String>>,

    #[clap(long, env = "RSVPS_WHITELIST_UPDATE_INTERVAL_SECONDS", help = "Seconds between allow-list refreshes.")]
    pub whitelist_update_interval_seconds: Option<u64>,

    #[clap(long, env = "RSVPS_WHITELIST_FETCH_TIMEOUT_SECONDS", help = "Timeout in seconds for each allow-list source.")]
    pub whitelist_fetch_timeout_seconds: Option<u64>,

    #[clap(
        long = "allowed-origin",
        env = "RSVPS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        help = "Origin allowed to call the API from a browser. Repeatable."
    )]
    pub allowed_origins: Option<Vec<String>>,

    #[clap(long, env = "RSVPS_CACHE_DURATION_UPCOMING_SECONDS", help = "The \"upcoming\" cache duration in seconds.")]
    pub cache_duration_upcoming_seconds: Option<u64>,

    #[clap(long, env = "RSVPS_CACHE_DURATION_PAST_SECONDS", help = "The \"past\" cache duration in seconds.")]
    pub cache_duration_past_seconds: Option<u64>,

    #[clap(long, env = "RSVPS_CACHE_TTL_MAPPING", help = "How cache durations map to event states: by-name or transposed.")]
    pub cache_ttl_mapping: Option<String>,

    #[clap(long, env = "RSVPS_CACHE_CAPACITY", help = "Maximum number of cached events.")]
    pub cache_capacity: Option<usize>,

    #[clap(long, env = "RSVPS_UPSTREAM_TIMEOUT_SECONDS", help = "Timeout in seconds for each meetup.com read.")]
    pub upstream_timeout_seconds: Option<u64>,

    #[clap(long, env = "RSVPS_UPSTREAM_MAX_RETRIES", help = "Retries of transient HTTP failures.")]
    pub upstream_max_retries: Option<u32>,

    #[clap(long, env = "RSVPS_REQUEST_TIMEOUT_SECONDS", help = "Deadline in seconds for one query request.")]
    pub request_timeout_seconds: Option<u64>,

    #[clap(long, env = "RSVPS_LOG_DIR", help = "Directory for log files. Stdout only when unset.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "RSVPS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(
        long,
        env = "RSVPS_VERBOSE",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Log at debug level."
    )]
    pub verbose: Option<bool>,
}

/// Settings owned by the HTTP layer rather than the library.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub http_addr: SocketAddr,
    pub allowed_origins: Vec<HeaderValue>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            http_addr: other.http_addr.or(self.http_addr),
            meetup_api_key: other.meetup_api_key.or(self.meetup_api_key),
            meetup_api_base: other.meetup_api_base.or(self.meetup_api_base),
            whitelist_urls: other.whitelist_urls.or(self.whitelist_urls),
            whitelist_update_interval_seconds: other
                .whitelist_update_interval_seconds
                .or(self.whitelist_update_interval_seconds),
            whitelist_fetch_timeout_seconds: other
                .whitelist_fetch_timeout_seconds
                .or(self.whitelist_fetch_timeout_seconds),
            allowed_origins: other.allowed_origins.or(self.allowed_origins),
            cache_duration_upcoming_seconds: other
                .cache_duration_upcoming_seconds
                .or(self.cache_duration_upcoming_seconds),
            cache_duration_past_seconds: other.cache_duration_past_seconds.or(self.cache_duration_past_seconds),
            cache_ttl_mapping: other.cache_ttl_mapping.or(self.cache_ttl_mapping),
            cache_capacity: other.cache_capacity.or(self.cache_capacity),
            upstream_timeout_seconds: other.upstream_timeout_seconds.or(self.upstream_timeout_seconds),
            upstream_max_retries: other.upstream_max_retries.or(self.upstream_max_retries),
            request_timeout_seconds: other.request_timeout_seconds.or(self.request_timeout_seconds),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            verbose: other.verbose.or(self.verbose),
        }
    }

    fn defaults() -> Config {
        Config {
            http_addr: Some("127.0.0.1:8080".to_string()),
            meetup_api_base: Some(MEETUP_API_BASE.to_string()),
            whitelist_update_interval_seconds: Some(600),
            whitelist_fetch_timeout_seconds: Some(5),
            cache_duration_upcoming_seconds: Some(600),
            cache_duration_past_seconds: Some(7200),
            cache_ttl_mapping: Some(TtlMapping::ByName.to_string()),
            cache_capacity: Some(1000),
            upstream_timeout_seconds: Some(2),
            upstream_max_retries: Some(2),
            request_timeout_seconds: Some(10),
            log_level: Some("info".to_string()),
            verbose: Some(false),
            ..Default::default()
        }
    }

    /// Level handed to the log filter; `--verbose` forces debug.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose.unwrap_or(false) {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or("info")
        }
    }

    /// Converts the merged layers into validated library and server settings.
    pub fn into_settings(self) -> Result<(RsvpsSettings, ServerSettings), ConfigError> {
        let defaults = Config::defaults();
        let cfg = defaults.merge(self);

        let mapping: TtlMapping = cfg.cache_ttl_mapping.as_deref().unwrap_or("by-name").parse()?;
        let secs = |value: Option<u64>| Duration::from_secs(value.unwrap_or(0));
        let retries = cfg.upstream_max_retries.unwrap_or(0);

        let settings = RsvpsSettings {
            meetup: MeetupSettings {
                api_base: cfg.meetup_api_base.unwrap_or_else(|| MEETUP_API_BASE.to_string()),
                api_key: cfg.meetup_api_key.unwrap_or_default(),
                timeout: secs(cfg.upstream_timeout_seconds),
                max_retries: retries,
            },
            allowlist: AllowlistSettings {
                source_urls: cfg.whitelist_urls.unwrap_or_default(),
                refresh_interval: secs(cfg.whitelist_update_interval_seconds),
                fetch_timeout: secs(cfg.whitelist_fetch_timeout_seconds),
                max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
                max_retries: retries,
            },
            cache: CacheSettings {
                capacity: cfg.cache_capacity.unwrap_or(0),
                ttl: TtlPolicy::from_configured(
                    secs(cfg.cache_duration_upcoming_seconds),
                    secs(cfg.cache_duration_past_seconds),
                    mapping,
                ),
            },
            request_timeout: secs(cfg.request_timeout_seconds),
        }
        .validate()?;

        let addr = cfg.http_addr.unwrap_or_default();
        let http_addr = addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidListenAddress(addr.clone()))?;

        let allowed_origins = cfg
            .allowed_origins
            .unwrap_or_default()
            .into_iter()
            .map(|origin| HeaderValue::from_str(&origin).map_err(|_| ConfigError::InvalidOrigin(origin)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((
            settings,
            ServerSettings {
                http_addr,
                allowed_origins,
            },
        ))
    }
}

/// Reads the optional JSON config file. A missing file is not an error.
fn read_config_file(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let file_config = serde_json::from_str::<Config>(&raw)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(Some(file_config))
}

/// Layers defaults, the config file and environment/CLI (highest wins).
pub fn resolve_config(cli: Config) -> Result<Config> {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path)? {
        current_config = current_config.merge(file_config);
    }

    Ok(current_config.merge(cli))
}

pub fn load_config() -> Result<Config> {
    resolve_config(Config::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Config {
        let mut argv = vec!["server_rsvps"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn repeatable_flags_collect() {
        let config = cli(&[
            "--meetup-api-key",
            "k",
            "--whitelist-url",
            "https://a.example/list.txt",
            "--whitelist-url",
            "https://b.example/list.txt",
            "--verbose",
        ]);
        assert_eq!(
            config.whitelist_urls.as_deref(),
            Some(&["https://a.example/list.txt".to_string(), "https://b.example/list.txt".to_string()][..])
        );
        assert_eq!(config.verbose, Some(true));
        assert_eq!(config.effective_log_level(), "debug");
    }

    #[test]
    fn file_values_sit_between_defaults_and_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"meetupApiKey": "from-file", "cacheCapacity": 50, "whitelistUrls": ["https://a.example/l.txt"], "httpAddr": "0.0.0.0:9000"}}"#
        )
        .unwrap();

        let mut args = cli(&["--http-addr", "127.0.0.1:7000"]);
        args.config_path = Some(file.path().to_path_buf());
        let config = resolve_config(args).unwrap();

        assert_eq!(config.meetup_api_key.as_deref(), Some("from-file"));
        assert_eq!(config.cache_capacity, Some(50));
        assert_eq!(config.http_addr.as_deref(), Some("127.0.0.1:7000"));
        assert_eq!(config.cache_duration_past_seconds, Some(7200));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let mut args = cli(&[]);
        args.config_path = Some(file.path().to_path_buf());
        assert!(resolve_config(args).is_err());
    }

    #[test]
    fn into_settings_applies_defaults() {
        let config = cli(&[
            "--meetup-api-key",
            "k",
            "--whitelist-url",
            "https://a.example/list.txt",
            "--allowed-origin",
            "https://rsvps.example",
        ]);
        let (settings, server) = config.into_settings().unwrap();

        assert_eq!(settings.allowlist.refresh_interval, Duration::from_secs(600));
        assert_eq!(settings.cache.capacity, 1000);
        assert_eq!(settings.cache.ttl.upcoming(), Duration::from_secs(600));
        assert_eq!(settings.cache.ttl.past(), Duration::from_secs(7200));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(server.http_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(server.allowed_origins, vec![HeaderValue::from_static("https://rsvps.example")]);
    }

    #[test]
    fn into_settings_honours_transposed_mapping() {
        let config = cli(&[
            "--meetup-api-key",
            "k",
            "--whitelist-url",
            "https://a.example/list.txt",
            "--cache-ttl-mapping",
            "transposed",
        ]);
        let (settings, _) = config.into_settings().unwrap();
        assert_eq!(settings.cache.ttl.upcoming(), Duration::from_secs(7200));
        assert_eq!(settings.cache.ttl.past(), Duration::from_secs(600));
    }

    #[test]
    fn into_settings_rejects_bad_values() {
        let base = ["--meetup-api-key", "k", "--whitelist-url", "https://a.example/list.txt"];

        let mut args = base.to_vec();
        args.extend(["--http-addr", "localhost"]);
        assert_eq!(
            cli(&args).into_settings().unwrap_err(),
            ConfigError::InvalidListenAddress("localhost".into())
        );

        let mut args = base.to_vec();
        args.extend(["--cache-ttl-mapping", "sideways"]);
        assert!(matches!(
            cli(&args).into_settings().unwrap_err(),
            ConfigError::UnknownTtlMapping(_)
        ));

        assert_eq!(
            cli(&["--meetup-api-key", "k"]).into_settings().unwrap_err(),
            ConfigError::NoAllowlistSources
        );

        let mut args = base.to_vec();
        args.extend(["--allowed-origin", "https://a.example\n"]);
        assert_eq!(
            cli(&args).into_settings().unwrap_err(),
            ConfigError::InvalidOrigin("https://a.example\n".into())
        );
    }

    #[test]
    fn into_settings_keeps_wildcard_origin() {
        let config = cli(&[
            "--meetup-api-key",
            "k",
            "--whitelist-url",
            "https://a.example/list.txt",
            "--allowed-origin",
            "*",
        ]);
        let (_, server) = config.into_settings().unwrap();
        assert_eq!(server.allowed_origins, vec![HeaderValue::from_static("*")]);
    }
}
