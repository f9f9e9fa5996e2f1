//! # Configuration Modules
//!
//! Typed, validated settings for every component. The server crate owns the
//! raw layers (defaults, config file, environment, CLI) and converts the
//! merged result into [`RsvpsSettings`] once at startup.

/// Validated settings and their errors.
pub mod settings;

pub use settings::{AllowlistSettings, CacheSettings, ConfigError, MeetupSettings, RsvpsSettings};
