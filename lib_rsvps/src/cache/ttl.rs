//! # TTL Policy
//!
//! Two durations are configured, one named "upcoming" and one named "past".
//! Attendance of upcoming events still moves, so they normally get the
//! shorter one.
//!
//! Earlier deployments applied them the other way round (past events used
//! the "upcoming" duration). The mapping is therefore explicit:
//! [`TtlMapping::ByName`] is the default and [`TtlMapping::Transposed`]
//! keeps the earlier behaviour.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::configs::ConfigError;
use crate::meetup::model::LifecycleState;

/// How the two configured durations are assigned to lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlMapping {
    /// Upcoming events use the "upcoming" duration, past events the "past" one.
    #[default]
    ByName,
    /// Upcoming events use the "past" duration and vice versa.
    Transposed,
}

impl FromStr for TtlMapping {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "by-name" | "byname" => Ok(Self::ByName),
            "transposed" | "legacy" => Ok(Self::Transposed),
            other => Err(ConfigError::UnknownTtlMapping(other.to_string())),
        }
    }
}

impl fmt::Display for TtlMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByName => f.write_str("by-name"),
            Self::Transposed => f.write_str("transposed"),
        }
    }
}

/// Resolved TTL per lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    upcoming: Duration,
    past: Duration,
}

impl TtlPolicy {
    /// TTLs given directly per state.
    pub fn new(upcoming: Duration, past: Duration) -> Self {
        Self { upcoming, past }
    }

    /// Builds the policy from the two configured durations and a mapping.
    pub fn from_configured(
        upcoming_duration: Duration,
        past_duration: Duration,
        mapping: TtlMapping,
    ) -> Self {
        match mapping {
            TtlMapping::ByName => Self::new(upcoming_duration, past_duration),
            TtlMapping::Transposed => Self::new(past_duration, upcoming_duration),
        }
    }

    /// TTL for records of upcoming events.
    pub fn upcoming(&self) -> Duration {
        self.upcoming
    }

    /// TTL for records of past events.
    pub fn past(&self) -> Duration {
        self.past
    }

    /// TTL for a record in `state`.
    pub fn ttl_for(&self, state: LifecycleState) -> Duration {
        match state {
            LifecycleState::Upcoming => self.upcoming,
            LifecycleState::Past => self.past,
        }
    }
}
