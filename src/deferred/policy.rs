//! Declarative suspend policy.
//!
//! A `{timeout, unit}` record attached to a route. The transport applies it
//! before the handler body runs; the clock only starts on `suspend()`.
//! A programmatic `set_timeout` always overrides it.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Unit for a declared timeout amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit into a [`Duration`], saturating on overflow.
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

/// Timeout declared for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SuspendPolicy {
    /// Amount of `unit`.
    pub timeout: u64,

    /// Unit of `timeout` (default: milliseconds).
    #[serde(default)]
    pub unit: TimeUnit,
}

impl SuspendPolicy {
    pub fn new(timeout: u64, unit: TimeUnit) -> Self {
        Self { timeout, unit }
    }

    pub fn duration(&self) -> Duration {
        self.unit.to_duration(self.timeout)
    }
}
