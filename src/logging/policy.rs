//! Log levels, per-call options and rate-limit policy selection.

use std::fmt;
use std::time::Duration;

/// Severity of a node log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// Per-call logging options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogOptions {
    /// Child namespace under the base logger.
    pub logger_child: Option<String>,
    /// Minimum time between emissions from one call site.
    pub throttle_period: Option<Duration>,
    /// Suppress a message identical to the last one from the same call site.
    pub throttle_identical: bool,
    /// Emit only the first time the call site is reached.
    pub once: bool,
}

impl LogOptions {
    pub fn throttle(period: Duration) -> Self {
        Self {
            throttle_period: Some(period),
            ..Self::default()
        }
    }

    pub fn throttle_identical(period: Duration) -> Self {
        Self {
            throttle_period: Some(period),
            throttle_identical: true,
            ..Self::default()
        }
    }

    pub fn once() -> Self {
        Self {
            once: true,
            ..Self::default()
        }
    }

    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.logger_child = Some(name.into());
        self
    }

    /// The single policy these options select.
    pub fn policy(&self) -> RatePolicy {
        if self.once {
            RatePolicy::Once
        } else if self.throttle_identical {
            // Any supplied period counts here, zero included.
            RatePolicy::ThrottleIdentical {
                period: self.throttle_period,
            }
        } else if let Some(period) = self.throttle_period.filter(|p| !p.is_zero()) {
            RatePolicy::Throttle { period }
        } else {
            RatePolicy::Unconditional
        }
    }
}

/// Rate-limit policy, chosen by precedence
/// `Once > ThrottleIdentical > Throttle > Unconditional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePolicy {
    Once,
    ThrottleIdentical { period: Option<Duration> },
    Throttle { period: Duration },
    Unconditional,
}

impl RatePolicy {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            RatePolicy::Once => "once",
            RatePolicy::ThrottleIdentical { .. } => "throttle_identical",
            RatePolicy::Throttle { .. } => "throttle",
            RatePolicy::Unconditional => "unconditional",
        }
    }
}
