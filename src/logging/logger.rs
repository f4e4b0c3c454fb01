//! The rate-limited logging engine.

use std::sync::Arc;
use std::time::Duration;

use crate::logging::callsite::{CallSite, Fingerprint};
use crate::logging::clock::{Clock, SystemClock};
use crate::logging::filters::{IdenticalTable, OnceSet, ThrottleTable};
use crate::logging::policy::{Level, LogOptions, RatePolicy};
use crate::observability::metrics;

/// Name of the base node logger. Records are emitted under this tracing target.
pub const BASE_LOGGER: &str = "rosout";

/// Applies once / identical / throttle policies to node log records.
///
/// One instance per process, shared through the node context; the policy
/// tables are shared by every call site that logs through it.
pub struct RateLimitedLogger {
    clock: Arc<dyn Clock>,
    throttle: ThrottleTable,
    identical: IdenticalTable,
    once: OnceSet,
}

impl RateLimitedLogger {
    /// Logger on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            throttle: ThrottleTable::default(),
            identical: IdenticalTable::default(),
            once: OnceSet::default(),
        }
    }

    /// Log `message` at `level`, subject to the policy `options` select.
    ///
    /// The call site of the caller is the rate-limit key. Returns whether the
    /// record was emitted.
    #[track_caller]
    pub fn log(&self, level: Level, message: &str, options: &LogOptions) -> bool {
        self.log_at(CallSite::caller(), level, message, options)
    }

    /// Like [`log`](Self::log) with an explicit call site.
    pub fn log_at(&self, site: CallSite, level: Level, message: &str, options: &LogOptions) -> bool {
        let policy = options.policy();
        if self.admit(policy, site.fingerprint(), message) {
            emit(level, options.logger_child.as_deref(), site, message);
            true
        } else {
            metrics::record_log_suppressed(policy.label());
            false
        }
    }

    fn admit(&self, policy: RatePolicy, key: Fingerprint, message: &str) -> bool {
        match policy {
            RatePolicy::Once => self.once.check(key),
            RatePolicy::ThrottleIdentical { period } => {
                // Both checks always run: each records its own state.
                let elapsed = period
                    .map(|period| self.throttle.check(key, period, self.clock.now()))
                    .unwrap_or(false);
                let changed = self.identical.check(key, message);
                changed || elapsed
            }
            RatePolicy::Throttle { period } => self.throttle.check(key, period, self.clock.now()),
            RatePolicy::Unconditional => true,
        }
    }

    /// Number of call sites with a recorded throttle timestamp.
    pub fn throttled_sites(&self) -> usize {
        self.throttle.len()
    }

    /// Number of call sites that have used a once policy.
    pub fn once_sites(&self) -> usize {
        self.once.len()
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedLogger")
            .field("throttled_sites", &self.throttle.len())
            .field("identical_sites", &self.identical.len())
            .field("once_sites", &self.once.len())
            .finish()
    }
}

fn emit(level: Level, child: Option<&str>, site: CallSite, message: &str) {
    let logger = match child {
        Some(child) => format!("{}.{}", BASE_LOGGER, child),
        None => BASE_LOGGER.to_string(),
    };
    match level {
        Level::Debug => tracing::debug!(
            target: "rosout", logger = %logger, file = site.file, line = site.line, "{}", message
        ),
        Level::Info => tracing::info!(
            target: "rosout", logger = %logger, file = site.file, line = site.line, "{}", message
        ),
        Level::Warn => tracing::warn!(
            target: "rosout", logger = %logger, file = site.file, line = site.line, "{}", message
        ),
        Level::Error => tracing::error!(
            target: "rosout", logger = %logger, file = site.file, line = site.line, "{}", message
        ),
        Level::Fatal => tracing::error!(
            target: "rosout", logger = %logger, file = site.file, line = site.line, fatal = true,
            "{}", message
        ),
    }
}

macro_rules! level_wrappers {
    ($level:expr, $plain:ident, $throttle:ident, $identical:ident, $once:ident) => {
        #[track_caller]
        pub fn $plain(&self, message: &str) -> bool {
            self.log($level, message, &LogOptions::default())
        }

        #[track_caller]
        pub fn $throttle(&self, period: Duration, message: &str) -> bool {
            self.log($level, message, &LogOptions::throttle(period))
        }

        #[track_caller]
        pub fn $identical(&self, period: Duration, message: &str) -> bool {
            self.log($level, message, &LogOptions::throttle_identical(period))
        }

        #[track_caller]
        pub fn $once(&self, message: &str) -> bool {
            self.log($level, message, &LogOptions::once())
        }
    };
}

/// Named wrappers, one set per level.
impl RateLimitedLogger {
    level_wrappers!(Level::Debug, debug, debug_throttle, debug_throttle_identical, debug_once);
    level_wrappers!(Level::Info, info, info_throttle, info_throttle_identical, info_once);
    level_wrappers!(Level::Warn, warn, warn_throttle, warn_throttle_identical, warn_once);
    level_wrappers!(Level::Error, error, error_throttle, error_throttle_identical, error_once);
    level_wrappers!(Level::Fatal, fatal, fatal_throttle, fatal_throttle_identical, fatal_once);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::clock::ManualClock;

    fn logger() -> (Arc<ManualClock>, RateLimitedLogger) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000)));
        let logger = RateLimitedLogger::with_clock(clock.clone());
        (clock, logger)
    }

    #[test]
    fn test_unconditional_always_emits() {
        let (_, logger) = logger();
        for _ in 0..3 {
            assert!(logger.info("hello"));
        }
    }

    #[test]
    fn test_throttle_by_call_site() {
        let (clock, logger) = logger();
        let period = Duration::from_secs(1);
        let mut emitted = Vec::new();
        for step in [0, 500, 600] {
            clock.advance(Duration::from_millis(step));
            emitted.push(logger.warn_throttle(period, "throttled"));
        }
        // t=0 emits, t=0.5 suppressed, t=1.1 emits
        assert_eq!(emitted, vec![true, false, true]);
    }

    #[test]
    fn test_different_call_sites_throttle_independently() {
        let (_, logger) = logger();
        let period = Duration::from_secs(60);
        assert!(logger.info_throttle(period, "first site"));
        assert!(logger.info_throttle(period, "second site"));
        assert_eq!(logger.throttled_sites(), 2);
    }

    #[test]
    fn test_throttle_identical() {
        let (_, logger) = logger();
        let period = Duration::from_secs(60);
        let results: Vec<_> = ["a", "a", "b", "b", "a"]
            .iter()
            .map(|msg| logger.error_throttle_identical(period, msg))
            .collect();
        assert_eq!(results, vec![true, false, true, false, true]);
    }

    #[test]
    fn test_throttle_identical_emits_repeat_after_period() {
        let (clock, logger) = logger();
        let period = Duration::from_secs(1);
        let mut results = Vec::new();
        for step in [0, 500, 1_000] {
            clock.advance(Duration::from_millis(step));
            results.push(logger.info_throttle_identical(period, "same"));
        }
        assert_eq!(results, vec![true, false, true]);
    }

    #[test]
    fn test_throttle_identical_zero_period_emits_whenever_time_moves() {
        let (clock, logger) = logger();
        let mut results = Vec::new();
        for _ in 0..3 {
            clock.advance(Duration::from_millis(10));
            results.push(logger.info_throttle_identical(Duration::ZERO, "same"));
        }
        assert_eq!(results, vec![true, true, true]);
    }

    #[test]
    fn test_identical_compares_interpolated_text() {
        let (_, logger) = logger();
        let period = Duration::from_secs(60);
        let results: Vec<_> = [1, 1, 2]
            .iter()
            .map(|n| crate::logwarn_throttle_identical!(logger, period, "retry {}", n))
            .collect();
        assert_eq!(results, vec![true, false, true]);
    }

    #[test]
    fn test_once() {
        let (_, logger) = logger();
        let emitted = (0..5).filter(|_| logger.fatal_once("only once")).count();
        assert_eq!(emitted, 1);
        assert_eq!(logger.once_sites(), 1);
    }

    #[test]
    fn test_once_wins_over_throttle() {
        let (clock, logger) = logger();
        let options = LogOptions {
            once: true,
            ..LogOptions::throttle(Duration::from_millis(1))
        };
        let mut emitted = 0;
        for _ in 0..3 {
            clock.advance(Duration::from_secs(1));
            if logger.log(Level::Debug, "x", &options) {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);
        assert_eq!(logger.throttled_sites(), 0);
    }

    #[test]
    fn test_child_logger_does_not_affect_rate_limit() {
        let (_, logger) = logger();
        let site = CallSite {
            file: "node.rs",
            line: 7,
            column: 1,
        };
        let options = LogOptions::once().child("camera");
        assert!(logger.log_at(site, Level::Info, "a", &options));
        assert!(!logger.log_at(site, Level::Info, "a", &LogOptions::once()));
    }
}
