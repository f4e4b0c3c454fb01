//! Rate-limited node logging.
//!
//! # Data Flow
//! ```text
//! loginfo_throttle!(logger, period, ...) / logger.info_throttle(period, msg)
//!     → CallSite::caller() (#[track_caller]) → Fingerprint
//!     → LogOptions::policy() picks exactly one RatePolicy
//!     → filters.rs table decides emit / suppress
//!     → tracing event, target "rosout"
//! ```
//!
//! # Design Decisions
//! - The rate-limit key is where the log call is written, not what it says;
//!   only the identical policy looks at message text
//! - Policy precedence: once > throttle_identical > throttle > unconditional
//! - Throttle timestamps come from an injectable clock so simulated time works

pub mod callsite;
pub mod clock;
pub mod filters;
pub mod logger;
mod macros;
pub mod policy;

pub use callsite::{CallSite, Fingerprint};
pub use clock::{Clock, ManualClock, SystemClock};
pub use logger::{RateLimitedLogger, BASE_LOGGER};
pub use policy::{Level, LogOptions, RatePolicy};
