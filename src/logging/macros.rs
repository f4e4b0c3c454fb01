//! Formatting macros over [`RateLimitedLogger`](crate::logging::RateLimitedLogger).
//!
//! Each macro takes the logger first and a `format!` string after it. The
//! invocation site is the rate-limit key.
//!
//! ```ignore
//! loginfo!(logger, "connected to {}", uri);
//! logwarn_throttle!(logger, Duration::from_secs(5), "queue full ({} dropped)", dropped);
//! logerr_throttle_identical!(logger, Duration::from_secs(10), "lookup failed: {}", err);
//! loginfo_once!(logger, "first message received");
//! ```

/// Shared expansion for the level macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __rosnode_log {
    ($logger:expr, $level:ident, $options:expr, $($arg:tt)+) => {
        $logger.log(
            $crate::logging::Level::$level,
            &::std::format!($($arg)+),
            &$options,
        )
    };
}

#[macro_export]
macro_rules! logdebug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Debug, $crate::logging::LogOptions::default(), $($arg)+)
    };
}

#[macro_export]
macro_rules! logdebug_throttle {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Debug, $crate::logging::LogOptions::throttle($period), $($arg)+)
    };
}

#[macro_export]
macro_rules! logdebug_throttle_identical {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!(
            $logger,
            Debug,
            $crate::logging::LogOptions::throttle_identical($period),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! logdebug_once {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Debug, $crate::logging::LogOptions::once(), $($arg)+)
    };
}

#[macro_export]
macro_rules! loginfo {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Info, $crate::logging::LogOptions::default(), $($arg)+)
    };
}

#[macro_export]
macro_rules! loginfo_throttle {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Info, $crate::logging::LogOptions::throttle($period), $($arg)+)
    };
}

#[macro_export]
macro_rules! loginfo_throttle_identical {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!(
            $logger,
            Info,
            $crate::logging::LogOptions::throttle_identical($period),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! loginfo_once {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Info, $crate::logging::LogOptions::once(), $($arg)+)
    };
}

#[macro_export]
macro_rules! logwarn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Warn, $crate::logging::LogOptions::default(), $($arg)+)
    };
}

#[macro_export]
macro_rules! logwarn_throttle {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Warn, $crate::logging::LogOptions::throttle($period), $($arg)+)
    };
}

#[macro_export]
macro_rules! logwarn_throttle_identical {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!(
            $logger,
            Warn,
            $crate::logging::LogOptions::throttle_identical($period),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! logwarn_once {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Warn, $crate::logging::LogOptions::once(), $($arg)+)
    };
}

#[macro_export]
macro_rules! logerr {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Error, $crate::logging::LogOptions::default(), $($arg)+)
    };
}

#[macro_export]
macro_rules! logerr_throttle {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Error, $crate::logging::LogOptions::throttle($period), $($arg)+)
    };
}

#[macro_export]
macro_rules! logerr_throttle_identical {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!(
            $logger,
            Error,
            $crate::logging::LogOptions::throttle_identical($period),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! logerr_once {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Error, $crate::logging::LogOptions::once(), $($arg)+)
    };
}

#[macro_export]
macro_rules! logfatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Fatal, $crate::logging::LogOptions::default(), $($arg)+)
    };
}

#[macro_export]
macro_rules! logfatal_throttle {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Fatal, $crate::logging::LogOptions::throttle($period), $($arg)+)
    };
}

#[macro_export]
macro_rules! logfatal_throttle_identical {
    ($logger:expr, $period:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!(
            $logger,
            Fatal,
            $crate::logging::LogOptions::throttle_identical($period),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! logfatal_once {
    ($logger:expr, $($arg:tt)+) => {
        $crate::__rosnode_log!($logger, Fatal, $crate::logging::LogOptions::once(), $($arg)+)
    };
}
