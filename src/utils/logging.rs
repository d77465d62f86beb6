//! Logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! A module opts in by declaring the flag and importing the macros from the
//! crate root:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("joined room {}", room_id);
//! ```
//!
//! Setting the flag to `false` silences a noisy module without touching
//! `RUST_LOG`. Debug-level output goes through `log::debug!` directly.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Installs the process-wide logger: `RUST_LOG` wins, otherwise info and up.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

#[cfg(test)]
mod tests {
    const ENABLE_LOGS: bool = false;

    #[test]
    fn test_disabled_flag_skips_formatting() {
        fn never_called() -> &'static str {
            panic!("formatted a disabled log line");
        }
        crate::log_info!("{}", never_called());
        crate::log_warn!("{}", never_called());
        crate::log_error!("{}", never_called());
        super::init_logging();
        super::init_logging();
    }
}
