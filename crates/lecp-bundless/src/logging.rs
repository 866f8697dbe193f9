//! Logging utilities for lecp-bundless
//!
//! This module is only available with the `logging` feature.
//!
//! For library users: lecp emits tracing events - install your own subscriber.
//! For the CLI: [`init_logging`] installs the compact formatter once.

use std::sync::Once;

use lecp_config::LogLevel;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::None => LevelFilter::OFF,
    }
}

/// Initialize lecp logging with the given level.
///
/// `RUST_LOG` directives are layered on top of the level. Only the first
/// call in a process has any effect; restarts reuse the installed subscriber.
///
/// # Example
///
/// ```rust,no_run
/// use lecp_bundless::logging::init_logging;
/// use lecp_config::LogLevel;
///
/// init_logging(LogLevel::Info, true);
/// ```
pub fn init_logging(level: LogLevel, color: bool) {
    crate::build::set_color(color);
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level_filter(level).into())
            .from_env_lossy();

        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(color)
                    .with_writer(std::io::stderr)
                    .without_time(),
            )
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_off() {
        assert_eq!(level_filter(LogLevel::None), LevelFilter::OFF);
        assert_eq!(level_filter(LogLevel::Debug), LevelFilter::DEBUG);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging(LogLevel::Warn, false);
        init_logging(LogLevel::Debug, false);
    }
}
