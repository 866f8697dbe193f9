//! Process settings.
//!
//! Priority: CLI flags > `LECP_*` environment variables > defaults.

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use lecp_config::LogLevel;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub log_level: LogLevel,
    pub no_color: bool,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self> {
        Ok(Self::figment(cli).extract()?)
    }

    pub fn figment(cli: &Cli) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Env::prefixed("LECP_").only(&["log_level", "no_color"]));

        if let Some(level) = cli.log_level {
            figment = figment.merge(Serialized::default("log_level", level));
        }
        if cli.no_color {
            figment = figment.merge(Serialized::default("no_color", true));
        }
        figment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn clear_env() {
        unsafe {
            std::env::remove_var("LECP_LOG_LEVEL");
            std::env::remove_var("LECP_NO_COLOR");
        }
    }

    #[test]
    #[serial]
    fn defaults_to_info() {
        clear_env();
        let settings = Settings::load(&cli(&["lecp"])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.log_level, LogLevel::Info);
    }

    #[test]
    #[serial]
    fn env_var_sets_level() {
        clear_env();
        unsafe { std::env::set_var("LECP_LOG_LEVEL", "warn") };
        let settings = Settings::load(&cli(&["lecp"])).unwrap();
        clear_env();
        assert_eq!(settings.log_level, LogLevel::Warn);
    }

    #[test]
    #[serial]
    fn flag_beats_env_var() {
        clear_env();
        unsafe { std::env::set_var("LECP_LOG_LEVEL", "warn") };
        let settings = Settings::load(&cli(&["lecp", "--logLevel", "debug"])).unwrap();
        clear_env();
        assert_eq!(settings.log_level, LogLevel::Debug);
    }

    #[test]
    #[serial]
    fn invalid_env_value_is_an_error() {
        clear_env();
        unsafe { std::env::set_var("LECP_LOG_LEVEL", "loud") };
        let result = Settings::load(&cli(&["lecp"]));
        clear_env();
        assert!(result.is_err());
    }
}
