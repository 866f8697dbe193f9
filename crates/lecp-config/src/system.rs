//! Process-scoped settings shared by every format task.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::package::PackageJson;
use crate::tsconfig::TsConfig;

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// No output at all.
    None,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::None => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" | "verbose" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "none" | "silent" | "off" => Ok(LogLevel::None),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::None => "none",
            other => other.as_filter(),
        };
        f.write_str(name)
    }
}

/// Read-only context for one build invocation.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub cwd: PathBuf,
    pub watch: bool,
    pub log_level: LogLevel,
    pub package: PackageJson,
    pub tsconfig: Option<TsConfig>,
}

impl SystemConfig {
    /// Read `package.json` and `tsconfig.json` for the project at `cwd`.
    pub fn load(cwd: impl AsRef<Path>, watch: bool, log_level: LogLevel) -> Result<Self> {
        let cwd = cwd.as_ref().to_path_buf();
        let package = PackageJson::read(&cwd)?;
        let tsconfig = TsConfig::discover(&cwd)?;
        Ok(Self {
            cwd,
            watch,
            log_level,
            package,
            tsconfig,
        })
    }

    pub fn is_isolated_declarations(&self) -> bool {
        self.tsconfig
            .as_ref()
            .is_some_and(TsConfig::isolated_declarations)
    }
}
