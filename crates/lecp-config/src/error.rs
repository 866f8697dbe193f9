//! Error types for configuration loading and resolution.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file was discovered in the project root.
    #[error("config not found in {0} (expected lecp.config.toml, lecp.config.json or a \"lecp\" field in package.json)")]
    NotFound(PathBuf),

    /// The root config or a non-cyclic `extends` target does not exist.
    #[error("config file does not exist: {0}")]
    ConfigNotFound(PathBuf),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("invalid config value in {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no output format configured")]
    NoFormats,

    #[error("failed to read package.json in {0}")]
    PackageJson(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::InvalidValue {
            field: err
                .path
                .last()
                .cloned()
                .unwrap_or_else(|| "config".to_string()),
            message: err.to_string(),
        }
    }
}
