//! CLI error handling.
//!
//! Only fatal conditions surface here: unreadable settings, missing or
//! invalid config, an unusable project root. Per-file compile errors are
//! logged by the build itself and never reach this type.

use std::path::PathBuf;

use lecp_config::ConfigError;
use miette::Report;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(lecp_bundless::Error),

    #[error("invalid settings: {0}")]
    Settings(#[from] Box<figment::Error>),

    #[error("project root {} is not usable: {source}", path.display())]
    Cwd {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<lecp_bundless::Error> for CliError {
    fn from(err: lecp_bundless::Error) -> Self {
        match err {
            lecp_bundless::Error::Config(err) => CliError::Config(err),
            other => CliError::Build(other),
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::Settings(Box::new(err))
    }
}

impl CliError {
    /// What the user can do about it, when there is something obvious.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CliError::Config(ConfigError::NotFound(_)) => Some(
                "Create lecp.config.toml or lecp.config.json in the project root, \
                 or add a \"lecp\" field to package.json",
            ),
            CliError::Config(ConfigError::ConfigNotFound(_)) => {
                Some("Check the `extends` path; it is relative to the config that declares it")
            }
            CliError::Config(ConfigError::NoFormats) => {
                Some("Add at least one entry to `format`, e.g. [{ \"type\": \"esm\" }]")
            }
            CliError::Config(ConfigError::PackageJson(_)) => {
                Some("Run lecp from the package root or pass --cwd <dir>")
            }
            CliError::Settings(_) => {
                Some("LECP_LOG_LEVEL accepts debug, info, warn, error or none")
            }
            CliError::Cwd { .. } => Some("Pass an existing directory to --cwd"),
            _ => None,
        }
    }
}

/// Convert a CLI error into a miette report.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err.hint() {
        Some(hint) => miette::miette!("{}\n\nHint: {}", err, hint),
        None => miette::miette!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_has_hint() {
        let err = CliError::from(ConfigError::NotFound(PathBuf::from("/tmp/pkg")));
        assert!(err.hint().unwrap().contains("lecp.config.toml"));
        let report = format!("{:?}", cli_error_to_miette(err));
        assert!(report.contains("Hint:"));
    }

    #[test]
    fn build_errors_pass_through() {
        let err = CliError::from(lecp_bundless::Error::Bundle("no entry".to_string()));
        assert_eq!(err.hint(), None);
        assert_eq!(err.to_string(), "bundle failed: no entry");
    }

    #[test]
    fn config_errors_from_the_build_keep_their_hint() {
        let err = CliError::from(lecp_bundless::Error::Config(ConfigError::NoFormats));
        assert!(matches!(err, CliError::Config(ConfigError::NoFormats)));
        assert!(err.hint().is_some());
    }
}
