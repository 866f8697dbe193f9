//! Error types for lecp-bundless operations.
//!
//! None of these abort a build. They are raised inside a single file task or
//! watch handler, logged, and dropped at that boundary.

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Syntax or semantic diagnostics from the script compiler.
    #[error("failed to compile {path}:\n{message}")]
    Compile { path: PathBuf, message: String },

    /// Style pipeline failure (LESS render or lightningcss).
    #[error("failed to compile style {path}: {message}")]
    Style { path: PathBuf, message: String },

    /// Declaration emission failure.
    #[error("failed to emit declarations for {path}: {message}")]
    Declaration { path: PathBuf, message: String },

    /// An external node tool is missing or exited unsuccessfully.
    #[error("{tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("bundle failed: {0}")]
    Bundle(String),

    #[error("invalid source map: {0}")]
    SourceMap(String),

    #[error("invalid exclude pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    /// I/O error with the path it happened on.
    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] lecp_config::ConfigError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, action: &str, source: std::io::Error) -> Self {
        Error::Io {
            message: format!("failed to {} {}", action, path.into().display()),
            source,
        }
    }
}

/// Attach a path to a raw I/O result.
pub(crate) trait IoResultExt<T> {
    fn with_path(self, path: &std::path::Path, action: &str) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: &std::path::Path, action: &str) -> Result<T> {
        self.map_err(|source| Error::io(path, action, source))
    }
}
