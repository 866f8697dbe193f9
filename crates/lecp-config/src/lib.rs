//! # lecp-config
//!
//! Configuration for the lecp package compiler: the user-facing schema,
//! discovery of `lecp.config.*` with its `extends` chain, the project context
//! read from `package.json` / `tsconfig.json`, and the resolver that turns all
//! of it into one [`FormatTask`] per requested output layout.

pub mod defaults;
pub mod discovery;
pub mod error;
pub mod package;
pub mod resolve;
pub mod system;
pub mod targets;
pub mod tsconfig;
pub mod user;

pub use discovery::{ConfigDiscovery, LoadedConfig, load_config};
pub use error::{ConfigError, Result};
pub use package::{PackageJson, PackageType};
pub use resolve::{ConfigResolver, CssTask, DtsTask, FormatTask};
pub use system::{LogLevel, SystemConfig};
pub use targets::Targets;
pub use tsconfig::TsConfig;
pub use user::*;
