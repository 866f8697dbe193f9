#![cfg_attr(docsrs, feature(doc_cfg))]

//! # lecp-bundless
//!
//! Per-file compilation of a package source tree into ready-to-publish
//! layouts: `es/` (ESM), `lib/` (CommonJS) and friends. Every source file
//! maps to exactly one output file, with source maps and declarations next
//! to it. Bundle-mode formats (UMD) are handed to rolldown.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lecp_bundless::{BuildOrchestrator, WatchSession};
//! use lecp_config::{LogLevel, SystemConfig, load_config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let system = SystemConfig::load(".", false, LogLevel::Info)?;
//! let loaded = load_config(std::path::Path::new("lecp.config.json"))?;
//!
//! let mut session = WatchSession::new();
//! let summary = BuildOrchestrator::new(system)
//!     .build_config(&loaded.config, &mut session)
//!     .await?;
//! println!("{} files, {} failed", summary.compiled(), summary.failed());
//! # Ok(()) }
//! ```

pub mod build;
pub mod bundle;
pub mod classify;
pub mod dts;
pub mod error;
pub mod exclude;
pub mod extension;
pub mod output_path;
pub mod plan;
pub mod script;
pub mod sourcemap;
pub mod style;
pub mod tool;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::init_logging;

pub use build::{
    BuildOrchestrator, BuildSummary, CompiledFile, ConfigWatcher, FileWatcher, FormatBuilder,
    FormatReport, RESTART_DEBOUNCE, WatchEvent, WatchEventKind, WatchSession, set_color,
};
pub use bundle::{BundleBuilder, RolldownBundleBuilder};
pub use classify::{FileKind, classify};
pub use dts::{DeclarationEngine, DeclarationReport, DeclarationStrategy, EmitState};
pub use error::{Error, Result};
pub use extension::{OutputExtension, output_extension};
pub use output_path::OutputPathMapper;
pub use plan::{Capability, CompilePlan, ModuleFormat, Step, plan_for};
pub use script::{ScriptOptions, ScriptTransformer};
pub use style::{LessRenderer, LesscRenderer, StyleOptions, StyleTransformer};
pub use tool::NodeTool;
