//! lecp CLI - bundless package compiler for JavaScript/TypeScript libraries.
//!
//! - [`cli`] - argument definitions
//! - [`settings`] - process settings layered from env vars and flags
//! - [`commands`] - the build command and its config-restart loop
//! - [`error`] - CLI errors with hints
//! - [`ui`] - colors and the end-of-build summary

pub mod cli;
pub mod commands;
pub mod error;
pub mod settings;
pub mod ui;

pub use error::{CliError, Result};
