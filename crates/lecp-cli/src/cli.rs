//! Command-line interface definition.
//!
//! `lecp` and `lecp build` are the same command, so build flags are accepted
//! both at the top level and after the subcommand.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lecp_config::LogLevel;

/// lecp - bundless package compiler
#[derive(Parser, Debug)]
#[command(
    name = "lecp",
    version,
    about = "Bundless compiler for JavaScript/TypeScript packages",
    long_about = "lecp compiles every file under the entry directory into one output file per\n\
                  format (es/, lib/, ...), with source maps, CSS modules and declarations.\n\
                  Formats configured in bundle mode are handed to rolldown."
)]
pub struct Cli {
    /// Log verbosity: debug, info, warn, error or none
    ///
    /// Falls back to LECP_LOG_LEVEL, then to info. RUST_LOG directives are
    /// layered on top.
    #[arg(long = "log-level", alias = "logLevel", global = true, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    #[command(flatten)]
    pub build: BuildArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile the package (default)
    ///
    /// Resolves lecp.config.* into one task per configured format and
    /// builds them concurrently.
    Build(BuildArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Keep running and recompile on change
    ///
    /// Source changes recompile single files. Changes to the config file or
    /// anything it extends restart the whole build.
    #[arg(short, long)]
    pub watch: bool,
}

impl Cli {
    /// Build arguments of whichever form was used.
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Some(Command::Build(args)) => args,
            None => &self.build,
        }
    }

    pub fn is_watch(&self) -> bool {
        self.build.watch || self.build_args().watch
    }
}
