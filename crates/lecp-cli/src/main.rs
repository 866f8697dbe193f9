//! lecp CLI - bundless package compiler.
//!
//! Parses arguments, installs the logger once and hands over to the build
//! command. Fatal errors are reported through miette (exit code 1).

use clap::Parser;
use lecp_cli::{cli, commands, error, settings::Settings, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let settings = Settings::load(&args).map_err(error::cli_error_to_miette)?;
    ui::init_colors(!settings.no_color);
    lecp_bundless::init_logging(settings.log_level, ui::colors_enabled());

    let result = match &args.command {
        Some(cli::Command::Build(build_args)) => {
            commands::build_execute(build_args, &args, &settings).await
        }
        None => commands::build_execute(&args.build, &args, &settings).await,
    };

    result.map_err(error::cli_error_to_miette)
}
