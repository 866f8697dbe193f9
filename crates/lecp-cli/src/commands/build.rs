//! The build command.
//!
//! One pass is discover config → load project context → resolve → build.
//! In watch mode the pass stays alive in a [`WatchSession`] until the config
//! file (or anything it extends) changes or the process is interrupted; a
//! config change tears the session down and starts the next pass.

use std::path::{Path, PathBuf};
use std::time::Instant;

use lecp_bundless::{BuildOrchestrator, BuildSummary, ConfigWatcher, WatchSession};
use lecp_config::{ConfigDiscovery, SystemConfig};
use tracing::{error, info};

use crate::cli::{BuildArgs, Cli};
use crate::error::{CliError, Result};
use crate::settings::Settings;
use crate::ui;

/// Run the build command.
pub async fn execute(args: &BuildArgs, cli: &Cli, settings: &Settings) -> Result<()> {
    let cwd = resolve_cwd(cli.cwd.as_deref())?;
    let watch = args.watch || cli.is_watch();

    let (summary, session, config_files) = run_pass(&cwd, watch, settings).await?;
    if !watch {
        session.shutdown().await;
        return finish(&summary);
    }

    let mut session = session;
    let mut config_files = config_files;
    loop {
        let mut watcher = ConfigWatcher::new(config_files.clone())?;
        tokio::select! {
            changed = watcher.changed() => {
                let Some(path) = changed else {
                    session.shutdown().await;
                    return Ok(());
                };
                info!("{} changed, restarting", display_relative(&cwd, &path));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                session.shutdown().await;
                return Ok(());
            }
        }

        session.shutdown().await;
        match run_pass(&cwd, watch, settings).await {
            Ok((_, next_session, next_files)) => {
                session = next_session;
                config_files = next_files;
            }
            Err(err) => {
                // keep watching the old chain until the config is fixed
                error!("{}", crate::error::cli_error_to_miette(err));
                session = WatchSession::new();
            }
        }
    }
}

/// One complete pass. Returns the summary, the session holding whatever
/// keeps running in watch mode, and the config files to watch.
async fn run_pass(
    cwd: &Path,
    watch: bool,
    settings: &Settings,
) -> Result<(BuildSummary, WatchSession, Vec<PathBuf>)> {
    let started = Instant::now();
    let loaded = ConfigDiscovery::new(cwd).load()?;
    let system = SystemConfig::load(cwd, watch, settings.log_level)?;

    let mut session = WatchSession::new();
    let summary = match BuildOrchestrator::new(system)
        .build_config(&loaded.config, &mut session)
        .await
    {
        Ok(summary) => summary,
        Err(err) => {
            session.shutdown().await;
            return Err(err.into());
        }
    };
    ui::print_build_summary(&summary, started.elapsed());

    Ok((summary, session, loaded.files.into_iter().collect()))
}

fn finish(summary: &BuildSummary) -> Result<()> {
    if summary.failed() > 0 {
        // per-file failures are reported above and do not fail the run
        info!("{} of {} files failed", summary.failed(), summary.failed() + summary.compiled());
    }
    Ok(())
}

fn resolve_cwd(cwd: Option<&Path>) -> Result<PathBuf> {
    let base = std::env::current_dir().map_err(|source| CliError::Cwd {
        path: PathBuf::from("."),
        source,
    })?;
    let path = match cwd {
        Some(dir) => base.join(dir),
        None => base,
    };
    path.canonicalize()
        .map_err(|source| CliError::Cwd { path, source })
}

fn display_relative(cwd: &Path, path: &Path) -> String {
    path.strip_prefix(cwd)
        .unwrap_or(path)
        .display()
        .to_string()
}
