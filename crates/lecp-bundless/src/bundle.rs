//! Bundle-mode formats.
//!
//! A bundle task is handed over whole to a [`BundleBuilder`]. The default
//! implementation drives rolldown; in watch mode it keeps a rebuild loop
//! alive and returns its handle so the session can cancel it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lecp_config::{FormatKind, FormatTask, SystemConfig};
use rolldown::{
    BundlerBuilder, BundlerOptions, InputItem, IsExternal, OutputFormat, RawMinifyOptions,
    SourceMapType,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::build::watcher::FileWatcher;
use crate::error::{Error, Result};

const ENTRY_CANDIDATES: &[&str] = &["index.ts", "index.tsx", "index.js", "index.jsx"];

#[async_trait]
pub trait BundleBuilder: Send + Sync {
    /// Build `task` once. In watch mode, also return a handle to a task
    /// that rebuilds on change until `cancel` fires.
    async fn build(
        &self,
        task: &FormatTask,
        system: &SystemConfig,
        cancel: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>>;
}

/// Entry module of a bundle task: the configured file, or `index.*` when
/// the entry is a directory.
pub fn resolve_entry(entry: &Path) -> Result<PathBuf> {
    if entry.is_file() {
        return Ok(entry.to_path_buf());
    }
    ENTRY_CANDIDATES
        .iter()
        .map(|name| entry.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::Bundle(format!("no entry module found in {}", entry.display())))
}

/// rolldown options for one task.
pub fn bundler_options(task: &FormatTask, system: &SystemConfig) -> Result<BundlerOptions> {
    let entry = resolve_entry(&task.entry)?;
    let file_name = task.file_name.clone().unwrap_or_else(|| "index".to_string());

    let format = match task.kind {
        FormatKind::Esm => OutputFormat::Esm,
        FormatKind::Cjs => OutputFormat::Cjs,
        FormatKind::Umd => OutputFormat::Umd,
    };

    let name = task
        .name
        .as_deref()
        .map(lecp_config::package::camelize)
        .unwrap_or_else(|| system.package.global_name());

    // peers are provided by the host application
    let external: Vec<String> = system.package.peer_dependencies.keys().cloned().collect();

    Ok(BundlerOptions {
        input: Some(vec![InputItem {
            name: Some(file_name),
            import: entry.to_string_lossy().into_owned(),
        }]),
        cwd: Some(system.cwd.clone()),
        dir: Some(task.out_dir.to_string_lossy().into_owned()),
        format: Some(format),
        name: Some(name),
        sourcemap: task.sourcemap.then_some(SourceMapType::File),
        minify: Some(RawMinifyOptions::from(task.minify)),
        external: Some(IsExternal::from(external)),
        ..Default::default()
    })
}

async fn bundle_once(options: BundlerOptions) -> Result<()> {
    let mut bundler = BundlerBuilder::default()
        .with_options(options)
        .build()
        .map_err(|e| Error::Bundle(format!("{e:?}")))?;
    bundler
        .write()
        .await
        .map_err(|e| Error::Bundle(format!("{e:?}")))?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct RolldownBundleBuilder;

#[async_trait]
impl BundleBuilder for RolldownBundleBuilder {
    async fn build(
        &self,
        task: &FormatTask,
        system: &SystemConfig,
        cancel: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>> {
        bundle_once(bundler_options(task, system)?).await?;
        info!("{} written to {}", task.label(), task.out_dir.display());

        if !system.watch {
            return Ok(None);
        }

        let root = if task.entry.is_dir() {
            task.entry.clone()
        } else {
            task.entry
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| system.cwd.clone())
        };
        let (watcher, mut events) = FileWatcher::new(root)?;
        let task = Arc::new(task.clone());
        let system = Arc::new(system.clone());

        let handle = tokio::spawn(async move {
            let _watcher = watcher;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => {
                        if event.is_none() {
                            break;
                        }
                        while events.try_recv().is_ok() {}
                        let rebuilt = match bundler_options(&task, &system) {
                            Ok(options) => bundle_once(options).await,
                            Err(e) => Err(e),
                        };
                        match rebuilt {
                            Ok(()) => info!("{} rebuilt", task.label()),
                            Err(e) => error!("{}", e),
                        }
                    }
                }
            }
        });
        Ok(Some(handle))
    }
}
