//! Watches the config file and its `extends` chain for restarts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexSet;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};

pub const RESTART_DEBOUNCE: Duration = Duration::from_millis(300);

pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
}

impl ConfigWatcher {
    /// Watch every file in `files`. Parent directories are watched so that
    /// editors which save by rename are still noticed.
    pub fn new<I>(files: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let files: IndexSet<PathBuf> = files.into_iter().collect();
        let dirs: IndexSet<PathBuf> = files
            .iter()
            .filter_map(|file| file.parent().map(Path::to_path_buf))
            .collect();

        let (tx, rx) = mpsc::unbounded_channel();
        let watched = files.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if matches!(event.kind, EventKind::Access(_) | EventKind::Other) {
                return;
            }
            for path in event.paths {
                if watched.contains(&path) {
                    let _ = tx.send(path);
                }
            }
        })
        .map_err(|source| Error::Watch {
            path: dirs.first().cloned().unwrap_or_default(),
            source,
        })?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|source| Error::Watch {
                    path: dir.clone(),
                    source,
                })?;
        }
        debug!(files = ?files, "watching config files");

        Ok(Self {
            _watcher: watcher,
            rx,
            debounce: RESTART_DEBOUNCE,
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Wait for a change, then for the burst to settle. Returns the file
    /// that changed first, or `None` once the watcher is gone.
    pub async fn changed(&mut self) -> Option<PathBuf> {
        let first = self.rx.recv().await?;
        loop {
            match tokio::time::timeout(self.debounce, self.rx.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reports_edit_of_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("lecp.config.json");
        std::fs::write(&config, "{}").unwrap();
        let config = config.canonicalize().unwrap();

        let mut watcher = ConfigWatcher::new([config.clone()])
            .unwrap()
            .with_debounce(Duration::from_millis(50));

        let path = config.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            std::fs::write(&path, r#"{"format":[{"type":"esm"}]}"#).unwrap();
        });

        let changed = tokio::time::timeout(Duration::from_secs(5), watcher.changed())
            .await
            .expect("config change not reported");
        assert_eq!(changed, Some(config));
    }
}
