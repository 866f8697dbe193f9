//! File system watcher for an entry directory.
//!
//! notify callbacks run on notify's own thread; events are translated into
//! [`WatchEvent`]s relative to the watched root and pushed through a tokio
//! channel.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Same-path events closer together than this are dropped.
const DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
    UnlinkDir,
}

/// One change under the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    /// Relative to the watched root.
    pub path: PathBuf,
}

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Watch `root` recursively.
    pub fn new(root: PathBuf) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        let (tx, rx) = mpsc::channel(256);
        let mut last_event: Option<(WatchEvent, Instant)> = None;
        let root_for_events = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for change in translate(&event, &root_for_events) {
                let now = Instant::now();
                if let Some((last, at)) = &last_event {
                    if *last == change && now.duration_since(*at) < DEBOUNCE {
                        continue;
                    }
                }
                last_event = Some((change.clone(), now));
                if tx.blocking_send(change).is_err() {
                    return;
                }
            }
        })
        .map_err(|source| Error::Watch {
            path: root.clone(),
            source,
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| Error::Watch {
                path: root.clone(),
                source,
            })?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map a notify event onto zero or more watch events.
fn translate(event: &Event, root: &Path) -> Vec<WatchEvent> {
    let relative = |path: &PathBuf| -> Option<PathBuf> {
        if should_ignore(path, root) {
            return None;
        }
        path.strip_prefix(root).ok().map(Path::to_path_buf)
    };
    let single = |kind: WatchEventKind, path: &PathBuf| {
        relative(path).map(|path| WatchEvent { kind, path })
    };

    match event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter_map(|p| single(WatchEventKind::Add, p))
            .collect(),
        EventKind::Remove(RemoveKind::Folder) => event
            .paths
            .iter()
            .filter_map(|p| single(WatchEventKind::UnlinkDir, p))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter_map(|p| single(WatchEventKind::Unlink, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .filter_map(|p| single(WatchEventKind::Unlink, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter_map(|p| single(WatchEventKind::Add, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::new();
            if let Some(from) = event.paths.first() {
                events.extend(single(WatchEventKind::Unlink, from));
            }
            if let Some(to) = event.paths.get(1) {
                events.extend(single(WatchEventKind::Add, to));
            }
            events
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter_map(|p| {
                let kind = if p.exists() {
                    WatchEventKind::Add
                } else {
                    WatchEventKind::Unlink
                };
                single(kind, p)
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| p.is_file())
            .filter_map(|p| single(WatchEventKind::Change, p))
            .collect(),
        _ => Vec::new(),
    }
}

/// Paths outside the root and hidden files are never reported.
fn should_ignore(path: &Path, root: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return true;
    };
    if rel.as_os_str().is_empty() {
        return true;
    }
    rel.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}
