#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lecp_bundless::{BuildOrchestrator, BuildSummary, WatchSession};
use lecp_config::{LogLevel, SystemConfig, UserConfig};
use tempfile::TempDir;

/// A throwaway package on disk.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new(package_json: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("package.json"), package_json).expect("write package.json");
        Self { dir }
    }

    /// `"type": "module"` package named `demo`.
    pub fn module() -> Self {
        Self::new(r#"{ "name": "demo", "version": "1.0.0", "type": "module" }"#)
    }

    pub fn commonjs() -> Self {
        Self::new(r#"{ "name": "demo", "version": "1.0.0" }"#)
    }

    pub fn root(&self) -> PathBuf {
        // notify reports canonical paths
        self.dir.path().canonicalize().expect("canonical root")
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(path, contents).expect("write source");
        self
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap_or_else(|e| panic!("read {rel}: {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn system(&self, watch: bool) -> SystemConfig {
        SystemConfig::load(self.root(), watch, LogLevel::Error).expect("system config")
    }

    /// Build once with `config` given as JSON.
    pub async fn build(&self, config: &str) -> BuildSummary {
        let mut session = WatchSession::new();
        let summary = BuildOrchestrator::new(self.system(false))
            .build_config(&parse_config(config), &mut session)
            .await
            .expect("build");
        session.shutdown().await;
        summary
    }

    /// Start a watch build; the caller shuts the session down.
    pub async fn watch(&self, config: &str) -> (BuildSummary, WatchSession) {
        let mut session = WatchSession::new();
        let summary = BuildOrchestrator::new(self.system(true))
            .build_config(&parse_config(config), &mut session)
            .await
            .expect("watch build");
        (summary, session)
    }

    /// Every file under `rel`, relative to it, with contents.
    pub fn snapshot(&self, rel: &str) -> Vec<(PathBuf, String)> {
        let base = self.path(rel);
        let mut files: Vec<(PathBuf, String)> = walkdir::WalkDir::new(&base)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(&base).expect("under base").to_path_buf();
                let text = fs::read_to_string(e.path()).unwrap_or_default();
                (rel, text)
            })
            .collect();
        files.sort();
        files
    }
}

pub fn parse_config(json: &str) -> UserConfig {
    serde_json::from_str(json).expect("valid config")
}

/// Whether a node tool resolves from `cwd` or PATH.
pub fn has_tool(name: &'static str, cwd: &Path) -> bool {
    lecp_bundless::NodeTool::is_available(name, cwd)
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
