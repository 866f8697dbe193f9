//! Whole-program declarations through an external `tsc`.
//!
//! A generated `tsconfig` under `node_modules/.cache/lecp` extends the
//! project's own config, pins the file set and forces declaration-only
//! emit into the format's output directory. `--listEmittedFiles` tells the
//! post-emit pass exactly which files belong to the batch.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use lecp_config::defaults::TEST_PATTERNS_FOR_TS;
use regex::Regex;
use serde_json::{Map, Value, json};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::error::{Error, IoResultExt, Result};
use crate::tool::NodeTool;

pub const TSC: &str = "tsc";

/// Directory (relative to the project) holding generated configs.
pub const CACHE_DIR: &str = "node_modules/.cache/lecp";

const EMITTED_PREFIX: &str = "TSFILE: ";

static WATCH_BATCH_DONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Found (\d+) errors?\. Watching for file changes").ok());

static WATCH_BATCH_START: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(Starting compilation in watch mode|File change detected\. Starting incremental compilation)").ok()
});

static DIAGNOSTIC: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(^|\s)error TS\d+:").ok());

/// Options the user cannot turn off.
fn enforced_options(out_dir: &Path) -> Map<String, Value> {
    let out_dir = out_dir.to_string_lossy().into_owned();
    let Value::Object(map) = json!({
        "declaration": true,
        "noEmit": false,
        "emitDeclarationOnly": true,
        "checkJs": false,
        "skipLibCheck": true,
        "incremental": false,
        "composite": false,
        "outDir": out_dir,
        "declarationDir": out_dir,
    }) else {
        return Map::new();
    };
    map
}

/// Options applied only when the project config leaves them unset.
fn default_options() -> Map<String, Value> {
    let Value::Object(map) = json!({
        "declarationMap": true,
        "target": "ESNext",
        "isolatedModules": true,
    }) else {
        return Map::new();
    };
    map
}

/// Inputs to the generated config.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub cwd: PathBuf,
    /// The project's `tsconfig.json`, extended when present.
    pub extends: Option<PathBuf>,
    /// Effective project `compilerOptions`.
    pub user_options: Map<String, Value>,
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    /// User exclude patterns, relative to the entry directory.
    pub exclude: Vec<String>,
    /// Distinguishes the generated files of concurrent formats.
    pub label: String,
}

impl ProgramConfig {
    /// Effective compiler options: defaults < user < enforced.
    ///
    /// User options reach `tsc` through `extends`, so only the keys that
    /// differ from what the project already says are written out.
    pub fn compiler_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        for (key, value) in default_options() {
            if !self.user_options.contains_key(&key) {
                options.insert(key, value);
            }
        }
        if !self.user_options.contains_key("rootDir") {
            options.insert(
                "rootDir".to_string(),
                Value::String(self.src_dir.to_string_lossy().into_owned()),
            );
        }
        options.extend(enforced_options(&self.out_dir));
        options
    }

    /// Full generated tsconfig document.
    pub fn document(&self) -> Value {
        let root = self.cwd.to_string_lossy().replace('\\', "/");
        let src = self.src_dir.to_string_lossy().replace('\\', "/");

        let exclude: Vec<String> = TEST_PATTERNS_FOR_TS
            .iter()
            .map(|pattern| format!("{root}/{pattern}"))
            .chain(self.exclude.iter().map(|pattern| format!("{src}/{pattern}")))
            .collect();

        let mut document = Map::new();
        if let Some(extends) = &self.extends {
            document.insert(
                "extends".to_string(),
                Value::String(extends.to_string_lossy().into_owned()),
            );
        }
        document.insert(
            "compilerOptions".to_string(),
            Value::Object(self.compiler_options()),
        );
        document.insert("include".to_string(), json!([format!("{src}/**/*")]));
        document.insert("exclude".to_string(), json!(exclude));
        Value::Object(document)
    }

    /// `tsconfig.<label>.<out dir>.json`; formats of one kind writing to
    /// different directories get separate files.
    pub fn path(&self) -> PathBuf {
        self.cwd
            .join(CACHE_DIR)
            .join(format!("tsconfig.{}.{}.json", self.label, self.out_dir_tag()))
    }

    fn out_dir_tag(&self) -> String {
        let rel = self.out_dir.strip_prefix(&self.cwd).unwrap_or(&self.out_dir);
        let tag = rel
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .map(|part| {
                part.chars()
                    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') { c } else { '_' })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("__");
        if tag.is_empty() { "root".to_string() } else { tag }
    }

    /// Write the generated config and return its path.
    pub async fn write(&self) -> Result<PathBuf> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_path(parent, "create")?;
        }
        let text = serde_json::to_string_pretty(&self.document())
            .map_err(|e| Error::Declaration {
                path: path.clone(),
                message: e.to_string(),
            })?;
        fs::write(&path, text).await.with_path(&path, "write")?;
        debug!(config = %path.display(), "wrote declaration tsconfig");
        Ok(path)
    }

    fn args(config: &Path, watch: bool) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            config.to_string_lossy().into_owned(),
            "--listEmittedFiles".to_string(),
            "--pretty".to_string(),
            "false".to_string(),
        ];
        if watch {
            args.push("--watch".to_string());
            args.push("--preserveWatchOutput".to_string());
        }
        args
    }
}

/// Output of one compilation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutput {
    pub emitted: Vec<PathBuf>,
    pub diagnostics: Vec<String>,
}

impl BatchOutput {
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|line| DIAGNOSTIC.as_ref().is_some_and(|re| re.is_match(line)))
            .count()
    }

    /// Sort one line of `tsc` output into this batch.
    fn push_line(&mut self, line: &str) {
        if let Some(file) = line.strip_prefix(EMITTED_PREFIX) {
            self.emitted.push(PathBuf::from(file.trim()));
        } else if !line.trim().is_empty() {
            self.diagnostics.push(line.trim_end().to_string());
        }
    }

    pub fn parse(stdout: &str) -> Self {
        let mut batch = Self::default();
        for line in stdout.lines() {
            batch.push_line(line);
        }
        batch
    }
}

/// Event from a `tsc --watch` process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    Started,
    Finished(BatchOutput),
}

/// Incremental line parser for watch output.
#[derive(Debug, Default)]
pub struct WatchParser {
    current: BatchOutput,
}

impl WatchParser {
    pub fn feed(&mut self, line: &str) -> Option<WatchSignal> {
        let line = strip_timestamp(line);
        if WATCH_BATCH_START.as_ref().is_some_and(|re| re.is_match(line)) {
            self.current = BatchOutput::default();
            return Some(WatchSignal::Started);
        }
        if WATCH_BATCH_DONE.as_ref().is_some_and(|re| re.is_match(line)) {
            return Some(WatchSignal::Finished(std::mem::take(&mut self.current)));
        }
        self.current.push_line(line);
        None
    }
}

/// `[12:00:00 PM] message` -> `message`
fn strip_timestamp(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with('[') {
        if let Some(end) = trimmed.find("] ") {
            return &trimmed[end + 2..];
        }
    }
    line
}

/// Run `tsc` once. Diagnostics do not make this fail; a missing tool does.
pub async fn run_once(tool: &NodeTool, config: &ProgramConfig) -> Result<BatchOutput> {
    let path = config.write().await?;
    let output = tool
        .command(&config.cwd)
        .args(ProgramConfig::args(&path, false))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Tool {
            tool: tool.name().to_string(),
            message: e.to_string(),
        })?;

    let mut batch = BatchOutput::parse(&String::from_utf8_lossy(&output.stdout));
    let stderr = String::from_utf8_lossy(&output.stderr);
    batch
        .diagnostics
        .extend(stderr.lines().filter(|l| !l.trim().is_empty()).map(String::from));
    debug!(
        status = ?output.status.code(),
        emitted = batch.emitted.len(),
        "tsc finished"
    );
    Ok(batch)
}

/// Spawn `tsc --watch` and return the child plus a line reader over stdout.
pub async fn spawn_watch(
    tool: &NodeTool,
    config: &ProgramConfig,
) -> Result<(
    tokio::process::Child,
    tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
)> {
    let path = config.write().await?;
    let mut child = tool
        .command(&config.cwd)
        .args(ProgramConfig::args(&path, true))
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| Error::Tool {
            tool: tool.name().to_string(),
            message: e.to_string(),
        })?;
    let stdout = child.stdout.take().ok_or_else(|| Error::Tool {
        tool: tool.name().to_string(),
        message: "stdout unavailable".to_string(),
    })?;
    Ok((child, BufReader::new(stdout).lines()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(user: Value) -> ProgramConfig {
        let Value::Object(user_options) = user else {
            panic!("object expected");
        };
        ProgramConfig {
            cwd: PathBuf::from("/p"),
            extends: Some(PathBuf::from("/p/tsconfig.json")),
            user_options,
            src_dir: PathBuf::from("/p/src"),
            out_dir: PathBuf::from("/p/es"),
            exclude: vec!["legacy/**".to_string()],
            label: "esm".to_string(),
        }
    }

    #[test]
    fn options_layer_defaults_user_enforced() {
        let cfg = config(json!({"declarationMap": false, "noEmit": true, "declaration": false}));
        let options = cfg.compiler_options();

        // user value wins over default, so it is left to `extends`
        assert!(!options.contains_key("declarationMap"));
        assert_eq!(options["target"], "ESNext");
        assert_eq!(options["isolatedModules"], true);
        // enforced beats user
        assert_eq!(options["noEmit"], false);
        assert_eq!(options["declaration"], true);
        assert_eq!(options["emitDeclarationOnly"], true);
        assert_eq!(options["outDir"], "/p/es");
        assert_eq!(options["declarationDir"], "/p/es");
        assert_eq!(options["rootDir"], "/p/src");
    }

    #[test]
    fn document_pins_file_set() {
        let doc = config(json!({})).document();
        assert_eq!(doc["extends"], "/p/tsconfig.json");
        assert_eq!(doc["include"][0], "/p/src/**/*");
        let exclude: Vec<&str> = doc["exclude"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(exclude.contains(&"/p/**/*.test.*"));
        assert!(exclude.contains(&"/p/src/legacy/**"));
        assert_eq!(
            config(json!({})).path(),
            PathBuf::from("/p/node_modules/.cache/lecp/tsconfig.esm.es.json")
        );
    }

    #[test]
    fn same_kind_formats_get_separate_configs() {
        let es = config(json!({}));
        let mut dist = config(json!({}));
        dist.out_dir = PathBuf::from("/p/dist/es");
        assert_ne!(es.path(), dist.path());
        assert_eq!(
            dist.path(),
            PathBuf::from("/p/node_modules/.cache/lecp/tsconfig.esm.dist__es.json")
        );
    }

    #[test]
    fn batch_output_splits_files_and_diagnostics() {
        let batch = BatchOutput::parse(
            "TSFILE: /p/es/index.d.ts\nTSFILE: /p/es/index.d.ts.map\nsrc/a.ts(1,7): error TS2322: Type 'string' is not assignable to type 'number'.\n",
        );
        assert_eq!(
            batch.emitted,
            vec![PathBuf::from("/p/es/index.d.ts"), PathBuf::from("/p/es/index.d.ts.map")]
        );
        assert_eq!(batch.error_count(), 1);
    }

    #[test]
    fn watch_parser_groups_batches() {
        let mut parser = WatchParser::default();
        assert_eq!(
            parser.feed("[10:00:00 AM] Starting compilation in watch mode..."),
            Some(WatchSignal::Started)
        );
        assert_eq!(parser.feed("TSFILE: /p/es/a.d.ts"), None);
        let Some(WatchSignal::Finished(batch)) =
            parser.feed("[10:00:01 AM] Found 0 errors. Watching for file changes.")
        else {
            panic!("batch expected");
        };
        assert_eq!(batch.emitted, vec![PathBuf::from("/p/es/a.d.ts")]);
        assert_eq!(batch.error_count(), 0);

        assert_eq!(
            parser.feed("[10:00:05 AM] File change detected. Starting incremental compilation..."),
            Some(WatchSignal::Started)
        );
        parser.feed("src/a.ts(2,1): error TS1005: ';' expected.");
        let Some(WatchSignal::Finished(batch)) =
            parser.feed("[10:00:06 AM] Found 1 error. Watching for file changes.")
        else {
            panic!("batch expected");
        };
        assert_eq!(batch.error_count(), 1);
    }
}
