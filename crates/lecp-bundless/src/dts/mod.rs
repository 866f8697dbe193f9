//! Declaration emission.
//!
//! Two mutually exclusive strategies, picked once per format:
//!
//! - [`DeclarationStrategy::Isolated`] when the project opts into
//!   `isolatedDeclarations` (or `dts.mode` is `fast`): every TypeScript
//!   file is handled on its own, alongside its script.
//! - [`DeclarationStrategy::Program`] otherwise: one `tsc` run over the
//!   whole file set, followed by a rewrite pass over what it emitted.
//!
//! The program strategy moves through [`EmitState`]:
//! `Idle -> Compiling -> EmitOk | EmitWithDiagnostics -> Idle`.

pub mod isolated;
pub mod program;
pub mod rewrite;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lecp_config::{DtsKind, DtsMode, FormatTask, SystemConfig};
use parking_lot::Mutex;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use isolated::generate_declaration;
pub use program::{BatchOutput, ProgramConfig, WatchParser, WatchSignal};
pub use rewrite::DeclarationRewriter;

use crate::classify;
use crate::error::{Error, IoResultExt, Result};
use crate::output_path::OutputPathMapper;
use crate::script::SpecifierResolver;
use crate::tool::NodeTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationStrategy {
    Isolated,
    Program,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitState {
    #[default]
    Idle,
    Compiling,
    EmitOk,
    EmitWithDiagnostics,
}

/// What one program batch produced.
#[derive(Debug, Clone, Default)]
pub struct DeclarationReport {
    /// Final declaration paths, after renaming.
    pub written: Vec<PathBuf>,
    pub diagnostics: Vec<String>,
    pub errors: usize,
}

pub struct DeclarationEngine {
    strategy: DeclarationStrategy,
    label: String,
    paths: OutputPathMapper,
    resolver: SpecifierResolver,
    program: ProgramConfig,
    state: Mutex<EmitState>,
}

impl std::fmt::Debug for DeclarationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarationEngine")
            .field("strategy", &self.strategy)
            .field("label", &self.label)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl DeclarationEngine {
    /// Engine for `task`, or `None` when declarations are turned off.
    pub fn new(task: &FormatTask, system: &SystemConfig, paths: OutputPathMapper) -> Option<Self> {
        let dts = task.dts.as_ref()?;
        let strategy = if system.is_isolated_declarations() || dts.mode == DtsMode::Fast {
            DeclarationStrategy::Isolated
        } else {
            DeclarationStrategy::Program
        };
        if dts.kind == DtsKind::Bundle {
            debug!(format = %task.kind, "declaration rollup is external; emitting per-file declarations");
        }

        let resolver = SpecifierResolver::new(
            &system.cwd,
            &task.alias,
            paths.extension(),
            paths.less_compile(),
        );
        let program = ProgramConfig {
            cwd: system.cwd.clone(),
            extends: system.tsconfig.as_ref().map(|ts| ts.path.clone()),
            user_options: system
                .tsconfig
                .as_ref()
                .map(|ts| ts.compiler_options.clone())
                .unwrap_or_default(),
            src_dir: paths.src_dir().to_path_buf(),
            out_dir: paths.out_dir().to_path_buf(),
            exclude: task.exclude.clone(),
            label: task.kind.as_str().to_string(),
        };

        Some(Self {
            strategy,
            label: task.label(),
            paths,
            resolver,
            program,
            state: Mutex::new(EmitState::Idle),
        })
    }

    pub fn strategy(&self) -> DeclarationStrategy {
        self.strategy
    }

    pub fn state(&self) -> EmitState {
        *self.state.lock()
    }

    fn transition(&self, next: EmitState) {
        let mut state = self.state.lock();
        debug!(format = %self.label, from = ?*state, to = ?next, "declaration state");
        *state = next;
    }

    /// Whether `file` gets a declaration from [`Self::emit_file`].
    pub fn handles_file(&self, file: &Path) -> bool {
        self.strategy == DeclarationStrategy::Isolated && classify::is_typescript(file)
    }

    /// Isolated strategy: write the declaration of one source file.
    /// Returns `None` for files that have no declaration of their own.
    pub async fn emit_file(&self, file: &Path) -> Result<Option<PathBuf>> {
        if !self.handles_file(file) {
            return Ok(None);
        }
        let Some(rel) = self.paths.relative(file) else {
            return Ok(None);
        };
        let out_path = self.paths.declaration(rel);

        let source = fs::read_to_string(file).await.with_path(file, "read")?;
        let resolver = self.resolver.clone();
        let path = file.to_path_buf();
        let code =
            tokio::task::spawn_blocking(move || generate_declaration(&source, &path, &resolver))
                .await
                .map_err(|e| Error::Declaration {
                    path: file.to_path_buf(),
                    message: format!("task join error: {e}"),
                })??;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await.with_path(parent, "create")?;
        }
        fs::write(&out_path, code).await.with_path(&out_path, "write")?;
        Ok(Some(out_path))
    }

    /// Post-emit pass and state bookkeeping for one finished `tsc` batch.
    async fn complete_batch(&self, batch: BatchOutput) -> DeclarationReport {
        let errors = batch.error_count();
        self.transition(if errors == 0 {
            EmitState::EmitOk
        } else {
            EmitState::EmitWithDiagnostics
        });

        if !batch.diagnostics.is_empty() {
            error!(
                "{} declaration diagnostics ({} errors):\n{}",
                self.label,
                errors,
                batch.diagnostics.join("\n")
            );
        }

        let rewriter = DeclarationRewriter::new(&self.paths, &self.resolver);
        let written = rewriter.rewrite_all(&batch.emitted).await;
        self.transition(EmitState::Idle);

        DeclarationReport {
            written,
            diagnostics: batch.diagnostics,
            errors,
        }
    }

    /// Program strategy: one `tsc` run over the whole source tree.
    pub async fn emit_program(&self) -> Result<DeclarationReport> {
        let tool = NodeTool::locate(program::TSC, &self.program.cwd)?;
        self.transition(EmitState::Compiling);
        let batch = match program::run_once(&tool, &self.program).await {
            Ok(batch) => batch,
            Err(error) => {
                self.transition(EmitState::Idle);
                return Err(error);
            }
        };
        Ok(self.complete_batch(batch).await)
    }

    /// Program strategy in watch mode: keep one `tsc --watch` alive until
    /// `cancel` fires. `on_batch` runs after every completed batch.
    pub async fn watch_program<F>(
        self: Arc<Self>,
        cancel: CancellationToken,
        on_batch: F,
    ) -> Result<JoinHandle<()>>
    where
        F: Fn(&DeclarationReport) + Send + Sync + 'static,
    {
        let tool = NodeTool::locate(program::TSC, &self.program.cwd)?;
        let (mut child, mut lines) = program::spawn_watch(&tool, &self.program).await?;
        info!("watching declarations for {}", self.label);

        let handle = tokio::spawn(async move {
            let mut parser = WatchParser::default();
            loop {
                let line = tokio::select! {
                    _ = cancel.cancelled() => break,
                    line = lines.next_line() => line,
                };
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        warn!("{} exited while watching declarations", program::TSC);
                        break;
                    }
                    Err(error) => {
                        error!("reading {} output: {}", program::TSC, error);
                        break;
                    }
                };
                match parser.feed(&line) {
                    Some(WatchSignal::Started) => self.transition(EmitState::Compiling),
                    Some(WatchSignal::Finished(batch)) => {
                        let report = self.complete_batch(batch).await;
                        on_batch(&report);
                    }
                    None => {}
                }
            }
            if let Err(error) = child.kill().await {
                debug!("stopping {}: {}", program::TSC, error);
            }
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use lecp_config::{
        BuildMode, CssTask, DtsTask, FormatKind, JsxRuntime, LightningCssOptions, LogLevel,
        PackageJson, Targets,
    };
    use tempfile::TempDir;

    fn task(root: &Path, mode: DtsMode) -> FormatTask {
        FormatTask {
            kind: FormatKind::Esm,
            mode: BuildMode::Bundless,
            builder: "swc".to_string(),
            entry: root.join("src"),
            out_dir: root.join("es"),
            minify: false,
            dts: Some(DtsTask {
                kind: DtsKind::Bundless,
                mode,
                builder: "swc".to_string(),
            }),
            css: CssTask {
                css_modules: None,
                less_compile: true,
                less_options: IndexMap::new(),
                lightning_css: LightningCssOptions::default(),
            },
            shims: None,
            targets: Targets::from([("chrome".to_string(), "55".to_string())]),
            alias: IndexMap::new(),
            define: IndexMap::new(),
            exclude: Vec::new(),
            sourcemap: true,
            clean: true,
            external_helpers: false,
            jsx_runtime: JsxRuntime::Classic,
            name: None,
            file_name: None,
        }
    }

    fn system(root: &Path) -> SystemConfig {
        SystemConfig {
            cwd: root.to_path_buf(),
            watch: false,
            log_level: LogLevel::Info,
            package: PackageJson::default(),
            tsconfig: None,
        }
    }

    fn engine(root: &Path, mode: DtsMode) -> DeclarationEngine {
        let task = task(root, mode);
        DeclarationEngine::new(&task, &system(root), OutputPathMapper::new(&task, false)).unwrap()
    }

    #[test]
    fn strategy_follows_mode() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            engine(dir.path(), DtsMode::Fast).strategy(),
            DeclarationStrategy::Isolated
        );
        assert_eq!(
            engine(dir.path(), DtsMode::Normal).strategy(),
            DeclarationStrategy::Program
        );

        let mut no_dts = task(dir.path(), DtsMode::Normal);
        no_dts.dts = None;
        let paths = OutputPathMapper::new(&no_dts, false);
        assert!(DeclarationEngine::new(&no_dts, &system(dir.path()), paths).is_none());
    }

    #[tokio::test]
    async fn isolated_emit_writes_declaration() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src/util");
        std::fs::create_dir_all(&src).unwrap();
        let file = src.join("index.ts");
        std::fs::write(&file, "export const n: number = 1;\n").unwrap();
        std::fs::write(src.join("plain.js"), "export const n = 1;\n").unwrap();

        let engine = engine(dir.path(), DtsMode::Fast);
        let out = engine.emit_file(&file).await.unwrap();
        assert_eq!(out, Some(dir.path().join("es/util/index.d.ts")));
        let text = std::fs::read_to_string(dir.path().join("es/util/index.d.ts")).unwrap();
        assert!(text.contains("export declare const n: number;"), "{text}");

        assert_eq!(engine.emit_file(&src.join("plain.js")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn batches_settle_back_to_idle() {
        let dir = TempDir::new().unwrap();
        let engine = engine(dir.path(), DtsMode::Normal);
        assert_eq!(engine.state(), EmitState::Idle);

        engine.transition(EmitState::Compiling);
        let report = engine
            .complete_batch(BatchOutput {
                emitted: Vec::new(),
                diagnostics: vec!["src/a.ts(1,1): error TS1005: ';' expected.".to_string()],
            })
            .await;
        assert_eq!(report.errors, 1);
        assert_eq!(engine.state(), EmitState::Idle);
    }

    #[tokio::test]
    async fn program_emit_with_tsc() {
        let dir = TempDir::new().unwrap();
        if !NodeTool::is_available(program::TSC, dir.path()) {
            eprintln!("skipping: tsc not installed");
            return;
        }
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/index.ts"),
            "export * from './add';\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("src/add.ts"),
            "export const add = (a: number, b: number) => a + b;\n",
        )
        .unwrap();

        let engine = engine(dir.path(), DtsMode::Normal);
        let report = engine.emit_program().await.unwrap();
        assert_eq!(report.errors, 0, "{:?}", report.diagnostics);

        let index = std::fs::read_to_string(dir.path().join("es/index.d.ts")).unwrap();
        assert!(index.contains("./add.js"), "{index}");
        assert!(dir.path().join("es/add.d.ts.map").is_file());
        assert_eq!(engine.state(), EmitState::Idle);
    }
}
