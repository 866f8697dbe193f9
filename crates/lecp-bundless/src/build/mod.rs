//! Build orchestration.
//!
//! [`BuildOrchestrator`] runs every resolved format concurrently. A
//! bundless format is a [`FormatBuilder`]: it cleans its output directory,
//! walks the entry directory, compiles each file in a bounded task set and
//! then emits declarations. In watch mode it keeps a [`FileWatcher`] on the
//! entry directory whose events are handled one at a time, in order.

pub mod config_watch;
pub mod session;
pub mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use lecp_config::{BuildMode, ConfigResolver, FormatTask, SystemConfig, UserConfig};
use owo_colors::OwoColorize;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub use config_watch::{ConfigWatcher, RESTART_DEBOUNCE};
pub use session::WatchSession;
pub use watcher::{FileWatcher, WatchEvent, WatchEventKind};

use crate::bundle::{BundleBuilder, RolldownBundleBuilder};
use crate::classify::{self, FileKind};
use crate::dts::{DeclarationEngine, DeclarationStrategy};
use crate::error::{IoResultExt, Result};
use crate::exclude::ExcludeMatcher;
use crate::output_path::OutputPathMapper;
use crate::plan::{Capability, CompilePlan, Step, plan_for};
use crate::script::{ScriptOptions, ScriptTransformer, css_modules};
use crate::style::{LessRenderer, LesscRenderer, StyleOptions, StyleTransformer};
use crate::sourcemap::relative_path;

static COLOR: AtomicBool = AtomicBool::new(true);

/// Toggle ANSI colors in build log lines.
pub fn set_color(enabled: bool) {
    COLOR.store(enabled, Ordering::Relaxed);
}

fn paint_source(text: &str) -> String {
    if COLOR.load(Ordering::Relaxed) {
        text.yellow().to_string()
    } else {
        text.to_string()
    }
}

fn paint_output(text: &str) -> String {
    if COLOR.load(Ordering::Relaxed) {
        text.bright_black().to_string()
    } else {
        text.to_string()
    }
}

/// Outcome counts of one format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    pub label: String,
    pub compiled: usize,
    pub failed: usize,
    /// Scripts that were written but whose declaration failed.
    pub declarations_failed: usize,
}

/// One compiled source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFile {
    pub output: PathBuf,
    /// Set when the script was written but its declaration was not.
    pub declaration_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub formats: Vec<FormatReport>,
}

impl BuildSummary {
    pub fn failed(&self) -> usize {
        self.formats.iter().map(|f| f.failed).sum()
    }

    pub fn compiled(&self) -> usize {
        self.formats.iter().map(|f| f.compiled).sum()
    }

    pub fn declarations_failed(&self) -> usize {
        self.formats.iter().map(|f| f.declarations_failed).sum()
    }
}

/// Whether removing `out_dir` leaves `entry` and `cwd` in place.
pub fn is_safe_to_clean(out_dir: &Path, entry: &Path, cwd: &Path) -> bool {
    !entry.starts_with(out_dir) && !cwd.starts_with(out_dir)
}

/// Remove `out_dir`, unless it would take the sources or the project root
/// with it.
pub async fn clean_out_dir(out_dir: &Path, entry: &Path, cwd: &Path) -> Result<()> {
    if !is_safe_to_clean(out_dir, entry, cwd) {
        warn!(
            "not cleaning {}: it contains the sources or the project root",
            out_dir.display()
        );
        return Ok(());
    }
    match fs::remove_dir_all(out_dir).await {
        Ok(()) => {
            debug!(dir = %out_dir.display(), "cleaned output directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(crate::error::Error::io(out_dir, "clean", e)),
    }
}

/// Compiles one bundless format.
pub struct FormatBuilder {
    task: Arc<FormatTask>,
    system: Arc<SystemConfig>,
    paths: OutputPathMapper,
    exclude: ExcludeMatcher,
    scripts: ScriptTransformer,
    styles: StyleTransformer,
    declarations: Option<Arc<DeclarationEngine>>,
}

impl FormatBuilder {
    pub fn new(task: Arc<FormatTask>, system: Arc<SystemConfig>) -> Result<Self> {
        let less: Arc<dyn LessRenderer> = Arc::new(LesscRenderer::new(
            system.cwd.clone(),
            task.css.less_options.clone(),
        ));
        Self::with_less_renderer(task, system, less)
    }

    pub fn with_less_renderer(
        task: Arc<FormatTask>,
        system: Arc<SystemConfig>,
        less: Arc<dyn LessRenderer>,
    ) -> Result<Self> {
        let paths = OutputPathMapper::new(&task, system.package.is_module());
        let exclude = ExcludeMatcher::new(&task.exclude)?;
        let styles = StyleTransformer::new(less);
        let css_modules = task
            .css
            .css_modules
            .is_some()
            .then(|| StyleOptions::for_task(&task, PathBuf::new()));
        let scripts = ScriptTransformer::new(
            Arc::new(ScriptOptions::for_task(&task, &system, &paths)),
            styles.clone(),
            css_modules,
        );
        let declarations =
            DeclarationEngine::new(&task, &system, paths.clone()).map(Arc::new);

        Ok(Self {
            task,
            system,
            paths,
            exclude,
            scripts,
            styles,
            declarations,
        })
    }

    pub fn label(&self) -> String {
        self.task.label()
    }

    pub fn paths(&self) -> &OutputPathMapper {
        &self.paths
    }

    pub fn declarations(&self) -> Option<&Arc<DeclarationEngine>> {
        self.declarations.as_ref()
    }

    /// Remove the output directory, unless it would take sources with it.
    pub async fn clean(&self) -> Result<()> {
        clean_out_dir(self.paths.out_dir(), self.paths.src_dir(), &self.system.cwd).await
    }

    /// Every non-excluded file under the entry directory, sorted.
    pub fn collect_files(&self) -> Vec<PathBuf> {
        self.collect_under(self.paths.src_dir())
    }

    fn collect_under(&self, dir: &Path) -> Vec<PathBuf> {
        let src_dir = self.paths.src_dir();
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .path()
                    .strip_prefix(src_dir)
                    .map(|rel| rel.as_os_str().is_empty() || !self.exclude.is_excluded(rel))
                    .unwrap_or(false)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }

    pub fn plan(&self, rel: &Path) -> CompilePlan {
        let kind = classify::classify(rel, self.paths.less_compile());
        plan_for(
            &self.task,
            kind,
            classify::is_less(rel),
            self.system.package.is_module(),
        )
    }

    fn relative<'p>(&self, file: &'p Path) -> Result<&'p Path> {
        self.paths.relative(file).ok_or_else(|| crate::error::Error::Io {
            message: format!("{} is outside {}", file.display(), self.paths.src_dir().display()),
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        })
    }

    /// Compile or copy one source file according to its plan.
    pub async fn compile_file(&self, file: &Path) -> Result<CompiledFile> {
        let plan = self.plan(self.relative(file)?);
        self.run_plan(file, &plan).await
    }

    /// Run the steps of `plan` on `file`, in capability order.
    ///
    /// A failed declaration does not fail the file: the script is already
    /// written, so the error is reported on the returned [`CompiledFile`].
    pub async fn run_plan(&self, file: &Path, plan: &CompilePlan) -> Result<CompiledFile> {
        let rel = self.relative(file)?;
        let out_path = self.paths.output(rel);
        let mut declaration_error = None;

        for step in plan.steps() {
            match step {
                Step::Copy => {
                    if let Some(parent) = out_path.parent() {
                        fs::create_dir_all(parent).await.with_path(parent, "create")?;
                    }
                    fs::copy(file, &out_path).await.with_path(file, "copy")?;
                }
                Step::Style => {
                    let mut options = StyleOptions::for_task(&self.task, out_path.clone());
                    options.minify = plan.has(Capability::Minify);
                    self.styles.compile_style(file, &options).await?;
                }
                Step::Script => {
                    self.scripts.compile_script(file, plan, &out_path).await?;
                    if let Some(engine) = &self.declarations {
                        if let Err(e) = engine.emit_file(file).await {
                            error!("{}", e);
                            declaration_error = Some(e.to_string());
                        }
                    }
                }
            }
        }

        info!(
            "{}({}) {} to {}",
            self.task.mode,
            self.task.kind,
            paint_source(&relative_path(&self.system.cwd, file)),
            paint_output(&relative_path(&self.system.cwd, &out_path)),
        );
        Ok(CompiledFile {
            output: out_path,
            declaration_error,
        })
    }

    /// Scripts under the entry directory whose CSS-module imports resolve to
    /// `stylesheet`.
    pub async fn style_importers(&self, stylesheet: &Path) -> Vec<PathBuf> {
        let stylesheet = path_clean::clean(stylesheet);
        let mut importers = Vec::new();
        for file in self.collect_files() {
            if !classify::is_script(&file) {
                continue;
            }
            let Ok(source) = fs::read_to_string(&file).await else {
                continue;
            };
            let imports_it = css_modules::scan(&source, &file)
                .iter()
                .any(|import| import.resolve(&file) == stylesheet);
            if imports_it {
                importers.push(file);
            }
        }
        importers
    }

    /// Recompile the scripts that inlined the class map of `stylesheet`.
    async fn recompile_importers(&self, stylesheet: &Path) {
        if self.task.css.css_modules.is_none() {
            return;
        }
        for importer in self.style_importers(stylesheet).await {
            debug!(importer = %importer.display(), "class map changed");
            if let Err(e) = self.compile_file(&importer).await {
                error!("{}", e);
            }
        }
    }

    /// Compile every file, bounded by `limit`, then emit whole-program
    /// declarations when that strategy is active and not watching.
    pub async fn build_all(self: &Arc<Self>, limit: Arc<Semaphore>) -> FormatReport {
        let mut report = FormatReport {
            label: self.label(),
            ..Default::default()
        };
        let started = Instant::now();

        let mut set = JoinSet::new();
        for file in self.collect_files() {
            let this = Arc::clone(self);
            let limit = Arc::clone(&limit);
            set.spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                let result = this.compile_file(&file).await;
                (file, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(compiled))) => {
                    report.compiled += 1;
                    if compiled.declaration_error.is_some() {
                        report.declarations_failed += 1;
                    }
                }
                Ok((_, Err(e))) => {
                    error!("{}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!("file task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        if let Some(engine) = &self.declarations {
            if engine.strategy() == DeclarationStrategy::Program && !self.system.watch {
                info!("generate declarations for {}", report.label);
                let dts_started = Instant::now();
                match engine.emit_program().await {
                    Ok(dts) => info!(
                        "{} declarations generated in {}ms",
                        dts.written.len(),
                        dts_started.elapsed().as_millis()
                    ),
                    Err(e) => error!("{}", e),
                }
            }
        }

        info!(
            "{} finished in {}ms ({} files, {} failed, {} declarations failed)",
            report.label,
            started.elapsed().as_millis(),
            report.compiled,
            report.failed,
            report.declarations_failed
        );
        report
    }

    /// React to one change under the entry directory. Never fails; errors
    /// are logged.
    pub async fn handle_event(&self, event: WatchEvent) {
        if self.exclude.is_excluded(&event.path) {
            return;
        }
        debug!(kind = ?event.kind, path = %event.path.display(), "watch event");
        let file = self.paths.src_dir().join(&event.path);

        let result = match event.kind {
            WatchEventKind::Add if file.is_dir() => {
                for nested in self.collect_under(&file) {
                    if let Err(e) = self.compile_file(&nested).await {
                        error!("{}", e);
                    }
                }
                Ok(())
            }
            WatchEventKind::Add | WatchEventKind::Change => {
                let compiled = self.compile_file(&file).await.map(|_| ());
                if classify::classify(&event.path, self.paths.less_compile()) == FileKind::Style {
                    self.recompile_importers(&file).await;
                }
                compiled
            }
            WatchEventKind::Unlink if self.paths.directory(&event.path).is_dir() => {
                self.remove_dir(&event.path).await
            }
            WatchEventKind::Unlink => self.remove_outputs(&event.path).await,
            WatchEventKind::UnlinkDir => self.remove_dir(&event.path).await,
        };
        if let Err(e) = result {
            error!("{}", e);
        }
    }

    /// Remove everything `rel` may have produced.
    pub async fn remove_outputs(&self, rel: &Path) -> Result<()> {
        for path in self.paths.outputs(rel) {
            match fs::remove_file(&path).await {
                Ok(()) => info!("removed {}", paint_output(&relative_path(&self.system.cwd, &path))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(crate::error::Error::io(&path, "remove", e)),
            }
        }
        Ok(())
    }

    pub async fn remove_dir(&self, rel: &Path) -> Result<()> {
        let dir = self.paths.directory(rel);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("removed {}", paint_output(&relative_path(&self.system.cwd, &dir)));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(crate::error::Error::io(&dir, "remove", e)),
        }
    }

    /// Start the watch loop (and `tsc --watch` when needed) inside `session`.
    pub async fn watch(self: Arc<Self>, session: &mut WatchSession) -> Result<()> {
        let (watcher, mut events) = FileWatcher::new(self.paths.src_dir().to_path_buf())?;
        info!("watching {}", relative_path(&self.system.cwd, watcher.root()));

        if let Some(engine) = &self.declarations {
            if engine.strategy() == DeclarationStrategy::Program {
                let label = self.label();
                let handle = Arc::clone(engine)
                    .watch_program(session.token(), move |report| {
                        info!(
                            "{} declarations updated ({} files, {} errors)",
                            label,
                            report.written.len(),
                            report.errors
                        );
                    })
                    .await;
                match handle {
                    Ok(handle) => session.adopt(handle),
                    Err(e) => error!("{}", e),
                }
            }
        }

        let token = session.token();
        session.spawn(async move {
            let _watcher = watcher;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    },
                }
            }
        });
        Ok(())
    }
}

/// Runs all formats of one configuration.
pub struct BuildOrchestrator {
    system: Arc<SystemConfig>,
    bundler: Arc<dyn BundleBuilder>,
    less: Option<Arc<dyn LessRenderer>>,
    concurrency: usize,
}

impl BuildOrchestrator {
    pub fn new(system: SystemConfig) -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(8);
        Self {
            system: Arc::new(system),
            bundler: Arc::new(RolldownBundleBuilder),
            less: None,
            concurrency,
        }
    }

    pub fn with_bundler(mut self, bundler: Arc<dyn BundleBuilder>) -> Self {
        self.bundler = bundler;
        self
    }

    pub fn with_less_renderer(mut self, less: Arc<dyn LessRenderer>) -> Self {
        self.less = Some(less);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn system(&self) -> &SystemConfig {
        &self.system
    }

    /// Resolve `config` into format tasks and build them.
    pub async fn build_config(
        &self,
        config: &UserConfig,
        session: &mut WatchSession,
    ) -> Result<BuildSummary> {
        let tasks = ConfigResolver::new(&self.system).resolve(config)?;
        Ok(self.build(tasks, session).await)
    }

    /// Build every task concurrently. In watch mode, long-lived work is
    /// left running inside `session`.
    pub async fn build(&self, tasks: Vec<FormatTask>, session: &mut WatchSession) -> BuildSummary {
        info!("lecp start build");
        let limit = Arc::new(Semaphore::new(self.concurrency));

        let mut builders = Vec::new();
        let mut bundles = Vec::new();
        for task in tasks {
            let task = Arc::new(task);
            match task.mode {
                BuildMode::Bundless => {
                    let builder = match &self.less {
                        Some(less) => FormatBuilder::with_less_renderer(
                            Arc::clone(&task),
                            Arc::clone(&self.system),
                            Arc::clone(less),
                        ),
                        None => FormatBuilder::new(Arc::clone(&task), Arc::clone(&self.system)),
                    };
                    match builder {
                        Ok(builder) => builders.push(Arc::new(builder)),
                        Err(e) => error!("{}: {}", task.label(), e),
                    }
                }
                BuildMode::Bundle => bundles.push(task),
            }
        }

        let mut set = JoinSet::new();
        for builder in &builders {
            let builder = Arc::clone(builder);
            let limit = Arc::clone(&limit);
            set.spawn(async move {
                if builder.task.clean {
                    if let Err(e) = builder.clean().await {
                        error!("{}", e);
                    }
                }
                (builder.build_all(limit).await, None)
            });
        }

        for task in bundles {
            let bundler = Arc::clone(&self.bundler);
            let system = Arc::clone(&self.system);
            let token = session.token();
            set.spawn(async move {
                let mut report = FormatReport {
                    label: task.label(),
                    ..Default::default()
                };
                if task.clean {
                    if let Err(e) = clean_out_dir(&task.out_dir, &task.entry, &system.cwd).await {
                        warn!("{}", e);
                    }
                }
                match bundler.build(&task, &system, token).await {
                    Ok(handle) => {
                        report.compiled = 1;
                        (report, handle)
                    }
                    Err(e) => {
                        error!("{}", e);
                        report.failed = 1;
                        (report, None)
                    }
                }
            });
        }

        let mut summary = BuildSummary::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((report, handle)) => {
                    summary.formats.push(report);
                    if let Some(handle) = handle {
                        session.adopt(handle);
                    }
                }
                Err(e) => error!("format task failed: {}", e),
            }
        }

        if self.system.watch {
            for builder in builders {
                let label = builder.label();
                if let Err(e) = builder.watch(session).await {
                    error!("{}: {}", label, e);
                }
            }
        }
        summary
    }
}
