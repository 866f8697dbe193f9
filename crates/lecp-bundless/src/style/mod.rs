//! Style compilation: optional LESS render, then lightningcss.

mod css;
mod less;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use lecp_config::{FormatTask, Targets};
use tokio::fs;

pub use css::{CssJob, CssOutput, browsers, transform_css};
pub use less::{LessOutput, LessRenderer, LesscRenderer, less_option_flags};

use crate::classify;
use crate::error::{Error, IoResultExt, Result};
use crate::sourcemap::{finalize_map, style_map_comment};

/// Per-file style options derived from the format task.
#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub out_path: PathBuf,
    pub sourcemap: bool,
    pub targets: Targets,
    pub css_modules: Option<String>,
    pub minify: bool,
    pub error_recovery: bool,
    pub unused_symbols: Vec<String>,
}

impl StyleOptions {
    pub fn for_task(task: &FormatTask, out_path: PathBuf) -> Self {
        Self {
            out_path,
            sourcemap: task.sourcemap,
            targets: task.targets.clone(),
            css_modules: task.css.css_modules.clone(),
            minify: task.minify,
            error_recovery: task.css.lightning_css.error_recovery.unwrap_or(false),
            unused_symbols: task
                .css
                .lightning_css
                .unused_symbols
                .clone()
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct StyleTransformer {
    less: Arc<dyn LessRenderer>,
}

impl std::fmt::Debug for StyleTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleTransformer").finish_non_exhaustive()
    }
}

impl StyleTransformer {
    pub fn new(less: Arc<dyn LessRenderer>) -> Self {
        Self { less }
    }

    /// Transformer using `lessc` from the project at `cwd`.
    pub fn for_task(cwd: &Path, task: &FormatTask) -> Self {
        Self::new(Arc::new(LesscRenderer::new(cwd, task.css.less_options.clone())))
    }

    /// Run the pipeline in memory. The map's sources are still absolute.
    pub async fn transform(&self, file: &Path, options: &StyleOptions) -> Result<CssOutput> {
        let (code, input_map) = if classify::is_less(file) {
            let rendered = self.less.render(file, options.sourcemap).await?;
            (rendered.code, rendered.map)
        } else {
            let code = fs::read_to_string(file).await.with_path(file, "read")?;
            (code, None)
        };

        let job = CssJob {
            filename: file.to_string_lossy().into_owned(),
            code,
            input_map,
            sourcemap: options.sourcemap,
            targets: options.targets.clone(),
            css_modules: options.css_modules.clone(),
            minify: options.minify,
            error_recovery: options.error_recovery,
            unused_symbols: options.unused_symbols.clone(),
        };

        let path = file.to_path_buf();
        tokio::task::spawn_blocking(move || transform_css(&job))
            .await
            .map_err(|e| Error::Style {
                path: path.clone(),
                message: format!("task join error: {e}"),
            })?
            .map_err(|message| Error::Style { path, message })
    }

    /// Compile `file` and write `<out>.css` plus `<out>.css.map`.
    pub async fn compile_style(&self, file: &Path, options: &StyleOptions) -> Result<()> {
        let CssOutput { mut code, map, .. } = self.transform(file, options).await?;
        let out_path = &options.out_path;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await.with_path(parent, "create")?;
        }

        if let Some(map) = map {
            let map = finalize_map(&map, out_path, None)?;
            code.push_str(&style_map_comment(out_path));
            let map_path = crate::output_path::map_path(out_path);
            fs::write(&map_path, map).await.with_path(&map_path, "write")?;
        }

        fs::write(out_path, code).await.with_path(out_path, "write")?;
        Ok(())
    }

    /// Class map of a CSS-module stylesheet, computed with the same pipeline
    /// as [`StyleTransformer::compile_style`] so both sides agree on names.
    pub async fn class_map(
        &self,
        file: &Path,
        options: &StyleOptions,
    ) -> Result<IndexMap<String, String>> {
        let options = StyleOptions {
            sourcemap: false,
            ..options.clone()
        };
        Ok(self.transform(file, &options).await?.exports)
    }
}
