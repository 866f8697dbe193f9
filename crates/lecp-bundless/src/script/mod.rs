//! Script compilation on the oxc toolchain.
//!
//! One file at a time: parse, resolve specifiers, lower syntax for the
//! targets, substitute defines, add shims, project onto the output module
//! system, optionally minify, then print with a source map.

pub mod css_modules;
pub mod define;
pub mod module_format;
pub mod options;
pub mod shims;
pub mod snippet;
pub mod specifier;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::Minifier;
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::SourceType;
use oxc_transformer::Transformer;
use tokio::fs;
use tracing::{debug, warn};

pub use define::Defines;
pub use module_format::{ModuleFormatOptions, to_commonjs};
pub use options::{DecoratorSettings, ScriptOptions};
pub use shims::Shims;
pub use specifier::{RewriteMode, RewriteSpecifiers, SpecifierResolver};

use crate::error::{Error, IoResultExt, Result};
use crate::plan::{Capability, CompilePlan, ModuleFormat, Stage};
use crate::sourcemap::{finalize_map, script_map_comment};
use crate::style::{StyleOptions, StyleTransformer};

/// Printed output of one script.
#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub code: String,
    /// Raw map JSON, sources still absolute.
    pub map: Option<String>,
}

fn render<E: ToString>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn compile_error(path: &Path, message: impl Into<String>) -> Error {
    Error::Compile {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Compile `source` (the contents of `path`) according to `plan`.
pub fn compile_source(
    source: &str,
    path: &Path,
    plan: &CompilePlan,
    options: &ScriptOptions,
) -> Result<TransformResult> {
    let source_type = SourceType::from_path(path)
        .map_err(|e| compile_error(path, e.to_string()))?
        .with_module(true);

    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type).parse();
    if !parsed.errors.is_empty() {
        return Err(compile_error(path, render(&parsed.errors)));
    }
    let mut program = parsed.program;

    let mut scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();

    let resolve = plan.has(Capability::Resolve);
    for stage in &plan.stages {
        scoping = match stage {
            Stage::Single => {
                let mode = resolve.then_some(RewriteMode::Both);
                let scoping = lower(&allocator, &mut program, scoping, path, options, plan, mode)?;
                project(&allocator, &mut program, scoping, path, options, plan, None)?
            }
            Stage::Canonical => {
                let mode = resolve.then_some(RewriteMode::Alias);
                lower(&allocator, &mut program, scoping, path, options, plan, mode)?
            }
            Stage::Project => project(
                &allocator,
                &mut program,
                scoping,
                path,
                options,
                plan,
                resolve.then_some(RewriteMode::Extension),
            )?,
        };
    }

    let minify = plan.has(Capability::Minify);
    let scoping = if minify {
        Minifier::new(options.minifier_options())
            .minify(&allocator, &mut program)
            .scoping
    } else {
        Some(scoping)
    };

    let mut codegen_options = if minify {
        CodegenOptions::minify()
    } else {
        CodegenOptions::default()
    };
    if options.sourcemap {
        codegen_options.source_map_path = Some(path.to_path_buf());
    }
    let printed = Codegen::new()
        .with_options(codegen_options)
        .with_scoping(scoping)
        .build(&program);

    Ok(TransformResult {
        code: printed.code,
        map: printed.map.map(|map| map.to_json_string()),
    })
}

/// Resolve specifiers, strip types and lower syntax, apply defines.
///
/// Specifiers are left alone without a `mode`; syntax is left alone when the
/// plan has no [`Capability::Script`].
fn lower<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    scoping: Scoping,
    path: &Path,
    options: &ScriptOptions,
    plan: &CompilePlan,
    mode: Option<RewriteMode>,
) -> Result<Scoping> {
    if let Some(mode) = mode {
        let rewritten =
            RewriteSpecifiers::new(allocator, &options.resolver, path, mode).run(program);
        if rewritten > 0 {
            debug!(file = %path.display(), rewritten, "rewrote specifiers");
        }
    }

    let scoping = if plan.has(Capability::Script) {
        let transformed = Transformer::new(allocator, path, &options.transform_options())
            .build_with_scoping(scoping, program);
        if !transformed.errors.is_empty() {
            return Err(compile_error(path, render(&transformed.errors)));
        }
        transformed.scoping
    } else {
        scoping
    };

    let defines = Defines::new(&options.define);
    if defines.is_empty() {
        return Ok(scoping);
    }
    defines
        .apply(allocator, program, scoping)
        .map_err(|message| compile_error(path, message))
}

/// Final extensions, shims and the module system of the output.
fn project<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    scoping: Scoping,
    path: &Path,
    options: &ScriptOptions,
    plan: &CompilePlan,
    mode: Option<RewriteMode>,
) -> Result<Scoping> {
    if let Some(mode) = mode {
        RewriteSpecifiers::new(allocator, &options.resolver, path, mode).run(program);
    }

    let format = plan.module_format().unwrap_or(ModuleFormat::Esm);
    if let Some(shims) = &options.shims {
        Shims {
            format,
            legacy: shims.legacy,
        }
        .apply(allocator, program, &scoping)
        .map_err(|message| compile_error(path, message))?;
    }

    if format != ModuleFormat::Esm {
        to_commonjs(allocator, program, &scoping, &options.module_format_options())
            .map_err(|message| compile_error(path, message))?;
    }
    Ok(scoping)
}

/// Compiles scripts of one format and writes them next to their maps.
#[derive(Debug, Clone)]
pub struct ScriptTransformer {
    options: Arc<ScriptOptions>,
    styles: StyleTransformer,
    /// Set when CSS modules are enabled.
    css_modules: Option<StyleOptions>,
}

impl ScriptTransformer {
    pub fn new(
        options: Arc<ScriptOptions>,
        styles: StyleTransformer,
        css_modules: Option<StyleOptions>,
    ) -> Self {
        Self {
            options,
            styles,
            css_modules,
        }
    }

    pub fn options(&self) -> &ScriptOptions {
        &self.options
    }

    /// Replace default imports of CSS-module stylesheets with class maps.
    async fn inline_css_modules(&self, file: &Path, source: String) -> String {
        let Some(style_options) = &self.css_modules else {
            return source;
        };
        let imports = css_modules::scan(&source, file);
        if imports.is_empty() {
            return source;
        }

        let mut classes = Vec::with_capacity(imports.len());
        for import in &imports {
            let stylesheet = import.resolve(file);
            if !stylesheet.is_file() {
                classes.push(None);
                continue;
            }
            match self.styles.class_map(&stylesheet, style_options).await {
                Ok(map) => classes.push(Some(map)),
                Err(error) => {
                    warn!("css modules of {}: {}", stylesheet.display(), error);
                    classes.push(None);
                }
            }
        }
        css_modules::inline_class_maps(&source, &imports, &classes)
    }

    /// Compile `file` in memory.
    pub async fn transform(&self, file: &Path, plan: &CompilePlan) -> Result<TransformResult> {
        let source = fs::read_to_string(file).await.with_path(file, "read")?;
        let source = self.inline_css_modules(file, source).await;

        let options = Arc::clone(&self.options);
        let path = file.to_path_buf();
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || compile_source(&source, &path, &plan, &options))
            .await
            .map_err(|e| compile_error(file, format!("task join error: {e}")))?
    }

    /// Compile `file` and write `out_path` plus `<out_path>.map`.
    pub async fn compile_script(
        &self,
        file: &Path,
        plan: &CompilePlan,
        out_path: &Path,
    ) -> Result<PathBuf> {
        let TransformResult { mut code, map } = self.transform(file, plan).await?;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await.with_path(parent, "create")?;
        }

        if let Some(map) = map {
            let map = finalize_map(&map, out_path, file.parent())?;
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(script_map_comment(out_path).trim_start_matches('\n'));
            code.push('\n');
            let map_path = crate::output_path::map_path(out_path);
            fs::write(&map_path, map).await.with_path(&map_path, "write")?;
        }

        fs::write(out_path, code).await.with_path(out_path, "write")?;
        Ok(out_path.to_path_buf())
    }
}
