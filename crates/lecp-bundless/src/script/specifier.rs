//! Module specifier rewriting.
//!
//! Two independent rewrites:
//!
//! - **alias**: `@/util` becomes a path relative to the importing file
//! - **extension**: relative specifiers get the extension their target will
//!   have after compilation (`./a.ts` → `./a.mjs`, `./Demo` → `./Demo.js`,
//!   `./dir` → `./dir/index.cjs`, `./a.less` → `./a.css`)
//!
//! The same rules apply to scripts (through the AST) and to emitted
//! declaration files (through spans, so the type checker's formatting and
//! maps survive).

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lecp_config::tsconfig::relative_specifier;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration, ImportExpression,
    Program, StringLiteral, TSImportType,
};
use oxc_ast_visit::{Visit, VisitMut, walk, walk_mut};
use oxc_span::{Atom, Span};

use crate::classify;
use crate::extension::OutputExtension;

/// Source extensions probed for extensionless specifiers, in priority order.
const PROBE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

const SCRIPT_EXTENSIONS: &[&str] = PROBE_EXTENSIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Aliases only; extensions stay as written.
    Alias,
    /// Extensions only.
    Extension,
    Both,
}

impl RewriteMode {
    fn alias(self) -> bool {
        matches!(self, RewriteMode::Alias | RewriteMode::Both)
    }

    fn extension(self) -> bool {
        matches!(self, RewriteMode::Extension | RewriteMode::Both)
    }
}

#[derive(Debug, Clone)]
pub struct SpecifierResolver {
    /// Alias key to absolute target, longest key first.
    alias: Vec<(String, PathBuf)>,
    extension: OutputExtension,
    less_compile: bool,
}

impl SpecifierResolver {
    pub fn new(
        cwd: &Path,
        alias: &IndexMap<String, String>,
        extension: OutputExtension,
        less_compile: bool,
    ) -> Self {
        let mut alias: Vec<(String, PathBuf)> = alias
            .iter()
            .map(|(key, target)| (key.clone(), path_clean::clean(cwd.join(target))))
            .collect();
        alias.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            alias,
            extension,
            less_compile,
        }
    }

    pub fn has_alias(&self) -> bool {
        !self.alias.is_empty()
    }

    /// New specifier for `spec` imported from `importer`, or `None` when it
    /// stays as is.
    pub fn rewrite(&self, importer: &Path, spec: &str, mode: RewriteMode) -> Option<String> {
        let dir = importer.parent().unwrap_or(Path::new("."));
        let aliased = if mode.alias() {
            self.resolve_alias(dir, spec)
        } else {
            None
        };
        let current = aliased.as_deref().unwrap_or(spec);
        let extended = if mode.extension() {
            self.rewrite_extension(dir, current)
        } else {
            None
        };
        extended.or(aliased)
    }

    fn resolve_alias(&self, dir: &Path, spec: &str) -> Option<String> {
        self.alias.iter().find_map(|(key, target)| {
            let rest = if spec == key {
                ""
            } else {
                spec.strip_prefix(key.as_str())?.strip_prefix('/')?
            };
            let absolute = if rest.is_empty() {
                target.clone()
            } else {
                target.join(rest)
            };
            Some(relative_specifier(dir, &absolute))
        })
    }

    fn rewrite_extension(&self, dir: &Path, spec: &str) -> Option<String> {
        if !is_relative(spec) {
            return None;
        }
        let target = dir.join(spec);

        if let Some(stem) = spec.strip_suffix(".less") {
            return self.less_compile.then(|| format!("{stem}.css"));
        }

        let ext = Path::new(spec).extension().and_then(|e| e.to_str());
        if let Some(ext) = ext.filter(|e| SCRIPT_EXTENSIONS.contains(e)) {
            let stem = &spec[..spec.len() - ext.len() - 1];
            let source = self.locate_script(&target, ext);
            let out = self.output_extension_for(&source);
            return Some(format!("{stem}.{out}"));
        }

        // Extensionless: a sibling file first, then a directory index.
        if let Some(found) = probe(&target) {
            return Some(format!("{spec}.{}", self.output_extension_for(&found)));
        }
        if target.is_dir() {
            if let Some(found) = probe(&target.join("index")) {
                let spec = spec.trim_end_matches('/');
                return Some(format!("{spec}/index.{}", self.output_extension_for(&found)));
            }
        }
        None
    }

    /// Source file behind a specifier with a script extension. `./a.js` may
    /// name `./a.ts` the way TypeScript resolves it.
    fn locate_script(&self, target: &Path, ext: &str) -> PathBuf {
        if target.is_file() {
            return target.to_path_buf();
        }
        if matches!(ext, "js" | "jsx" | "mjs" | "cjs") {
            let alternatives: &[&str] = match ext {
                "mjs" => &["mts"],
                "cjs" => &["cts"],
                _ => &["ts", "tsx"],
            };
            for alt in alternatives {
                let candidate = target.with_extension(alt);
                if candidate.is_file() {
                    return candidate;
                }
            }
        }
        target.to_path_buf()
    }

    fn output_extension_for(&self, source: &Path) -> OutputExtension {
        if classify::is_jsx(source) {
            OutputExtension::Js
        } else {
            self.extension
        }
    }
}

fn is_relative(spec: &str) -> bool {
    spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
}

fn probe(base: &Path) -> Option<PathBuf> {
    PROBE_EXTENSIONS.iter().find_map(|ext| {
        let mut name = base.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        let candidate = PathBuf::from(name);
        candidate.is_file().then_some(candidate)
    })
}

/// Rewrites specifier literals of a program in place.
pub struct RewriteSpecifiers<'a, 'r> {
    allocator: &'a Allocator,
    resolver: &'r SpecifierResolver,
    importer: &'r Path,
    mode: RewriteMode,
    pub changed: usize,
}

impl<'a, 'r> RewriteSpecifiers<'a, 'r> {
    pub fn new(
        allocator: &'a Allocator,
        resolver: &'r SpecifierResolver,
        importer: &'r Path,
        mode: RewriteMode,
    ) -> Self {
        Self {
            allocator,
            resolver,
            importer,
            mode,
            changed: 0,
        }
    }

    pub fn run(mut self, program: &mut Program<'a>) -> usize {
        self.visit_program(program);
        self.changed
    }

    fn rewrite_literal(&mut self, literal: &mut StringLiteral<'a>) {
        if let Some(next) = self
            .resolver
            .rewrite(self.importer, literal.value.as_str(), self.mode)
        {
            literal.value = Atom::from(self.allocator.alloc_str(&next));
            literal.raw = None;
            self.changed += 1;
        }
    }
}

impl<'a> VisitMut<'a> for RewriteSpecifiers<'a, '_> {
    fn visit_import_declaration(&mut self, it: &mut ImportDeclaration<'a>) {
        self.rewrite_literal(&mut it.source);
    }

    fn visit_export_named_declaration(&mut self, it: &mut ExportNamedDeclaration<'a>) {
        if let Some(source) = &mut it.source {
            self.rewrite_literal(source);
        }
        walk_mut::walk_export_named_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &mut ExportAllDeclaration<'a>) {
        self.rewrite_literal(&mut it.source);
    }

    fn visit_import_expression(&mut self, it: &mut ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &mut it.source {
            self.rewrite_literal(literal);
        }
        walk_mut::walk_import_expression(self, it);
    }

    fn visit_ts_import_type(&mut self, it: &mut TSImportType<'a>) {
        self.rewrite_literal(&mut it.source);
        walk_mut::walk_ts_import_type(self, it);
    }
}

/// Specifier literals of a program with their spans, in source order.
#[derive(Default)]
pub struct CollectSpecifiers {
    pub found: Vec<(Span, String)>,
}

impl CollectSpecifiers {
    fn push(&mut self, literal: &StringLiteral<'_>) {
        self.found.push((literal.span, literal.value.to_string()));
    }
}

impl<'a> Visit<'a> for CollectSpecifiers {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        self.push(&it.source);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.push(source);
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.push(&it.source);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &it.source {
            self.push(literal);
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_ts_import_type(&mut self, it: &TSImportType<'a>) {
        self.push(&it.source);
        walk::walk_ts_import_type(self, it);
    }
}

/// Apply rewrites to raw text by span, keeping the original quote style.
pub fn patch_text(text: &str, found: &[(Span, String)], mut rewrite: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for (span, value) in found {
        let Some(next) = rewrite(value) else {
            continue;
        };
        let start = span.start as usize + 1;
        let end = (span.end as usize).saturating_sub(1);
        if start < last || end > text.len() || start > end {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push_str(&next);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}
