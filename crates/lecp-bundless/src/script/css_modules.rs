//! Default imports of CSS-module stylesheets.
//!
//! `import styles from './Demo.css'` turns into a side-effect import of the
//! compiled stylesheet and a frozen object literal with the generated class
//! names. Imports are found on the parsed module, so text that only looks
//! like an import (inside strings, template literals or comments) is left
//! alone. The replacement keeps the line count of the import it replaces so
//! line mappings of the rest of the file are untouched.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use oxc_allocator::Allocator;
use oxc_ast::ast::{ImportDeclaration, ImportDeclarationSpecifier};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};

const STYLE_EXTENSIONS: &[&str] = &[".css", ".less"];

/// One `import <local>[, { named }] from '<relative stylesheet>'` of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleImport {
    pub span: Span,
    pub local: String,
    /// `(imported, local)` pairs of named specifiers next to the default one.
    pub named: Vec<(String, String)>,
    /// Local name of a `* as ns` specifier next to the default one.
    pub namespace: Option<String>,
    pub specifier: String,
    pub quote: char,
}

impl StyleImport {
    /// Stylesheet path relative to the importing file.
    pub fn resolve(&self, importer: &Path) -> PathBuf {
        let dir = importer.parent().unwrap_or(Path::new("."));
        path_clean::clean(dir.join(&self.specifier))
    }

    fn replacement(&self, classes: &IndexMap<String, String>, original: &str) -> String {
        let object = serde_json::to_string(classes).unwrap_or_else(|_| "{}".to_string());
        let mut out = format!(
            "import {q}{spec}{q}; const {local} = Object.freeze({object});",
            q = self.quote,
            spec = self.specifier,
            local = self.local,
        );
        if !self.named.is_empty() {
            let bindings = self
                .named
                .iter()
                .map(|(imported, local)| {
                    if imported == local {
                        local.clone()
                    } else {
                        format!("{}: {local}", serde_json::to_string(imported).unwrap_or_default())
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(" const {{ {bindings} }} = {};", self.local));
        }
        if let Some(namespace) = &self.namespace {
            out.push_str(&format!(
                " const {namespace} = Object.freeze({{ ...{local}, default: {local} }});",
                local = self.local
            ));
        }
        for _ in original.matches('\n') {
            out.push('\n');
        }
        out
    }
}

fn is_relative_stylesheet(specifier: &str) -> bool {
    (specifier.starts_with("./") || specifier.starts_with("../"))
        && STYLE_EXTENSIONS.iter().any(|ext| specifier.ends_with(ext))
}

struct CollectStyleImports<'s> {
    source: &'s str,
    found: Vec<StyleImport>,
}

impl<'a> Visit<'a> for CollectStyleImports<'_> {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        if it.import_kind.is_type() || it.phase.is_some() {
            return;
        }
        let specifier = it.source.value.as_str();
        if !is_relative_stylesheet(specifier) {
            return;
        }
        let Some(specifiers) = &it.specifiers else {
            return;
        };

        let mut local = None;
        let mut named = Vec::new();
        let mut namespace = None;
        for item in specifiers {
            match item {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                    local = Some(default.local.name.to_string());
                }
                ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                    if !spec.import_kind.is_type() {
                        named.push((spec.imported.name().to_string(), spec.local.name.to_string()));
                    }
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(ns) => {
                    namespace = Some(ns.local.name.to_string());
                }
            }
        }
        let Some(local) = local else {
            return;
        };
        let quote = self
            .source
            .get(it.source.span.start as usize..)
            .and_then(|rest| rest.chars().next())
            .filter(|c| *c == '\'' || *c == '"')
            .unwrap_or('\'');

        self.found.push(StyleImport {
            span: it.span,
            local,
            named,
            namespace,
            specifier: specifier.to_string(),
            quote,
        });
    }
}

/// Default imports of relative stylesheets in `source`, in source order.
///
/// Unparseable sources yield nothing; the script compiler reports them.
pub fn scan(source: &str, path: &Path) -> Vec<StyleImport> {
    let Ok(source_type) = SourceType::from_path(path) else {
        return Vec::new();
    };
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type.with_module(true)).parse();
    if parsed.panicked {
        return Vec::new();
    }
    let mut collect = CollectStyleImports {
        source,
        found: Vec::new(),
    };
    collect.visit_program(&parsed.program);
    collect.found
}

/// Replace each import that has a class map. Imports without one are kept.
pub fn inline_class_maps(
    source: &str,
    imports: &[StyleImport],
    classes: &[Option<IndexMap<String, String>>],
) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for (import, classes) in imports.iter().zip(classes) {
        let Some(classes) = classes else {
            continue;
        };
        let (start, end) = (import.span.start as usize, import.span.end as usize);
        let Some(original) = source.get(start..end) else {
            continue;
        };
        if start < last {
            continue;
        }
        out.push_str(&source[last..start]);
        out.push_str(&import.replacement(classes, original));
        last = end;
    }
    out.push_str(&source[last..]);
    out
}
