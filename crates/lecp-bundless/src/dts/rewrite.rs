//! Post-emit pass over declarations written by the type checker.
//!
//! `tsc` knows nothing about aliases or the `.cjs`/`.mjs` output
//! extensions, so each emitted `.d.ts` gets its specifiers patched in place
//! (spans only, formatting untouched), is renamed to the infix matching the
//! compiled script, and has its map `file` and `sourceMappingURL` fixed.

use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use tokio::fs;
use tracing::{debug, warn};

use crate::classify;
use crate::error::{IoResultExt, Result};
use crate::output_path::{OutputPathMapper, map_path};
use crate::script::specifier::{CollectSpecifiers, patch_text};
use crate::script::{RewriteMode, SpecifierResolver};
use crate::sourcemap::{SourceMapDocument, script_map_comment};

/// Source extensions a declaration may have come from, most likely first.
const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

const MAP_COMMENT: &str = "//# sourceMappingURL=";

/// `index.d.ts` -> `index`, `a.d.mts` -> `a`.
fn declaration_stem(name: &str) -> Option<&str> {
    [".d.ts", ".d.mts", ".d.cts"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
}

pub struct DeclarationRewriter<'a> {
    paths: &'a OutputPathMapper,
    resolver: &'a SpecifierResolver,
}

impl<'a> DeclarationRewriter<'a> {
    pub fn new(paths: &'a OutputPathMapper, resolver: &'a SpecifierResolver) -> Self {
        Self { paths, resolver }
    }

    /// Source file (relative to the entry directory) an emitted declaration
    /// belongs to. Falls back to a `.ts` name when the source is gone.
    fn source_for(&self, emitted: &Path) -> Option<PathBuf> {
        let rel = emitted.strip_prefix(self.paths.out_dir()).ok()?;
        let name = rel.file_name()?.to_str()?;
        let stem = declaration_stem(name)?;
        let dir = rel.parent().unwrap_or(Path::new(""));

        let found = SOURCE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{stem}.{ext}")))
            .find(|candidate| self.paths.src_dir().join(candidate).is_file());
        Some(found.unwrap_or_else(|| dir.join(format!("{stem}.ts"))))
    }

    /// Rewrite one declaration file (and its map, when present) emitted at
    /// `emitted`. Returns the final declaration path.
    pub async fn rewrite(&self, emitted: &Path) -> Result<PathBuf> {
        let Some(source_rel) = self.source_for(emitted) else {
            return Ok(emitted.to_path_buf());
        };
        let importer = self.paths.src_dir().join(&source_rel);
        let target = self.paths.declaration(&source_rel);

        let text = fs::read_to_string(emitted)
            .await
            .with_path(emitted, "read")?;
        let mut patched = self.patch_specifiers(&text, &importer);

        let emitted_map = map_path(emitted);
        let has_map = fs::try_exists(&emitted_map).await.unwrap_or(false);
        if has_map {
            patched = replace_map_comment(&patched, &target);
        }

        fs::write(&target, patched).await.with_path(&target, "write")?;
        if target != emitted {
            fs::remove_file(emitted).await.with_path(emitted, "remove")?;
        }

        if has_map {
            let raw = fs::read_to_string(&emitted_map)
                .await
                .with_path(&emitted_map, "read")?;
            let mut doc = SourceMapDocument::parse(&raw)?;
            doc.set_file(&target);
            let target_map = map_path(&target);
            fs::write(&target_map, doc.to_json()?)
                .await
                .with_path(&target_map, "write")?;
            if target_map != emitted_map {
                fs::remove_file(&emitted_map)
                    .await
                    .with_path(&emitted_map, "remove")?;
            }
        }

        debug!(from = %emitted.display(), to = %target.display(), "rewrote declaration");
        Ok(target)
    }

    fn patch_specifiers(&self, text: &str, importer: &Path) -> String {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, text, SourceType::d_ts()).parse();
        if !parsed.errors.is_empty() {
            warn!("cannot parse emitted declaration for {}", importer.display());
            return text.to_string();
        }
        let mut collect = CollectSpecifiers::default();
        collect.visit_program(&parsed.program);
        patch_text(text, &collect.found, |spec| {
            self.resolver.rewrite(importer, spec, RewriteMode::Both)
        })
    }

    /// Rewrite every declaration in `emitted`, skipping maps (handled with
    /// their declaration) and anything that is not a declaration.
    pub async fn rewrite_all(&self, emitted: &[PathBuf]) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for file in emitted.iter().filter(|f| classify::is_declaration(f)) {
            match self.rewrite(file).await {
                Ok(path) => written.push(path),
                Err(error) => warn!("{}", error),
            }
        }
        written
    }
}

/// Drop the type checker's trailing map comment and point a new one at
/// `target`'s map.
fn replace_map_comment(text: &str, target: &Path) -> String {
    let body = match text.trim_end().rfind('\n') {
        Some(index) if text[index + 1..].trim_start().starts_with(MAP_COMMENT) => &text[..index],
        None if text.trim_start().starts_with(MAP_COMMENT) => "",
        _ => text.trim_end(),
    };
    let mut out = body.to_string();
    out.push_str(&script_map_comment(target));
    out.push('\n');
    out
}
