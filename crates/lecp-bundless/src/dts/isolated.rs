//! Per-file declarations through oxc isolated declarations.
//!
//! Only valid when every export carries an explicit type, which is what the
//! `isolatedDeclarations` compiler option guarantees. No declaration maps are
//! produced on this path.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_isolated_declarations::{IsolatedDeclarations, IsolatedDeclarationsOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use tracing::warn;

use crate::error::{Error, Result};
use crate::script::{RewriteMode, RewriteSpecifiers, SpecifierResolver};

fn declaration_error(path: &Path, message: impl Into<String>) -> Error {
    Error::Declaration {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Generate `.d.ts` text for the TypeScript `source` at `path`, with module
/// specifiers rewritten the same way as the compiled script.
///
/// Isolated-declaration diagnostics (missing annotations) are logged and
/// the best-effort output is still returned.
pub fn generate_declaration(
    source: &str,
    path: &Path,
    resolver: &SpecifierResolver,
) -> Result<String> {
    let allocator = Allocator::default();

    let source_type = SourceType::from_path(path)
        .map_err(|e| declaration_error(path, e.to_string()))?
        .with_module(true);

    let parsed = Parser::new(&allocator, source, source_type).parse();
    if !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(ToString::to_string).collect();
        return Err(declaration_error(path, messages.join("\n")));
    }

    let options = IsolatedDeclarationsOptions {
        strip_internal: true,
    };
    let ret = IsolatedDeclarations::new(&allocator, options).build(&parsed.program);
    if !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(ToString::to_string).collect();
        warn!(
            "declarations of {} are incomplete:\n{}",
            path.display(),
            messages.join("\n")
        );
    }

    let mut program = ret.program;
    RewriteSpecifiers::new(&allocator, resolver, path, RewriteMode::Both).run(&mut program);

    Ok(Codegen::new().build(&program).code)
}
