//! File classification by extension.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.css` / `.less`
    Style,
    /// `.js .jsx .ts .tsx .cjs .mjs .cts .mts` that is not a declaration
    Script,
    /// `.d.ts .d.cts .d.mts`; never transformed on its own
    Declaration,
    /// Anything else, copied verbatim
    Asset,
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

pub fn is_less(path: &Path) -> bool {
    file_name(path).ends_with(".less")
}

pub fn is_css(path: &Path) -> bool {
    file_name(path).ends_with(".css")
}

pub fn is_style(path: &Path) -> bool {
    is_less(path) || is_css(path)
}

pub fn is_declaration(path: &Path) -> bool {
    let name = file_name(path);
    [".d.ts", ".d.cts", ".d.mts"]
        .iter()
        .any(|suffix| name.ends_with(suffix) && name.len() > suffix.len())
}

pub fn is_script(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(ext, "js" | "jsx" | "ts" | "tsx" | "cjs" | "mjs" | "cts" | "mts") && !is_declaration(path)
}

/// `.jsx` / `.tsx` sources always produce plain `.js`.
pub fn is_jsx(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsx" | "tsx")
    )
}

/// Files the type checker or the isolated declaration backend can read.
pub fn is_typescript(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts" | "tsx" | "mts" | "cts")
    ) && !is_declaration(path)
}

/// Classify a source file. LESS counts as an asset when LESS compilation is off.
pub fn classify(path: &Path, less_compile: bool) -> FileKind {
    if is_css(path) || (is_less(path) && less_compile) {
        FileKind::Style
    } else if is_declaration(path) {
        FileKind::Declaration
    } else if is_script(path) {
        FileKind::Script
    } else {
        FileKind::Asset
    }
}
