//! Source map post-processing shared by every emitter.
//!
//! Only `file` and `sources` are ever touched. Everything else in the JSON
//! document is kept as-is, in its original key order.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMapDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl SourceMapDocument {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::SourceMap(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::SourceMap(e.to_string()))
    }

    /// Re-express every source relative to `out_dir`.
    ///
    /// Relative sources are first taken relative to `base` (usually the
    /// source file's directory). Sources without a leading `/` that name an
    /// existing absolute location are treated as absolute.
    pub fn relativize_sources(&mut self, out_dir: &Path, base: Option<&Path>) {
        let Some(sources) = self.sources.as_mut() else {
            return;
        };
        for source in sources.iter_mut() {
            let absolute = absolute_source(source, base);
            *source = relative_path(out_dir, &absolute);
        }
    }

    /// Point `file` at the emitted file's basename.
    pub fn set_file(&mut self, output: &Path) {
        self.file = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
    }
}

fn absolute_source(source: &str, base: Option<&Path>) -> std::path::PathBuf {
    let path = Path::new(source);
    if path.is_absolute() {
        return path_clean::clean(path);
    }
    // lightningcss drops the leading `/` from absolute sources
    let rooted = Path::new("/").join(source);
    if base.is_none() || rooted.exists() {
        return path_clean::clean(rooted);
    }
    match base {
        Some(base) => path_clean::clean(base.join(path)),
        None => path_clean::clean(rooted),
    }
}

/// `/`-separated relative path from `from_dir` to `to`.
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    pathdiff::diff_paths(to, from_dir)
        .unwrap_or_else(|| to.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

/// Rewrite a raw map for `output`: `file` gets the basename and `sources`
/// become relative to the output directory.
pub fn finalize_map(raw: &str, output: &Path, source_dir: Option<&Path>) -> Result<String> {
    let mut doc = SourceMapDocument::parse(raw)?;
    doc.set_file(output);
    let out_dir = output.parent().unwrap_or(Path::new("/"));
    doc.relativize_sources(out_dir, source_dir);
    doc.to_json()
}

/// JS trailer comment.
pub fn script_map_comment(output: &Path) -> String {
    format!("\n//# sourceMappingURL={}", map_name(output))
}

/// CSS trailer comment.
pub fn style_map_comment(output: &Path) -> String {
    format!("\n/*# sourceMappingURL={}*/", map_name(output))
}

fn map_name(output: &Path) -> String {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{name}.map")
}
