//! LESS rendering.
//!
//! LESS is compiled by an external renderer. The default one runs the
//! project's `lessc`; the inline source map it prints is lifted out of the
//! CSS and handed to the lightningcss stage for chaining.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use parcel_sourcemap::SourceMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::tool::NodeTool;

const MAP_COMMENT: &str = "/*# sourceMappingURL=";

/// CSS produced from a LESS file.
#[derive(Debug, Clone, Default)]
pub struct LessOutput {
    pub code: String,
    /// JSON source map, when one was requested.
    pub map: Option<String>,
}

#[async_trait]
pub trait LessRenderer: Send + Sync {
    async fn render(&self, file: &Path, sourcemap: bool) -> Result<LessOutput>;
}

/// Renderer backed by the `lessc` command.
#[derive(Debug, Clone)]
pub struct LesscRenderer {
    cwd: PathBuf,
    options: IndexMap<String, Value>,
}

impl LesscRenderer {
    pub fn new(cwd: impl Into<PathBuf>, options: IndexMap<String, Value>) -> Self {
        Self {
            cwd: cwd.into(),
            options,
        }
    }

    fn args(&self, file: &Path, sourcemap: bool) -> Vec<String> {
        let mut args = less_option_flags(&self.options);
        if sourcemap {
            args.push("--source-map-map-inline".to_string());
            args.push("--source-map-include-source".to_string());
        }
        args.push(file.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl LessRenderer for LesscRenderer {
    async fn render(&self, file: &Path, sourcemap: bool) -> Result<LessOutput> {
        let tool = NodeTool::locate("lessc", &self.cwd)?;
        let stdout = tool
            .output(&self.cwd, &self.args(file, sourcemap))
            .await
            .map_err(|e| Error::Style {
                path: file.to_path_buf(),
                message: e.to_string(),
            })?;

        let (code, url) = split_inline_map(&stdout);
        let map = match (sourcemap, url) {
            (true, Some(url)) => {
                let mut map = SourceMap::from_data_url("/", url).map_err(|e| Error::Style {
                    path: file.to_path_buf(),
                    message: format!("unreadable lessc source map: {e}"),
                })?;
                Some(map.to_json(None).map_err(|e| Error::SourceMap(e.to_string()))?)
            }
            _ => None,
        };
        Ok(LessOutput { code, map })
    }
}

/// Separate a trailing `/*# sourceMappingURL=... */` comment from the CSS.
fn split_inline_map(css: &str) -> (String, Option<&str>) {
    let Some(start) = css.rfind(MAP_COMMENT) else {
        return (css.to_string(), None);
    };
    let rest = &css[start + MAP_COMMENT.len()..];
    let url = rest.find("*/").map(|end| rest[..end].trim());
    (css[..start].trim_end().to_string() + "\n", url)
}

/// `lessOptions` as `lessc` flags.
///
/// Booleans become bare `--flag` / `--no-flag`, objects of variables become
/// repeated `--global-var` / `--modify-var`, everything else `--key=value`.
pub fn less_option_flags(options: &IndexMap<String, Value>) -> Vec<String> {
    let mut flags = Vec::new();
    for (key, value) in options {
        let name = match key.as_str() {
            "javascriptEnabled" => "js".to_string(),
            "paths" => "include-path".to_string(),
            "globalVars" => "global-var".to_string(),
            "modifyVars" => "modify-var".to_string(),
            other => kebab_case(other),
        };
        match value {
            Value::Bool(true) => flags.push(format!("--{name}")),
            Value::Bool(false) => flags.push(format!("--no-{name}")),
            Value::Object(vars) => {
                for (var, var_value) in vars {
                    flags.push(format!("--{name}={var}={}", scalar(var_value)));
                }
            }
            Value::Array(items) => {
                let joined: Vec<String> = items.iter().map(scalar).collect();
                let separator = if cfg!(windows) { ";" } else { ":" };
                flags.push(format!("--{name}={}", joined.join(separator)));
            }
            Value::Null => {}
            other => flags.push(format!("--{name}={}", scalar(other))),
        }
    }
    flags
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
