//! Raw user configuration as written in `lecp.config.toml` / `lecp.config.json`.
//!
//! Every field is optional here. Defaults are applied later by the resolver so
//! that "not set" and "set to the default value" stay distinguishable through
//! the `extends` chain and per-format overrides.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Top-level config object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    /// Path of a parent config, relative to the directory of this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default)]
    pub format: Vec<FormatConfig>,

    #[serde(flatten)]
    pub shared: SharedOptions,
}

/// Options that may be set once for all formats or overridden per format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<IndexMap<String, TargetValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<IndexMap<String, AliasValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub define: Option<IndexMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<CssConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react: Option<ReactConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shims: Option<ShimsSetting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_helpers: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dts: Option<DtsSetting>,
}

impl SharedOptions {
    /// Layer `over` on top of `self`, field by field. Fields set in `over` win.
    pub fn overridden_by(&self, over: &SharedOptions) -> SharedOptions {
        SharedOptions {
            targets: over.targets.clone().or_else(|| self.targets.clone()),
            alias: over.alias.clone().or_else(|| self.alias.clone()),
            define: over.define.clone().or_else(|| self.define.clone()),
            css: match (&self.css, &over.css) {
                (Some(base), Some(top)) => Some(base.overridden_by(top)),
                (base, top) => top.clone().or_else(|| base.clone()),
            },
            react: match (&self.react, &over.react) {
                (Some(base), Some(top)) => Some(ReactConfig {
                    jsx_runtime: top.jsx_runtime.or(base.jsx_runtime),
                }),
                (base, top) => top.clone().or_else(|| base.clone()),
            },
            shims: over.shims.clone().or_else(|| self.shims.clone()),
            sourcemap: over.sourcemap.or(self.sourcemap),
            exclude: over.exclude.clone().or_else(|| self.exclude.clone()),
            clean: over.clean.or(self.clean),
            external_helpers: over.external_helpers.or(self.external_helpers),
            dts: over.dts.clone().or_else(|| self.dts.clone()),
        }
    }
}

/// Output module kind requested by a `format[]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Esm,
    Cjs,
    Umd,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Esm => "esm",
            FormatKind::Cjs => "cjs",
            FormatKind::Umd => "umd",
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// One output file per source file.
    Bundless,
    /// Hand the entry to a full bundler.
    Bundle,
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildMode::Bundless => f.write_str("bundless"),
            BuildMode::Bundle => f.write_str("bundle"),
        }
    }
}

/// One entry of the `format` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConfig {
    #[serde(rename = "type")]
    pub kind: FormatKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    /// Global name for bundle-mode UMD output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(flatten)]
    pub overrides: SharedOptions,
}

impl FormatConfig {
    pub fn new(kind: FormatKind) -> Self {
        Self {
            kind,
            mode: None,
            builder: None,
            entry: None,
            out_dir: None,
            minify: None,
            name: None,
            file_name: None,
            overrides: SharedOptions::default(),
        }
    }
}

/// A target version, written either as `"20.11.0"`, `55` or `true` (for ES shorthands).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl TargetValue {
    /// Normalized version string, `None` for flags.
    pub fn version(&self) -> Option<String> {
        match self {
            TargetValue::Text(s) => Some(s.clone()),
            TargetValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as u64)),
            TargetValue::Number(n) => Some(n.to_string()),
            TargetValue::Flag(_) => None,
        }
    }
}

/// Alias target: a single path or a list of candidate paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasValue {
    One(String),
    Many(Vec<String>),
}

impl AliasValue {
    /// First candidate path.
    pub fn primary(&self) -> Option<&str> {
        match self {
            AliasValue::One(s) => Some(s.as_str()),
            AliasValue::Many(list) => list.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_modules: Option<CssModulesSetting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_compile: Option<bool>,

    /// Forwarded to the LESS renderer as `--key=value` flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_options: Option<IndexMap<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lightning_css_options: Option<LightningCssOptions>,
}

impl CssConfig {
    fn overridden_by(&self, over: &CssConfig) -> CssConfig {
        CssConfig {
            css_modules: over.css_modules.clone().or_else(|| self.css_modules.clone()),
            less_compile: over.less_compile.or(self.less_compile),
            less_options: over
                .less_options
                .clone()
                .or_else(|| self.less_options.clone()),
            lightning_css_options: over
                .lightning_css_options
                .clone()
                .or_else(|| self.lightning_css_options.clone()),
        }
    }
}

/// Subset of lightningcss settings exposed to users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightningCssOptions {
    /// Skip invalid rules with a warning instead of failing the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_recovery: Option<bool>,

    /// Class names, ids and keyframes removed during minification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unused_symbols: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CssModulesSetting {
    Enabled(bool),
    Pattern(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    Classic,
    Automatic,
    Preserve,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx_runtime: Option<JsxRuntime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShimsSetting {
    Enabled(bool),
    Options(ShimsOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShimsOptions {
    /// Use `fileURLToPath(import.meta.url)` instead of `import.meta.dirname`.
    #[serde(default)]
    pub legacy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DtsSetting {
    Enabled(bool),
    Options(DtsOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtsOptions {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<DtsKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DtsMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtsKind {
    Bundless,
    Bundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtsMode {
    /// Whole-program emit through the type checker.
    Normal,
    /// Per-file isolated declarations.
    Fast,
}
