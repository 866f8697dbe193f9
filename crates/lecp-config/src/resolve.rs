//! Turns a loaded [`UserConfig`] into one fully-resolved [`FormatTask`] per format.
//!
//! Precedence, lowest first:
//!
//! 1. built-in defaults ([`crate::defaults`])
//! 2. shared options from the user config (and its `extends` chain)
//! 3. per-format overrides inside `format[]`
//!
//! Layering is plain field assignment over typed `Option`s; nothing is merged
//! dynamically.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::defaults::{
    DEFAULT_ALIAS, DEFAULT_BUNDLE_FILE_NAME, DEFAULT_NODE_TARGET, DEFAULT_WEB_TARGET,
    format_defaults,
};
use crate::error::{ConfigError, Result};
use crate::system::SystemConfig;
use crate::targets::{Targets, expand_targets};
use crate::user::{
    AliasValue, BuildMode, CssModulesSetting, DtsKind, DtsMode, DtsSetting, FormatConfig,
    FormatKind, JsxRuntime, LightningCssOptions, SharedOptions, ShimsOptions, ShimsSetting,
    UserConfig,
};

/// Resolved declaration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DtsTask {
    pub kind: DtsKind,
    pub mode: DtsMode,
    pub builder: String,
}

/// Resolved style settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CssTask {
    /// CSS-modules naming pattern, `None` when disabled.
    pub css_modules: Option<String>,
    pub less_compile: bool,
    pub less_options: IndexMap<String, serde_json::Value>,
    pub lightning_css: LightningCssOptions,
}

/// Everything one output layout needs. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatTask {
    pub kind: FormatKind,
    pub mode: BuildMode,
    pub builder: String,
    /// Absolute source directory (bundless) or entry path (bundle).
    pub entry: PathBuf,
    /// Absolute output directory.
    pub out_dir: PathBuf,
    pub minify: bool,
    pub dts: Option<DtsTask>,
    pub css: CssTask,
    pub shims: Option<ShimsOptions>,
    pub targets: Targets,
    pub alias: IndexMap<String, String>,
    pub define: IndexMap<String, String>,
    pub exclude: Vec<String>,
    pub sourcemap: bool,
    pub clean: bool,
    pub external_helpers: bool,
    pub jsx_runtime: JsxRuntime,
    /// Bundle mode only.
    pub name: Option<String>,
    /// Bundle mode only.
    pub file_name: Option<String>,
}

impl FormatTask {
    /// Whether the resolved targets include a Node engine.
    pub fn is_node_target(&self) -> bool {
        self.targets.contains_key("node")
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.mode, self.kind)
    }
}

/// Resolves user config against the process context.
pub struct ConfigResolver<'a> {
    system: &'a SystemConfig,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(system: &'a SystemConfig) -> Self {
        Self { system }
    }

    /// Produce one task per `format[]` entry, in declaration order.
    pub fn resolve(&self, config: &UserConfig) -> Result<Vec<FormatTask>> {
        if config.format.is_empty() {
            return Err(ConfigError::NoFormats);
        }

        let cjs_only = config.format.iter().all(|f| f.kind == FormatKind::Cjs);
        let shared = self.shared_with_project_defaults(&config.shared);

        config
            .format
            .iter()
            .map(|format| {
                let task = self.resolve_format(&shared, format, cjs_only)?;
                debug!(format = %task.kind, mode = %task.mode, out_dir = %task.out_dir.display(), "resolved format task");
                Ok(task)
            })
            .collect()
    }

    /// Shared layer with alias and jsx filled in from `tsconfig.json` where
    /// the user left them out. Explicit alias entries win key by key.
    fn shared_with_project_defaults(&self, shared: &SharedOptions) -> SharedOptions {
        let mut shared = shared.clone();
        let Some(tsconfig) = &self.system.tsconfig else {
            return shared;
        };

        let derived = tsconfig.alias(&self.system.cwd);
        if !derived.is_empty() {
            let mut alias = derived;
            for (key, value) in shared.alias.take().unwrap_or_default() {
                alias.insert(key, value);
            }
            shared.alias = Some(alias);
        }

        let explicit_jsx = shared.react.as_ref().and_then(|r| r.jsx_runtime);
        if explicit_jsx.is_none() {
            if let Some(runtime) = tsconfig.jsx_runtime() {
                shared.react.get_or_insert_with(Default::default).jsx_runtime = Some(runtime);
            }
        }

        shared
    }

    fn resolve_format(
        &self,
        shared: &SharedOptions,
        format: &FormatConfig,
        cjs_only: bool,
    ) -> Result<FormatTask> {
        let cwd = &self.system.cwd;
        let package = &self.system.package;
        let defaults = format_defaults(format.kind);
        let options = shared.overridden_by(&format.overrides);

        let mode = format.mode.unwrap_or(defaults.mode);
        let entry = absolutize(cwd, format.entry.as_deref().unwrap_or(defaults.entry));
        let out_dir = absolutize(cwd, format.out_dir.as_deref().unwrap_or(defaults.out_dir));

        let (name, file_name) = match mode {
            BuildMode::Bundle => (
                Some(format.name.clone().unwrap_or_else(|| package.name.clone())),
                Some(
                    format
                        .file_name
                        .clone()
                        .unwrap_or_else(|| DEFAULT_BUNDLE_FILE_NAME.to_string()),
                ),
            ),
            BuildMode::Bundless => (format.name.clone(), format.file_name.clone()),
        };

        let targets = match &options.targets {
            Some(raw) if !raw.is_empty() => expand_targets(raw),
            _ if cjs_only => Targets::from([("node".to_string(), DEFAULT_NODE_TARGET.to_string())]),
            _ => Targets::from([("chrome".to_string(), DEFAULT_WEB_TARGET.to_string())]),
        };

        let css = options.css.clone().unwrap_or_default();
        let css_modules = match css.css_modules {
            Some(CssModulesSetting::Enabled(true)) => {
                Some(format!("{}__[local]", package.flat_name()))
            }
            Some(CssModulesSetting::Pattern(pattern)) if !pattern.is_empty() => Some(pattern),
            _ => None,
        };

        // default, then tsconfig paths, then explicit entries
        let mut alias = IndexMap::from([(DEFAULT_ALIAS.0.to_string(), DEFAULT_ALIAS.1.to_string())]);
        if let Some(configured) = &options.alias {
            alias.extend(flatten_alias(configured));
        }

        let dts = self.resolve_dts(options.dts.as_ref().unwrap_or(&DtsSetting::Enabled(true)));

        Ok(FormatTask {
            kind: format.kind,
            mode,
            builder: format
                .builder
                .clone()
                .unwrap_or_else(|| defaults.builder.to_string()),
            entry,
            out_dir,
            minify: format.minify.unwrap_or(defaults.minify),
            dts,
            css: CssTask {
                css_modules,
                less_compile: css.less_compile.unwrap_or(true),
                less_options: css.less_options.unwrap_or_default(),
                lightning_css: css.lightning_css_options.unwrap_or_default(),
            },
            shims: match options.shims {
                Some(ShimsSetting::Enabled(true)) => Some(ShimsOptions { legacy: false }),
                Some(ShimsSetting::Options(opts)) => Some(opts),
                _ => None,
            },
            targets,
            alias,
            define: options.define.unwrap_or_default(),
            exclude: options.exclude.unwrap_or_default(),
            sourcemap: options.sourcemap.unwrap_or(true),
            clean: options.clean.unwrap_or(true),
            external_helpers: options.external_helpers.unwrap_or(false),
            jsx_runtime: options
                .react
                .and_then(|r| r.jsx_runtime)
                .unwrap_or(JsxRuntime::Classic),
            name,
            file_name,
        })
    }

    fn resolve_dts(&self, setting: &DtsSetting) -> Option<DtsTask> {
        let options = match setting {
            DtsSetting::Enabled(false) => return None,
            DtsSetting::Enabled(true) => Default::default(),
            DtsSetting::Options(options) => options.clone(),
        };
        let mode = if self.system.is_isolated_declarations() {
            DtsMode::Fast
        } else {
            options.mode.unwrap_or(DtsMode::Normal)
        };
        Some(DtsTask {
            kind: options.kind.unwrap_or(DtsKind::Bundless),
            mode,
            builder: options.builder.unwrap_or_else(|| "swc".to_string()),
        })
    }
}

fn absolutize(cwd: &Path, path: &str) -> PathBuf {
    path_clean::clean(cwd.join(path))
}

fn flatten_alias(alias: &IndexMap<String, AliasValue>) -> IndexMap<String, String> {
    alias
        .iter()
        .filter_map(|(key, value)| value.primary().map(|p| (key.clone(), p.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{PackageJson, PackageType};
    use crate::system::LogLevel;
    use serde_json::json;

    fn system(package_type: PackageType) -> SystemConfig {
        SystemConfig {
            cwd: PathBuf::from("/project"),
            watch: false,
            log_level: LogLevel::Info,
            package: PackageJson {
                name: "@demo/component".to_string(),
                package_type,
                ..Default::default()
            },
            tsconfig: None,
        }
    }

    fn config(value: serde_json::Value) -> UserConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn applies_per_format_defaults() {
        let sys = system(PackageType::Commonjs);
        let tasks = ConfigResolver::new(&sys)
            .resolve(&config(json!({ "format": [{"type": "esm"}, {"type": "cjs"}, {"type": "umd"}] })))
            .unwrap();

        assert_eq!(tasks[0].out_dir, PathBuf::from("/project/es"));
        assert_eq!(tasks[1].out_dir, PathBuf::from("/project/lib"));
        assert_eq!(tasks[2].out_dir, PathBuf::from("/project/umd"));
        assert_eq!(tasks[0].entry, PathBuf::from("/project/src"));
        assert_eq!(tasks[2].mode, BuildMode::Bundle);
        assert!(tasks[2].minify);
        assert_eq!(tasks[2].name.as_deref(), Some("@demo/component"));
        assert_eq!(tasks[2].file_name.as_deref(), Some("index"));
        assert!(tasks[0].name.is_none());
    }

    #[test]
    fn shared_defaults_fill_unset_options() {
        let sys = system(PackageType::Module);
        let task = &ConfigResolver::new(&sys)
            .resolve(&config(json!({ "format": [{"type": "esm"}] })))
            .unwrap()[0];

        assert!(task.sourcemap);
        assert!(task.clean);
        assert!(!task.external_helpers);
        assert!(task.css.less_compile);
        assert_eq!(task.jsx_runtime, JsxRuntime::Classic);
        assert_eq!(task.alias["@"], "./src");
        assert_eq!(
            task.dts,
            Some(DtsTask {
                kind: DtsKind::Bundless,
                mode: DtsMode::Normal,
                builder: "swc".to_string()
            })
        );
        assert!(task.shims.is_none());
    }

    #[test]
    fn default_alias_survives_configured_aliases() {
        let sys = system(PackageType::Module);
        let task = &ConfigResolver::new(&sys)
            .resolve(&config(json!({
                "format": [{"type": "esm"}],
                "alias": { "~utils": "./src/utils" }
            })))
            .unwrap()[0];

        assert_eq!(task.alias["@"], "./src");
        assert_eq!(task.alias["~utils"], "./src/utils");

        let task = &ConfigResolver::new(&sys)
            .resolve(&config(json!({
                "format": [{"type": "esm"}],
                "alias": { "@": "./lib" }
            })))
            .unwrap()[0];
        assert_eq!(task.alias["@"], "./lib");
    }

    #[test]
    fn es_shorthand_targets_are_not_node_targets() {
        let sys = system(PackageType::Module);
        let task = &ConfigResolver::new(&sys)
            .resolve(&config(json!({
                "format": [{"type": "cjs"}],
                "targets": { "es2020": true }
            })))
            .unwrap()[0];

        assert_eq!(task.targets["chrome"], "80");
        assert!(!task.targets.contains_key("node"));
        assert!(!task.is_node_target());
    }

    #[test]
    fn format_values_win_over_shared() {
        let sys = system(PackageType::Module);
        let tasks = ConfigResolver::new(&sys)
            .resolve(&config(json!({
                "sourcemap": false,
                "format": [{"type": "esm", "sourcemap": true, "outDir": "dist/es"}, {"type": "cjs"}]
            })))
            .unwrap();

        assert!(tasks[0].sourcemap);
        assert_eq!(tasks[0].out_dir, PathBuf::from("/project/dist/es"));
        assert!(!tasks[1].sourcemap);
    }

    #[test]
    fn normalizes_boolean_shorthands() {
        let sys = system(PackageType::Module);
        let task = &ConfigResolver::new(&sys)
            .resolve(&config(json!({
                "format": [{"type": "esm"}],
                "shims": true,
                "css": { "cssModules": true },
                "dts": false
            })))
            .unwrap()[0];

        assert_eq!(task.shims, Some(ShimsOptions { legacy: false }));
        assert_eq!(task.css.css_modules.as_deref(), Some("demo__component__[local]"));
        assert!(task.dts.is_none());
    }

    #[test]
    fn infers_targets_from_format_list() {
        let sys = system(PackageType::Commonjs);
        let resolver = ConfigResolver::new(&sys);

        let cjs_only = resolver
            .resolve(&config(json!({ "format": [{"type": "cjs"}] })))
            .unwrap();
        assert_eq!(cjs_only[0].targets["node"], DEFAULT_NODE_TARGET);
        assert!(cjs_only[0].is_node_target());

        let mixed = resolver
            .resolve(&config(json!({ "format": [{"type": "esm"}, {"type": "cjs"}] })))
            .unwrap();
        assert_eq!(mixed[1].targets["chrome"], "55");
        assert!(!mixed[1].is_node_target());
    }

    #[test]
    fn expands_es_targets() {
        let sys = system(PackageType::Module);
        let task = &ConfigResolver::new(&sys)
            .resolve(&config(json!({
                "format": [{"type": "esm"}],
                "targets": { "es2017": true, "node": "18" }
            })))
            .unwrap()[0];

        assert_eq!(task.targets["node"], "18");
        assert_eq!(task.targets["chrome"], "58");
    }

    #[test]
    fn empty_format_list_is_an_error() {
        let sys = system(PackageType::Module);
        let err = ConfigResolver::new(&sys)
            .resolve(&UserConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoFormats));
    }
}
