//! Per-task script options and their translation to oxc settings.

use std::path::PathBuf;

use indexmap::IndexMap;
use lecp_config::{FormatTask, JsxRuntime, ShimsOptions, SystemConfig, Targets};
use oxc_minifier::{CompressOptions, MangleOptions, MinifierOptions};
use oxc_transformer::{EngineTargets, JsxRuntime as OxcJsxRuntime, TransformOptions};
use serde_json::Value;
use tracing::warn;

use super::module_format::ModuleFormatOptions;
use super::specifier::SpecifierResolver;
use crate::output_path::OutputPathMapper;
use crate::plan::ModuleFormat;

/// Engines the script compiler understands. Others are dropped from the
/// target list rather than failing the build.
const SCRIPT_ENGINES: &[&str] = &[
    "chrome", "deno", "edge", "firefox", "hermes", "ie", "ios", "node", "opera", "rhino",
    "safari", "samsung",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoratorSettings {
    /// `experimentalDecorators`
    pub legacy: bool,
    /// `emitDecoratorMetadata`
    pub metadata: bool,
}

/// Everything the script compiler needs for one format.
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub cwd: PathBuf,
    pub format: ModuleFormat,
    pub targets: Targets,
    pub jsx_runtime: JsxRuntime,
    pub decorators: DecoratorSettings,
    pub define: IndexMap<String, String>,
    pub shims: Option<ShimsOptions>,
    pub minify: bool,
    pub sourcemap: bool,
    pub external_helpers: bool,
    /// Global name for UMD output.
    pub umd_name: Option<String>,
    pub resolver: SpecifierResolver,
}

impl ScriptOptions {
    pub fn for_task(task: &FormatTask, system: &SystemConfig, paths: &OutputPathMapper) -> Self {
        let compiler_option = |key: &str| {
            system
                .tsconfig
                .as_ref()
                .and_then(|ts| ts.compiler_options.get(key))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        let format = ModuleFormat::from(task.kind);
        let umd_name = (format == ModuleFormat::Umd).then(|| {
            task.name
                .as_deref()
                .map(lecp_config::package::camelize)
                .unwrap_or_else(|| system.package.global_name())
        });

        Self {
            cwd: system.cwd.clone(),
            format,
            targets: task.targets.clone(),
            jsx_runtime: task.jsx_runtime,
            decorators: DecoratorSettings {
                legacy: compiler_option("experimentalDecorators"),
                metadata: compiler_option("emitDecoratorMetadata"),
            },
            define: task.define.clone(),
            shims: task.shims.clone(),
            minify: task.minify,
            sourcemap: task.sourcemap,
            external_helpers: task.external_helpers,
            umd_name,
            resolver: SpecifierResolver::new(
                &system.cwd,
                &task.alias,
                paths.extension(),
                paths.less_compile(),
            ),
        }
    }

    /// `chrome55`, `node20.11.0`, ...
    pub fn target_list(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|(engine, _)| SCRIPT_ENGINES.contains(&engine.as_str()))
            .map(|(engine, version)| format!("{engine}{version}"))
            .collect()
    }

    fn engine_targets(&self) -> EngineTargets {
        EngineTargets::from_target_list(&self.target_list()).unwrap_or_else(|error| {
            warn!("ignoring script targets: {}", error);
            EngineTargets::default()
        })
    }

    pub fn transform_options(&self) -> TransformOptions {
        let mut options = TransformOptions::from_target_list(&self.target_list())
            .unwrap_or_else(|error| {
                warn!("ignoring script targets: {}", error);
                TransformOptions::default()
            });
        options.cwd = self.cwd.clone();

        match self.jsx_runtime {
            JsxRuntime::Classic => options.jsx.runtime = OxcJsxRuntime::Classic,
            JsxRuntime::Automatic => options.jsx.runtime = OxcJsxRuntime::Automatic,
            JsxRuntime::Preserve => options.jsx.jsx_plugin = false,
        }

        options.decorator.legacy = self.decorators.legacy;
        options.decorator.emit_decorator_metadata = self.decorators.metadata;
        options
    }

    pub fn minifier_options(&self) -> MinifierOptions {
        MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions {
                target: self.engine_targets(),
                ..CompressOptions::smallest()
            }),
        }
    }

    pub fn module_format_options(&self) -> ModuleFormatOptions {
        ModuleFormatOptions {
            external_helpers: self.external_helpers,
            umd_name: self.umd_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::OutputExtension;

    fn options(targets: &[(&str, &str)]) -> ScriptOptions {
        ScriptOptions {
            cwd: PathBuf::from("/p"),
            format: ModuleFormat::Esm,
            targets: targets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            jsx_runtime: JsxRuntime::Automatic,
            decorators: DecoratorSettings::default(),
            define: IndexMap::new(),
            shims: None,
            minify: false,
            sourcemap: true,
            external_helpers: false,
            umd_name: None,
            resolver: SpecifierResolver::new(
                std::path::Path::new("/p"),
                &IndexMap::new(),
                OutputExtension::Js,
                true,
            ),
        }
    }

    #[test]
    fn target_list_skips_unknown_engines() {
        let opts = options(&[("chrome", "55"), ("node", "20.11.0"), ("android", "4")]);
        assert_eq!(opts.target_list(), vec!["chrome55", "node20.11.0"]);
    }

    #[test]
    fn jsx_runtime_maps_to_transformer() {
        let mut opts = options(&[("chrome", "55")]);
        assert_eq!(opts.transform_options().jsx.runtime, OxcJsxRuntime::Automatic);

        opts.jsx_runtime = JsxRuntime::Classic;
        assert_eq!(opts.transform_options().jsx.runtime, OxcJsxRuntime::Classic);

        opts.jsx_runtime = JsxRuntime::Preserve;
        assert!(!opts.transform_options().jsx.jsx_plugin);
    }

    #[test]
    fn decorators_follow_settings() {
        let mut opts = options(&[("node", "20")]);
        opts.decorators = DecoratorSettings {
            legacy: true,
            metadata: true,
        };
        let transform = opts.transform_options();
        assert!(transform.decorator.legacy);
        assert!(transform.decorator.emit_decorator_metadata);
    }
}
