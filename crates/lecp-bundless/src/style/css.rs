//! lightningcss stage: target lowering, CSS-module renaming, minification
//! and source maps.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use lecp_config::Targets;
use lecp_config::targets::major_minor_patch;
use lightningcss::css_modules::{self, CssModuleExports, CssModuleReference, Pattern};
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets as CssTargets};
use parcel_sourcemap::SourceMap;
use tracing::warn;

/// Everything one lightningcss run needs, owned so it can move onto a
/// blocking thread.
#[derive(Debug, Clone, Default)]
pub struct CssJob {
    pub filename: String,
    pub code: String,
    /// Map from an earlier stage (LESS), chained onto the output map.
    pub input_map: Option<String>,
    pub sourcemap: bool,
    pub targets: Targets,
    pub css_modules: Option<String>,
    pub minify: bool,
    pub error_recovery: bool,
    pub unused_symbols: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CssOutput {
    pub code: String,
    /// Raw JSON map, sources still absolute (without the leading `/`).
    pub map: Option<String>,
    /// Local class name to generated class list, sorted by local name.
    pub exports: IndexMap<String, String>,
}

/// Browser versions in the packed `major << 16 | minor << 8 | patch` form.
pub fn browsers(targets: &Targets) -> Option<Browsers> {
    let mut browsers = Browsers::default();
    let mut any = false;
    for (engine, version) in targets {
        let (major, minor, patch) = major_minor_patch(version);
        let packed = Some((major << 16) | (minor << 8) | patch);
        let slot = match engine.as_str() {
            "chrome" => &mut browsers.chrome,
            "firefox" => &mut browsers.firefox,
            "safari" => &mut browsers.safari,
            "ios" | "ios_saf" => &mut browsers.ios_saf,
            "edge" => &mut browsers.edge,
            "opera" => &mut browsers.opera,
            "samsung" => &mut browsers.samsung,
            "android" => &mut browsers.android,
            "ie" => &mut browsers.ie,
            _ => continue,
        };
        *slot = packed;
        any = true;
    }
    any.then_some(browsers)
}

pub fn transform_css(job: &CssJob) -> Result<CssOutput, String> {
    let pattern_text = job.css_modules.clone();
    let css_modules = match &pattern_text {
        Some(pattern) => Some(css_modules::Config {
            pattern: Pattern::parse(pattern)
                .map_err(|e| format!("invalid cssModules pattern `{pattern}`: {e}"))?,
            ..Default::default()
        }),
        None => None,
    };

    let warnings = Arc::new(RwLock::new(Vec::new()));
    let mut stylesheet = StyleSheet::parse(
        &job.code,
        ParserOptions {
            filename: job.filename.clone(),
            css_modules,
            error_recovery: job.error_recovery,
            warnings: Some(warnings.clone()),
            ..Default::default()
        },
    )
    .map_err(|e| e.to_string())?;

    let targets = CssTargets {
        browsers: browsers(&job.targets),
        ..Default::default()
    };

    stylesheet
        .minify(MinifyOptions {
            targets,
            unused_symbols: job.unused_symbols.iter().cloned().collect::<HashSet<_>>(),
        })
        .map_err(|e| e.to_string())?;

    let mut source_map = job.sourcemap.then(|| SourceMap::new("/"));
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: job.minify,
            source_map: source_map.as_mut(),
            targets,
            ..Default::default()
        })
        .map_err(|e| e.to_string())?;

    if let Ok(warnings) = warnings.read() {
        for warning in warnings.iter() {
            warn!("{}: {}", job.filename, warning);
        }
    }

    let map = match source_map.as_mut() {
        Some(map) => Some(finish_map(map, job)?),
        None => None,
    };

    Ok(CssOutput {
        code: result.code,
        map,
        exports: result.exports.map(class_names).unwrap_or_default(),
    })
}

fn finish_map(map: &mut SourceMap, job: &CssJob) -> Result<String, String> {
    if let Some(input) = &job.input_map {
        let mut original = SourceMap::from_json("/", input).map_err(|e| e.to_string())?;
        map.extends(&mut original).map_err(|e| e.to_string())?;
    }
    map.to_json(None).map_err(|e| e.to_string())
}

/// Flatten lightningcss exports into `local -> "generated composed..."`.
fn class_names(exports: CssModuleExports) -> IndexMap<String, String> {
    let mut names: Vec<(String, String)> = exports
        .into_iter()
        .map(|(local, export)| {
            let mut value = export.name;
            for reference in export.composes {
                match reference {
                    CssModuleReference::Local { name } | CssModuleReference::Global { name } => {
                        value.push(' ');
                        value.push_str(&name);
                    }
                    CssModuleReference::Dependency { .. } => {}
                }
            }
            (local, value)
        })
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    names.into_iter().collect()
}
