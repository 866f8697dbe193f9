//! Output path mapping.
//!
//! The only place an output location is computed. Every path is a pure
//! function of the source path relative to the entry directory, the format
//! task and the file kind.

use std::path::{Path, PathBuf};

use lecp_config::FormatTask;

use crate::classify::{self, FileKind};
use crate::extension::{OutputExtension, output_extension};

#[derive(Debug, Clone)]
pub struct OutputPathMapper {
    src_dir: PathBuf,
    out_dir: PathBuf,
    extension: OutputExtension,
    less_compile: bool,
}

impl OutputPathMapper {
    pub fn new(task: &FormatTask, is_package_module: bool) -> Self {
        Self {
            src_dir: task.entry.clone(),
            out_dir: task.out_dir.clone(),
            extension: output_extension(task.is_node_target(), is_package_module, task.kind),
            less_compile: task.css.less_compile,
        }
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Extension for scripts that are not JSX.
    pub fn extension(&self) -> OutputExtension {
        self.extension
    }

    pub fn less_compile(&self) -> bool {
        self.less_compile
    }

    /// Path of `abs` relative to the entry directory.
    pub fn relative<'p>(&self, abs: &'p Path) -> Option<&'p Path> {
        abs.strip_prefix(&self.src_dir).ok()
    }

    /// Output extension for one script source.
    pub fn script_extension(&self, rel: &Path) -> OutputExtension {
        if classify::is_jsx(rel) {
            OutputExtension::Js
        } else {
            self.extension
        }
    }

    pub fn script(&self, rel: &Path) -> PathBuf {
        let ext = self.script_extension(rel);
        self.out_dir.join(rel.with_extension(ext.as_str()))
    }

    pub fn style(&self, rel: &Path) -> PathBuf {
        if self.less_compile && classify::is_less(rel) {
            self.out_dir.join(rel.with_extension("css"))
        } else {
            self.out_dir.join(rel)
        }
    }

    /// Declaration emitted for a script source, with the infix matching the
    /// script's output extension.
    pub fn declaration(&self, rel: &Path) -> PathBuf {
        let ext = self.script_extension(rel);
        let stem = rel.with_extension("");
        let mut name = stem.into_os_string();
        name.push(".");
        name.push(ext.declaration());
        self.out_dir.join(PathBuf::from(name))
    }

    pub fn asset(&self, rel: &Path) -> PathBuf {
        self.out_dir.join(rel)
    }

    /// Mirror of a source directory inside the output directory.
    pub fn directory(&self, rel: &Path) -> PathBuf {
        self.out_dir.join(rel)
    }

    /// Output for `rel` according to its kind.
    pub fn output(&self, rel: &Path) -> PathBuf {
        match classify::classify(rel, self.less_compile) {
            FileKind::Style => self.style(rel),
            FileKind::Script => self.script(rel),
            FileKind::Declaration | FileKind::Asset => self.asset(rel),
        }
    }

    /// Every file a source may have produced, for removal on unlink.
    pub fn outputs(&self, rel: &Path) -> Vec<PathBuf> {
        match classify::classify(rel, self.less_compile) {
            FileKind::Style => {
                let css = self.style(rel);
                vec![map_path(&css), css]
            }
            FileKind::Script => {
                let js = self.script(rel);
                let dts = self.declaration(rel);
                vec![map_path(&js), js, map_path(&dts), dts]
            }
            FileKind::Declaration | FileKind::Asset => vec![self.asset(rel)],
        }
    }
}

/// `<path>.map`
pub fn map_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecp_config::{
        BuildMode, CssTask, FormatKind, JsxRuntime, LightningCssOptions, Targets,
    };

    fn task(kind: FormatKind, node: bool) -> FormatTask {
        let mut targets = Targets::new();
        if node {
            targets.insert("node".to_string(), "20.11.0".to_string());
        } else {
            targets.insert("chrome".to_string(), "55".to_string());
        }
        FormatTask {
            kind,
            mode: BuildMode::Bundless,
            builder: "swc".to_string(),
            entry: PathBuf::from("/p/src"),
            out_dir: PathBuf::from("/p/out"),
            minify: false,
            dts: None,
            css: CssTask {
                css_modules: None,
                less_compile: true,
                less_options: Default::default(),
                lightning_css: LightningCssOptions::default(),
            },
            shims: None,
            targets,
            alias: Default::default(),
            define: Default::default(),
            exclude: Vec::new(),
            sourcemap: true,
            clean: true,
            external_helpers: false,
            jsx_runtime: JsxRuntime::Classic,
            name: None,
            file_name: None,
        }
    }

    #[test]
    fn script_and_declaration_share_infix() {
        let mapper = OutputPathMapper::new(&task(FormatKind::Cjs, true), true);
        let rel = Path::new("util/index.ts");
        assert_eq!(mapper.script(rel), PathBuf::from("/p/out/util/index.cjs"));
        assert_eq!(mapper.declaration(rel), PathBuf::from("/p/out/util/index.d.cts"));
    }

    #[test]
    fn jsx_sources_emit_plain_js() {
        let mapper = OutputPathMapper::new(&task(FormatKind::Esm, true), false);
        let rel = Path::new("Demo.tsx");
        assert_eq!(mapper.script(rel), PathBuf::from("/p/out/Demo.js"));
        assert_eq!(mapper.declaration(rel), PathBuf::from("/p/out/Demo.d.ts"));
        assert_eq!(
            mapper.script(Path::new("index.ts")),
            PathBuf::from("/p/out/index.mjs")
        );
    }

    #[test]
    fn less_becomes_css() {
        let mapper = OutputPathMapper::new(&task(FormatKind::Esm, false), false);
        assert_eq!(
            mapper.style(Path::new("a/b.less")),
            PathBuf::from("/p/out/a/b.css")
        );
        assert_eq!(
            mapper.outputs(Path::new("a/b.less")),
            vec![
                PathBuf::from("/p/out/a/b.css.map"),
                PathBuf::from("/p/out/a/b.css")
            ]
        );
    }

    #[test]
    fn unlink_targets_for_script() {
        let mapper = OutputPathMapper::new(&task(FormatKind::Esm, false), false);
        let outputs = mapper.outputs(Path::new("index.ts"));
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("/p/out/index.js.map"),
                PathBuf::from("/p/out/index.js"),
                PathBuf::from("/p/out/index.d.ts.map"),
                PathBuf::from("/p/out/index.d.ts"),
            ]
        );
    }

    #[test]
    fn es_shorthand_targets_keep_plain_js() {
        let mut browser = task(FormatKind::Cjs, false);
        browser.targets = lecp_config::targets::expand_targets(&indexmap::IndexMap::from([(
            "es2020".to_string(),
            lecp_config::TargetValue::Flag(true),
        )]));
        let mapper = OutputPathMapper::new(&browser, true);
        assert_eq!(mapper.extension(), OutputExtension::Js);
        assert_eq!(mapper.script(Path::new("index.ts")), PathBuf::from("/p/out/index.js"));
    }

    #[test]
    fn relative_strips_entry() {
        let mapper = OutputPathMapper::new(&task(FormatKind::Esm, false), false);
        assert_eq!(
            mapper.relative(Path::new("/p/src/a/b.ts")),
            Some(Path::new("a/b.ts"))
        );
        assert_eq!(mapper.relative(Path::new("/elsewhere/b.ts")), None);
    }
}
