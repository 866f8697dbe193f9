//! Compile plans.
//!
//! A plan is an ordered list of capabilities. The capabilities decide which
//! pipelines run for a file, in order; script plans additionally record
//! whether the file is compiled in one pass or two.

use std::fmt;

use lecp_config::{FormatKind, FormatTask};

use crate::classify::FileKind;

/// Target module system of the final projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    Esm,
    Cjs,
    /// CommonJS body wrapped in a UMD factory.
    Umd,
}

impl From<FormatKind> for ModuleFormat {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Esm => ModuleFormat::Esm,
            FormatKind::Cjs => ModuleFormat::Cjs,
            FormatKind::Umd => ModuleFormat::Umd,
        }
    }
}

/// One step a file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Copy verbatim.
    Asset,
    /// lightningcss.
    Css,
    /// LESS render before [`Capability::Css`].
    Less,
    Minify,
    /// Alias and extension rewriting of specifiers.
    Resolve,
    /// Syntax lowering (TypeScript, JSX, targets).
    Script,
    ModuleFormat(ModuleFormat),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Asset => f.write_str("asset"),
            Capability::Css => f.write_str("css"),
            Capability::Less => f.write_str("less"),
            Capability::Minify => f.write_str("minify"),
            Capability::Resolve => f.write_str("resolve"),
            Capability::Script => f.write_str("script"),
            Capability::ModuleFormat(format) => write!(f, "module:{format:?}"),
        }
    }
}

impl Capability {
    /// Pipeline that carries this capability out. `Minify` has none: it is an
    /// option of whichever pipeline runs.
    pub fn step(self) -> Option<Step> {
        match self {
            Capability::Asset => Some(Step::Copy),
            Capability::Less | Capability::Css => Some(Step::Style),
            Capability::Resolve | Capability::Script | Capability::ModuleFormat(_) => {
                Some(Step::Script)
            }
            Capability::Minify => None,
        }
    }
}

/// A pipeline run by the file compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Copy,
    Style,
    Script,
}

/// A format is "default" when its module system is the one Node already
/// assumes for the package: ESM in a `type: module` package, CommonJS
/// otherwise.
pub fn is_default_format(kind: FormatKind, is_package_module: bool) -> bool {
    matches!(
        (kind, is_package_module),
        (FormatKind::Esm, true) | (FormatKind::Cjs, false)
    )
}

/// Whether a script needs the canonical-ESM stage before projection.
///
/// One pass suffices only for the default format with no aliases to resolve.
pub fn needs_two_pass(kind: FormatKind, is_package_module: bool, has_alias: bool) -> bool {
    !is_default_format(kind, is_package_module) || has_alias
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Everything at once.
    Single,
    /// Aliases resolved, types stripped, ESM kept with source extensions.
    Canonical,
    /// Canonical output projected onto the final format and extensions.
    Project,
}

/// Ordered stages plus the capabilities of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilePlan {
    pub kind: FileKind,
    pub capabilities: Vec<Capability>,
    pub stages: Vec<Stage>,
}

impl CompilePlan {
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_two_pass(&self) -> bool {
        self.stages.len() > 1
    }

    /// Pipelines in the order their first capability appears, each once.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = Vec::new();
        for step in self.capabilities.iter().filter_map(|c| c.step()) {
            if !steps.contains(&step) {
                steps.push(step);
            }
        }
        steps
    }

    pub fn module_format(&self) -> Option<ModuleFormat> {
        self.capabilities.iter().find_map(|c| match c {
            Capability::ModuleFormat(format) => Some(*format),
            _ => None,
        })
    }
}

/// Build the plan for one file of `task`.
pub fn plan_for(task: &FormatTask, kind: FileKind, is_less: bool, is_package_module: bool) -> CompilePlan {
    let mut capabilities = Vec::new();
    let mut stages = Vec::new();
    match kind {
        FileKind::Style => {
            if is_less {
                capabilities.push(Capability::Less);
            }
            capabilities.push(Capability::Css);
            if task.minify {
                capabilities.push(Capability::Minify);
            }
            stages.push(Stage::Single);
        }
        FileKind::Script => {
            capabilities.push(Capability::Resolve);
            capabilities.push(Capability::Script);
            capabilities.push(Capability::ModuleFormat(task.kind.into()));
            if task.minify {
                capabilities.push(Capability::Minify);
            }
            if needs_two_pass(task.kind, is_package_module, !task.alias.is_empty()) {
                stages.extend([Stage::Canonical, Stage::Project]);
            } else {
                stages.push(Stage::Single);
            }
        }
        FileKind::Declaration | FileKind::Asset => {
            capabilities.push(Capability::Asset);
            stages.push(Stage::Single);
        }
    }
    CompilePlan {
        kind,
        capabilities,
        stages,
    }
}
