//! Output extension policy.
//!
//! Node decides module type by extension when `package.json` declares a
//! conflicting default, so Node-targeted outputs that disagree with the
//! package `type` get `.cjs` / `.mjs`. Browser targets never need that.

use std::fmt;

use lecp_config::FormatKind;

/// Script output extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputExtension {
    Js,
    Cjs,
    Mjs,
}

impl OutputExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputExtension::Js => "js",
            OutputExtension::Cjs => "cjs",
            OutputExtension::Mjs => "mjs",
        }
    }

    /// Matching declaration extension: `js → d.ts`, `cjs → d.cts`, `mjs → d.mts`.
    pub fn declaration(&self) -> &'static str {
        match self {
            OutputExtension::Js => "d.ts",
            OutputExtension::Cjs => "d.cts",
            OutputExtension::Mjs => "d.mts",
        }
    }
}

impl fmt::Display for OutputExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the script extension for a format.
///
/// | target   | pkg type | format | ext   |
/// |----------|----------|--------|-------|
/// | non-node | any      | any    | `js`  |
/// | node     | module   | cjs    | `cjs` |
/// | node     | commonjs | esm    | `mjs` |
/// | node     | module   | esm    | `js`  |
/// | node     | commonjs | cjs    | `js`  |
///
/// UMD is always `js`.
pub fn output_extension(
    is_node_target: bool,
    is_package_module: bool,
    format: FormatKind,
) -> OutputExtension {
    if !is_node_target {
        return OutputExtension::Js;
    }
    match (format, is_package_module) {
        (FormatKind::Cjs, true) => OutputExtension::Cjs,
        (FormatKind::Esm, false) => OutputExtension::Mjs,
        _ => OutputExtension::Js,
    }
}
