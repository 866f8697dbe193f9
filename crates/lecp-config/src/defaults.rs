//! Built-in default values.

use crate::user::{BuildMode, FormatKind};

/// Config file names probed in the project root, in order.
pub const CONFIG_FILES: &[&str] = &["lecp.config.toml", "lecp.config.json"];

/// Field of `package.json` that may hold the config instead of a dedicated file.
pub const PACKAGE_JSON_FIELD: &str = "lecp";

/// Node baseline when only CommonJS output is requested.
pub const DEFAULT_NODE_TARGET: &str = "20.11.0";

/// Browser baseline (Chrome major version) for every other format list.
pub const DEFAULT_WEB_TARGET: u32 = 55;

/// Test and fixture locations that are never compiled.
pub const TEST_PATTERNS: &[&str] = &[
    "**/fixtures",
    "**/fixtures/**",
    "**/demos",
    "**/demos/**",
    "**/mocks",
    "**/mocks/**",
    "**/__test__",
    "**/__test__/**",
    "**/__snapshots__",
    "**/__snapshots__/**",
    "**/*.test.*",
    "**/*.e2e.*",
    "**/*.spec.*",
];

/// Same excludelist in the restricted glob dialect `tsconfig.json` accepts.
pub const TEST_PATTERNS_FOR_TS: &[&str] = &[
    "**/fixtures",
    "**/fixtures/**/*",
    "**/demos",
    "**/demos/**/*",
    "**/mocks",
    "**/mocks/**/*",
    "**/__test__",
    "**/__test__/**/*",
    "**/__snapshots__",
    "**/__snapshots__/**/*",
    "**/*.test.*",
    "**/*.e2e.*",
    "**/*.spec.*",
];

pub const DEFAULT_ALIAS: (&str, &str) = ("@", "./src");
pub const DEFAULT_BUNDLE_FILE_NAME: &str = "index";

/// Per-format defaults applied before any user value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDefaults {
    pub mode: BuildMode,
    pub builder: &'static str,
    pub entry: &'static str,
    pub out_dir: &'static str,
    pub minify: bool,
}

pub fn format_defaults(kind: FormatKind) -> FormatDefaults {
    match kind {
        FormatKind::Esm => FormatDefaults {
            mode: BuildMode::Bundless,
            builder: "swc",
            entry: "src",
            out_dir: "es",
            minify: false,
        },
        FormatKind::Cjs => FormatDefaults {
            mode: BuildMode::Bundless,
            builder: "swc",
            entry: "src",
            out_dir: "lib",
            minify: false,
        },
        FormatKind::Umd => FormatDefaults {
            mode: BuildMode::Bundle,
            builder: "rspack",
            entry: "src",
            out_dir: "umd",
            minify: true,
        },
    }
}
