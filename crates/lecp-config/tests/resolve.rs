//! End-to-end resolution against a project on disk.

use std::fs;
use std::path::Path;

use lecp_config::{
    ConfigDiscovery, ConfigResolver, DtsMode, JsxRuntime, LogLevel, SystemConfig,
};
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }
    dir
}

fn resolve(dir: &Path) -> Vec<lecp_config::FormatTask> {
    let system = SystemConfig::load(dir, false, LogLevel::Info).expect("system config");
    let loaded = ConfigDiscovery::new(dir).load().expect("load");
    ConfigResolver::new(&system)
        .resolve(&loaded.config)
        .expect("resolve")
}

#[test]
fn tsconfig_drives_alias_jsx_and_dts_mode() {
    let dir = project(&[
        ("package.json", r#"{ "name": "demo", "type": "module" }"#),
        (
            "tsconfig.json",
            r#"{
                "compilerOptions": {
                    "jsx": "react-jsx",
                    "isolatedDeclarations": true,
                    "paths": { "~/*": ["./src/*"], "@/*": ["./lib/*"] }
                }
            }"#,
        ),
        (
            "lecp.config.toml",
            r#"
[alias]
"@" = "./src"

[[format]]
type = "esm"
"#,
        ),
    ]);

    let tasks = resolve(dir.path());
    let task = &tasks[0];
    assert_eq!(task.alias["~"], "./src");
    // explicit config entry wins over the tsconfig-derived one
    assert_eq!(task.alias["@"], "./src");
    assert_eq!(task.jsx_runtime, JsxRuntime::Automatic);
    assert_eq!(task.dts.as_ref().map(|d| d.mode), Some(DtsMode::Fast));
}

#[test]
fn explicit_jsx_runtime_is_kept() {
    let dir = project(&[
        ("package.json", r#"{ "name": "demo" }"#),
        ("tsconfig.json", r#"{ "compilerOptions": { "jsx": "react-jsx" } }"#),
        (
            "lecp.config.json",
            r#"{ "react": { "jsxRuntime": "classic" }, "format": [{ "type": "cjs" }] }"#,
        ),
    ]);

    let tasks = resolve(dir.path());
    assert_eq!(tasks[0].jsx_runtime, JsxRuntime::Classic);
    assert_eq!(tasks[0].dts.as_ref().map(|d| d.mode), Some(DtsMode::Normal));
}

#[test]
fn node_targets_with_module_package() {
    let dir = project(&[
        ("package.json", r#"{ "name": "demo", "type": "module" }"#),
        (
            "lecp.config.json",
            r#"{ "format": [{ "type": "esm" }, { "type": "cjs" }], "targets": { "node": "20.11.0" } }"#,
        ),
    ]);

    let tasks = resolve(dir.path());
    assert!(tasks.iter().all(|t| t.is_node_target()));
    assert!(tasks[0].out_dir.ends_with("es"));
    assert!(tasks[1].out_dir.ends_with("lib"));
}
