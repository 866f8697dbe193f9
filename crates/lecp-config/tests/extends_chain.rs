//! Tests for `extends` resolution across config files.

use std::fs;
use std::path::Path;

use lecp_config::{ConfigDiscovery, ConfigError, FormatKind, load_config};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write config");
}

#[test]
fn deepest_ancestor_keys_survive_and_leaf_wins() {
    let dir = TempDir::new().expect("tempdir");
    write(
        dir.path(),
        "configs/base.toml",
        r#"
clean = false
externalHelpers = true
sourcemap = false
"#,
    );
    write(
        dir.path(),
        "configs/middle.json",
        r#"{ "extends": "./base.toml", "sourcemap": true, "exclude": ["**/legacy/**"] }"#,
    );
    write(
        dir.path(),
        "lecp.config.toml",
        r#"
extends = "./configs/middle.json"
exclude = ["**/stories/**"]

[[format]]
type = "esm"
"#,
    );

    let loaded = ConfigDiscovery::new(dir.path()).load().expect("load");
    let shared = &loaded.config.shared;

    // only set in the deepest ancestor
    assert_eq!(shared.clean, Some(false));
    assert_eq!(shared.external_helpers, Some(true));
    // set in both, nearest wins
    assert_eq!(shared.sourcemap, Some(true));
    assert_eq!(shared.exclude.as_deref(), Some(&["**/stories/**".to_string()][..]));
    assert_eq!(loaded.config.format[0].kind, FormatKind::Esm);

    let files: Vec<_> = loaded.files.iter().collect();
    assert_eq!(files.len(), 3);
    assert!(files[0].ends_with("lecp.config.toml"));
    assert!(files[2].ends_with("configs/base.toml"));
}

#[test]
fn cycle_warns_and_keeps_loaded_config() {
    let dir = TempDir::new().expect("tempdir");
    write(
        dir.path(),
        "lecp.config.json",
        r#"{ "extends": "./other.json", "format": [{ "type": "cjs" }] }"#,
    );
    write(
        dir.path(),
        "other.json",
        r#"{ "extends": "./lecp.config.json", "clean": false }"#,
    );

    let loaded = ConfigDiscovery::new(dir.path()).load().expect("load");
    assert_eq!(loaded.files.len(), 2);
    assert_eq!(loaded.config.shared.clean, Some(false));
    assert_eq!(loaded.config.format.len(), 1);
}

#[test]
fn missing_extends_target_is_config_not_found() {
    let dir = TempDir::new().expect("tempdir");
    write(
        dir.path(),
        "lecp.config.toml",
        "extends = \"./nope.toml\"\n[[format]]\ntype = \"esm\"\n",
    );

    let err = ConfigDiscovery::new(dir.path()).load().unwrap_err();
    match err {
        ConfigError::ConfigNotFound(path) => assert!(path.ends_with("nope.toml")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_root_config_is_config_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_config(&dir.path().join("lecp.config.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound(_)));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "lecp.config.toml", "extends = \"./base.yaml\"\n");
    write(dir.path(), "base.yaml", "clean: true\n");

    let err = ConfigDiscovery::new(dir.path()).load().unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}
