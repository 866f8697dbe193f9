//! End-to-end tests of the `lecp` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn lecp() -> Command {
    let mut cmd = Command::cargo_bin("lecp").unwrap();
    cmd.env_remove("LECP_LOG_LEVEL")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{ "name": "demo", "version": "1.0.0", "type": "module" }"#,
    )
    .unwrap();
    fs::write(dir.path().join("lecp.config.json"), config).unwrap();
    fs::create_dir_all(dir.path().join("src/util")).unwrap();
    fs::write(
        dir.path().join("src/index.ts"),
        "export { add } from \"./util\";\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/util/index.ts"),
        "export const add = (a: number, b: number): number => a + b;\n",
    )
    .unwrap();
    dir
}

#[test]
fn help_lists_flags() {
    lecp()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--watch"))
        .stdout(predicate::str::contains("--log-level"));
}

#[test]
fn builds_with_default_command() {
    let dir = project(
        r#"{ "format": [{ "type": "esm" }, { "type": "cjs" }], "targets": { "node": "20.11.0" }, "dts": false }"#,
    );

    lecp().current_dir(dir.path()).assert().success();

    assert!(dir.path().join("es/index.js").exists());
    assert!(dir.path().join("lib/index.cjs").exists());
    assert!(!dir.path().join("lib/index.js").exists());
}

#[test]
fn build_subcommand_with_cwd() {
    let dir = project(r#"{ "format": [{ "type": "esm" }], "dts": false }"#);

    lecp()
        .args(["build", "--cwd"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("build finished"));

    assert!(dir.path().join("es/util/index.js").exists());
}

#[test]
fn log_level_none_is_silent() {
    let dir = project(r#"{ "format": [{ "type": "esm" }], "dts": false }"#);

    lecp()
        .current_dir(dir.path())
        .args(["--logLevel", "none"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn log_level_from_env() {
    let dir = project(r#"{ "format": [{ "type": "esm" }], "dts": false }"#);

    lecp()
        .current_dir(dir.path())
        .env("LECP_LOG_LEVEL", "error")
        .assert()
        .success()
        .stderr(predicate::str::contains("build finished").not());
}

#[test]
fn missing_config_exits_with_one() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{ "name": "demo" }"#).unwrap();

    lecp()
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config not found"))
        .stderr(predicate::str::contains("Hint:"));
}

#[test]
fn broken_source_file_does_not_fail_the_run() {
    let dir = project(r#"{ "format": [{ "type": "esm" }], "dts": false }"#);
    fs::write(dir.path().join("src/broken.ts"), "export const = ;\n").unwrap();

    lecp()
        .current_dir(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("broken.ts"));

    assert!(dir.path().join("es/index.js").exists());
    assert!(!dir.path().join("es/broken.js").exists());
}
