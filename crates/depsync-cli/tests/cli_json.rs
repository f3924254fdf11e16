//! Integration tests for `depsync --json` output and exit codes.

use serial_test::serial;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn cargo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_depsync"))
}

/// Run depsync in `cwd` with a private home directory.
fn run_in(cwd: &Path, args: &[&str]) -> Output {
    cargo_bin()
        .args(["--json", "--cwd"])
        .arg(cwd)
        .args(args)
        .env("HOME", cwd)
        .env_remove("DEPSYNC_TOOL")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run depsync")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.trim().starts_with('{'),
        "stdout should begin with '{{': {stdout}"
    );
    serde_json::from_str(&stdout).expect("stdout should be valid JSON")
}

#[test]
fn test_version_json() {
    let output = cargo_bin()
        .args(["--json", "version"])
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["version"].as_str(), Some(env!("CARGO_PKG_VERSION")));
    assert!(json["schema_version"].as_u64().is_some());
}

#[test]
fn test_init_refuses_existing_manifest() {
    let dir = tempdir().unwrap();

    let output = run_in(dir.path(), &["init", "--name", "site"]);
    assert!(output.status.success(), "first init should succeed");
    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["name"], "site");

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("bower.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["name"], "site");

    let output = run_in(dir.path(), &["init"]);
    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "FS_ACTION_FAILED");
}

#[test]
fn test_missing_tool_is_setup_failure() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("bower.json"), r#"{"name":"app"}"#).unwrap();

    let output = run_in(dir.path(), &["--tool", "/nonexistent/bower", "status"]);
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "TOOL_NOT_FOUND");
}

#[cfg(unix)]
fn fake_tool(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = r#"#!/bin/sh
case "$1" in
  list)
    echo '{"pkgMeta":{"name":"app"},"dependencies":{"jquery":{"pkgMeta":{"name":"jquery","version":"3.6.0"}},"moment":{"pkgMeta":{"name":"moment"},"missing":true}}}'
    ;;
  *)
    echo '{}'
    ;;
esac
"#;
    let path = dir.join("fake-bower");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
#[serial]
fn test_status_reports_missing_packages() {
    let tools = tempdir().unwrap();
    let tool = fake_tool(tools.path());

    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("bower.json"),
        r#"{"name":"app","dependencies":{"jquery":"^3.6.0","moment":"^2.29.4"}}"#,
    )
    .unwrap();

    let output = run_in(dir.path(), &["--tool", tool.to_str().unwrap(), "status"]);
    assert!(
        output.status.success(),
        "status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["synced"], false);
    assert_eq!(json["status"]["missing"], serde_json::json!(["moment"]));
    assert_eq!(json["status"]["untracked"], serde_json::json!([]));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_list_includes_installed_package() {
    let tools = tempdir().unwrap();
    let tool = fake_tool(tools.path());

    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("bower.json"),
        r#"{"name":"app","dependencies":{"jquery":"^3.6.0","moment":"^2.29.4"}}"#,
    )
    .unwrap();

    let output = run_in(dir.path(), &["--tool", tool.to_str().unwrap(), "list"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    let packages = json["packages"].as_array().expect("packages should be array");
    let jquery = packages
        .iter()
        .find(|p| p["name"] == "jquery")
        .expect("jquery should be listed");
    assert_eq!(jquery["installed_version"], "3.6.0");
}
