//! Integration tests for `hubtest config` and `hubtest env`.
//!
//! Runs the binary against real TOML files in a temp directory.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

use hubtest_cli::error::EXIT_CONFIG;

fn hubtest(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hubtest"))
        .args(args)
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("should run hubtest binary")
}

fn write_harness_files(dir: &TempDir) {
    fs::create_dir_all(dir.path().join("e2e")).expect("should create e2e dir");
    fs::write(dir.path().join("e2e/jupyterhub_config.py"), "c = get_config()\n")
        .expect("should write hub config");
    fs::write(dir.path().join("e2e/docker-compose.yml"), "services: {}\n")
        .expect("should write compose file");
}

#[test]
fn test_config_validate_defaults_with_files_present() {
    // Given: no hubtest.toml, but the default host files exist
    let dir = TempDir::new().expect("should create temp dir");
    write_harness_files(&dir);

    // When: validating
    let output = hubtest(&dir, &["config", "validate"]);

    // Then: defaults are valid
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("VALID"));
    assert!(stdout.contains("(defaults)"));
}

#[test]
fn test_config_validate_reports_missing_host_file() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = hubtest(&dir, &["--output", "json", "config", "validate"]);

    assert_eq!(output.status.code(), Some(EXIT_CONFIG));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["valid"], false);
    assert!(
        report["errors"][0]
            .as_str()
            .unwrap_or_default()
            .contains("harness.config_src")
    );
}

#[test]
fn test_config_explicit_missing_file_is_error() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = hubtest(&dir, &["-c", "nope.toml", "config", "show"]);

    assert_eq!(output.status.code(), Some(EXIT_CONFIG));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.toml"));
}

#[test]
fn test_config_malformed_toml_is_error() {
    let dir = TempDir::new().expect("should create temp dir");
    fs::write(dir.path().join("hubtest.toml"), "[harness\nspec = 1\n").expect("should write");

    let output = hubtest(&dir, &["config", "show"]);

    assert_eq!(output.status.code(), Some(EXIT_CONFIG));
}

#[test]
fn test_config_show_section_reflects_file() {
    let dir = TempDir::new().expect("should create temp dir");
    fs::write(
        dir.path().join("hubtest.toml"),
        "[harness]\nspec = \"cypress/integration/admin.spec.js\"\n",
    )
    .expect("should write config");

    let output = hubtest(&dir, &["config", "show", "--section", "harness"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[harness]"));
    assert!(stdout.contains("cypress/integration/admin.spec.js"));
    assert!(!stdout.contains("test_runner_service"));
}

#[test]
fn test_config_show_unknown_section() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = hubtest(&dir, &["config", "show", "--section", "ebpf"]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_env_override_wins_over_file() {
    let dir = TempDir::new().expect("should create temp dir");
    fs::write(
        dir.path().join("hubtest.toml"),
        "[harness]\nbase_image = \"jupyterhub/jupyterhub:3.0\"\n",
    )
    .expect("should write config");

    let output = Command::new(env!("CARGO_BIN_EXE_hubtest"))
        .args(["--output", "json", "env"])
        .current_dir(dir.path())
        .env("HUBTEST_HARNESS_BASE_IMAGE", "jupyterhub/jupyterhub:4.1")
        .output()
        .expect("should run hubtest binary");

    assert_eq!(output.status.code(), Some(0));
    let env: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(env["vars"]["HUBTEST_BASE_IMAGE"], "jupyterhub/jupyterhub:4.1");
    assert_eq!(env["vars"]["HUBTEST_DB_SRC"], "");
}

#[test]
fn test_env_text_is_dotenv() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = hubtest(&dir, &["env"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let keys: Vec<&str> = stdout
        .lines()
        .filter_map(|l| l.split_once('=').map(|(k, _)| k))
        .collect();
    assert_eq!(
        keys,
        vec![
            "HUBTEST_BASE_IMAGE",
            "HUBTEST_CONFIG_SRC",
            "HUBTEST_CONFIG_DEST",
            "HUBTEST_DB_SRC",
            "HUBTEST_DB_DEST",
            "HUBTEST_SPEC",
        ]
    );
}
