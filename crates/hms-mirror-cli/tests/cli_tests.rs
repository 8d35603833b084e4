//! CLI integration tests for hms-mirror.
//!
//! These tests verify command-line argument parsing, help output,
//! planning output and exit codes for various error conditions.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

/// Get a command for the hms-mirror binary.
fn cmd() -> Command {
    Command::cargo_bin("hms-mirror").unwrap()
}

const CONFIG: &str = r#"
data_strategy: SCHEMA_ONLY
databases: [sales]
concurrency: 2
clusters:
  source:
    namespace: hdfs://legacy
    legacy_hive: true
  target:
    namespace: hdfs://modern
"#;

const METADATA: &str = r#"
databases:
  sales:
    customers:
      source:
        definition: |
          CREATE EXTERNAL TABLE `customers`(
            `id` int)
          STORED AS ORC
          LOCATION
            'hdfs://legacy/warehouse/external/sales.db/customers'
"#;

fn file_with(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("decode"));
}

#[test]
fn test_plan_subcommand_help() {
    cmd()
        .args(["plan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--strategy"))
        .stdout(predicate::str::contains("--database"))
        .stdout(predicate::str::contains("--sync"))
        .stdout(predicate::str::contains("--workers"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hms-mirror"));
}

#[test]
fn test_global_flags_and_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--metadata"))
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--state-file"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("config.yaml"));
}

// =============================================================================
// Decode
// =============================================================================

#[test]
fn test_decode_negated_return_code() {
    // bit 31: table planning failed
    cmd()
        .args(["decode", "-2147483648"])
        .assert()
        .success()
        .stdout(predicate::str::contains("31"))
        .stdout(predicate::str::contains("could not be planned"));
}

#[test]
fn test_decode_zero() {
    cmd()
        .args(["decode", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No messages"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // Missing file is an IO error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let file = file_with("invalid: yaml: content: [\n");
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let file = file_with("data_strategy: SCHEMA_ONLY\n");
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2);
}

#[test]
fn test_validation_errors_exit_with_code_3() {
    let config = file_with(&format!(
        "{}transfer:\n  common_storage: s3a://shared\n",
        CONFIG.replace("SCHEMA_ONLY", "LINKED")
    ));
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "validate"])
        .assert()
        .code(3);
}

#[test]
fn test_unknown_strategy_exits_with_code_2() {
    let config = file_with(CONFIG);
    let metadata = file_with(METADATA);
    cmd()
        .args([
            "--config",
            config.path().to_str().unwrap(),
            "--metadata",
            metadata.path().to_str().unwrap(),
            "plan",
            "--strategy",
            "TELEPORT",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_resume_requires_state_file() {
    let config = file_with(CONFIG);
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "resume"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--state-file is required"));
}

// =============================================================================
// Planning
// =============================================================================

#[test]
fn test_validate_valid_config() {
    let config = file_with(CONFIG);
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_plan_writes_scripts_and_json() {
    let config = file_with(CONFIG);
    let metadata = file_with(METADATA);
    let out = TempDir::new().unwrap();

    cmd()
        .args([
            "--config",
            config.path().to_str().unwrap(),
            "--metadata",
            metadata.path().to_str().unwrap(),
            "--output-dir",
            out.path().to_str().unwrap(),
            "--output-json",
            "plan",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"tables_success\": 1"))
        .stdout(predicate::str::contains("\"exit_value\": 0"));

    let script = std::fs::read_to_string(out.path().join("sales_TARGET_execute.sql")).unwrap();
    assert!(script.contains("USE sales;"));
    assert!(script.contains("CREATE EXTERNAL TABLE `customers`("));
}

#[test]
fn test_plan_then_resume() {
    let config = file_with(CONFIG);
    let metadata = file_with(METADATA);
    let state = TempDir::new().unwrap();
    let state_file = state.path().join("state.json");

    let args = |command: &str| {
        vec![
            "--config".to_string(),
            config.path().to_string_lossy().to_string(),
            "--metadata".to_string(),
            metadata.path().to_string_lossy().to_string(),
            "--state-file".to_string(),
            state_file.to_string_lossy().to_string(),
            command.to_string(),
        ]
    };

    cmd().args(args("plan")).assert().success();
    assert!(state_file.exists());

    cmd()
        .args(args("resume"))
        .assert()
        .success()
        .stdout(predicate::str::contains("retried 1"));
}
