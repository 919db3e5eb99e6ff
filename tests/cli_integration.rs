//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end. Nothing here reaches a
//! language model: commands either stop before generation or only touch the
//! checkpoint store.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test.
fn reportsmith() -> Command {
    let mut cmd = Command::cargo_bin("reportsmith").unwrap();
    cmd.env_remove("REPORTSMITH_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// Temp workspace with a config pointing the store and output inside it.
fn workspace() -> (assert_fs::TempDir, std::path::PathBuf) {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = temp.child("reportsmith.toml");
    config
        .write_str(&format!(
            "[ai]\nprovider = \"ollama\"\nfallback = []\n\n\
             [store]\ndir = '{}'\n\n\
             [output]\ndir = '{}'\n",
            temp.path().join("threads").display(),
            temp.path().join("reports").display(),
        ))
        .unwrap();
    let path = config.path().to_path_buf();
    (temp, path)
}

fn in_workspace(temp: &assert_fs::TempDir, config: &std::path::Path) -> Command {
    let mut cmd = reportsmith();
    cmd.current_dir(temp.path()).arg("--config").arg(config);
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    reportsmith()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("research reports"));
}

#[test]
fn test_short_help_flag() {
    reportsmith().arg("-h").assert().success().stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    reportsmith()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_short_version_flag() {
    reportsmith().arg("-V").assert().success().stdout(predicate::str::contains("reportsmith"));
}

#[test]
fn test_no_subcommand_is_an_error() {
    reportsmith().assert().failure().stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_start_command_help() {
    reportsmith()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feedback gate"))
        .stdout(predicate::str::contains("--analysts"));
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_shows_toml() {
    let (temp, config) = workspace();
    in_workspace(&temp, &config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[pipeline]"))
        .stdout(predicate::str::contains("default_analysts = 3"))
        .stdout(predicate::str::contains("provider = \"ollama\""));
}

#[test]
fn test_config_path_with_explicit_file() {
    let (temp, config) = workspace();
    in_workspace(&temp, &config)
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reportsmith.toml"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = temp.child("bad.toml");
    config.write_str("[pipeline]\ninterview_turns = 0\n").unwrap();

    reportsmith()
        .current_dir(temp.path())
        .arg("--config")
        .arg(config.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("interview_turns"));
}

// ============================================================================
// Completions Tests
// ============================================================================

#[test]
fn test_completions_bash() {
    reportsmith()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reportsmith"));
}

#[test]
fn test_completions_invalid_shell() {
    reportsmith().args(["completions", "invalid_shell"]).assert().failure();
}

// ============================================================================
// Thread Lifecycle Tests
// ============================================================================

#[test]
fn test_list_empty_store() {
    let (temp, config) = workspace();
    in_workspace(&temp, &config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No threads yet"));

    in_workspace(&temp, &config)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_status_unknown_thread() {
    let (temp, config) = workspace();
    in_workspace(&temp, &config)
        .args(["status", "no-such-thread"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidResumeFailure"))
        .stderr(predicate::str::contains("no-such-thread"));
}

#[test]
fn test_start_rejects_bad_input() {
    let (temp, config) = workspace();
    in_workspace(&temp, &config)
        .args(["start", "Solar Energy", "-n", "0", "--detach"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidInput"));

    in_workspace(&temp, &config)
        .args(["start", "   ", "--detach"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("topic must not be empty"));
}

#[test]
fn test_detached_start_then_status() {
    let (temp, config) = workspace();

    let output = in_workspace(&temp, &config)
        .args(["start", "Solar Energy", "-n", "2", "--detach"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let thread_id = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert_eq!(thread_id.len(), 36);

    temp.child("threads").child(format!("{thread_id}.json")).assert(predicate::path::exists());

    in_workspace(&temp, &config)
        .args(["status", &thread_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Solar Energy"))
        .stdout(predicate::str::contains("CREATE_ANALYSTS"));

    in_workspace(&temp, &config)
        .args(["status", &thread_id, "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stage\": \"CREATE_ANALYSTS\""))
        .stdout(predicate::str::contains("\"analyst_count\": 2"));

    in_workspace(&temp, &config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(thread_id.as_str()))
        .stdout(predicate::str::contains("Total: 1 threads"));
}

#[test]
fn test_resume_before_feedback_gate_is_rejected() {
    let (temp, config) = workspace();

    let output = in_workspace(&temp, &config)
        .args(["start", "Solar Energy", "--detach"])
        .output()
        .unwrap();
    let thread_id = String::from_utf8(output.stdout).unwrap().trim().to_string();

    in_workspace(&temp, &config)
        .args(["resume", &thread_id, "-f", "more economists"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidResumeFailure"))
        .stderr(predicate::str::contains("CREATE_ANALYSTS"));

    // The checkpoint is untouched.
    in_workspace(&temp, &config)
        .args(["status", &thread_id, "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pending_feedback\": null"));
}
