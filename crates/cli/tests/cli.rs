//! Tests for the `supercode` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write_repo(root: &Path) {
    let shared = root.join(".claude/shared");
    let commands = root.join(".claude/commands");
    fs::create_dir_all(&shared).expect("Failed to create shared dir");
    fs::create_dir_all(&commands).expect("Failed to create commands dir");
    fs::write(
        shared.join("superclaude-personas.yml"),
        "## All_Personas\nmentor:\n  Identity: \"Technical educator\"\n  MCP_Preferences: \"Context7(docs)\"\n",
    )
    .expect("Failed to write personas");
    fs::write(commands.join("fix.md"), "# /user:fix\n\nPurpose: \"Fix bugs\"\n")
        .expect("Failed to write command");
}

fn supercode(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("supercode").expect("Failed to find binary");
    cmd.current_dir(cwd).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_detect_prints_features() {
    let repo = tempdir().expect("Failed to create temp dir");
    write_repo(repo.path());

    supercode(repo.path())
        .args(["detect", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("personas: 1"))
        .stdout(predicate::str::contains("fix [Debugging]"));
}

#[test]
fn test_run_writes_artifacts() {
    let repo = tempdir().expect("Failed to create temp dir");
    let out = tempdir().expect("Failed to create temp dir");
    write_repo(repo.path());

    supercode(repo.path())
        .args(["run", "."])
        .arg("--output")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("SuperCode conversion"));

    assert!(out.path().join("agents/mentor.ts").is_file());
    assert!(out.path().join("commands/fix.ts").is_file());
    assert!(out.path().join("TRANSFORMATION_SUMMARY.md").is_file());
}

#[test]
fn test_dry_run_json_report() {
    let repo = tempdir().expect("Failed to create temp dir");
    let out = tempdir().expect("Failed to create temp dir");
    let target = out.path().join("generated");
    write_repo(repo.path());

    let output = supercode(repo.path())
        .args(["run", ".", "--dry-run", "--format", "json"])
        .arg("--output")
        .arg(&target)
        .output()
        .expect("Failed to run supercode");

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["state"], "DONE");
    assert_eq!(report["generation"]["dryRun"], true);
    assert!(!target.exists());
}

#[test]
fn test_strict_fails_on_warnings() {
    let repo = tempdir().expect("Failed to create temp dir");
    let out = tempdir().expect("Failed to create temp dir");
    write_repo(repo.path());
    fs::write(
        repo.path().join(".claude/shared/superclaude-personas.yml"),
        "## All_Personas\nmentor:\n  Identity: \"Technical educator\"\n  model: gpt-4\n",
    )
    .expect("Failed to write personas");

    supercode(repo.path())
        .args(["run", ".", "--strict"])
        .arg("--output")
        .arg(out.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Warnings (1)"));
}

#[test]
fn test_missing_repository_fails() {
    let dir = tempdir().expect("Failed to create temp dir");

    supercode(dir.path())
        .args(["run", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot process repository"));
}

#[test]
fn test_unknown_feature_kind_is_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");

    supercode(dir.path())
        .args(["detect", ".", "--include", "widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown feature kind `widgets`"));
}
