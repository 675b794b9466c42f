//! CLI tests for `promoter plan` and argument validation.
//!
//! Spawns the promoter binary and checks stdout and exit codes.

use std::path::Path;
use std::process::{Command, Output};

use promoter::exit_codes;
use promoter::io::ledger_store::LedgerFile;
use promoter::test_support::ledger_with;

fn write_ledger(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("meta-sheet.json");
    LedgerFile::create(
        &path,
        ledger_with(
            &["dev2", "qa", "prod"],
            &[&["rel/1.0.0", "X", "X"], &["X", "rel/1.0.0", "X"]],
        ),
    )
    .expect("write ledger");
    path
}

fn promoter(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_promoter"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run promoter")
}

#[test]
fn plan_prints_summary_and_leaves_ledger_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let ledger = write_ledger(temp.path());
    let before = std::fs::read_to_string(&ledger).expect("read ledger");

    let out = promoter(
        temp.path(),
        &["plan", "--ledger", "meta-sheet.json", "dev2", "qa", "1.1.0"],
    );

    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        "rel/1.0.0, rel/1.1.0, dev2, qa, true"
    );
    assert_eq!(std::fs::read_to_string(&ledger).expect("read ledger"), before);
}

#[test]
fn plan_json_reports_reverse_promotion() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("meta-sheet.json");
    LedgerFile::create(
        &path,
        ledger_with(
            &["dev2", "qa", "prod"],
            &[&["X", "rel/2.0.0", "X"], &["X", "X", "rel/2.0.0"]],
        ),
    )
    .expect("write ledger");

    let out = promoter(
        temp.path(),
        &["plan", "--ledger", "meta-sheet.json", "qa", "prod", "--json"],
    );

    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let plan: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json plan");
    assert_eq!(plan["target_branch"], "rel/2.0.0_promotion_branch");
    assert_eq!(plan["lower_env"], "dev2");
    assert_eq!(plan["reverse_promotion"], true);
    assert_eq!(plan["branch_was_created"], false);
}

#[test]
fn missing_version_exits_with_invalid_input() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_ledger(temp.path());

    let out = promoter(temp.path(), &["plan", "--ledger", "meta-sheet.json", "dev2", "qa"]);

    assert_eq!(out.status.code(), Some(exit_codes::INVALID_INPUT));
    assert!(String::from_utf8_lossy(&out.stderr).contains("new version is required"));
}

#[test]
fn unknown_environment_exits_with_invalid_input() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_ledger(temp.path());

    let out = promoter(
        temp.path(),
        &["plan", "--ledger", "meta-sheet.json", "dev2", "uat", "1.1.0"],
    );

    assert_eq!(out.status.code(), Some(exit_codes::INVALID_INPUT));
}

#[test]
fn invalid_config_exits_with_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_ledger(temp.path());
    std::fs::write(temp.path().join("promoter.toml"), "git_timeout_secs = 0\n")
        .expect("write config");

    let out = promoter(
        temp.path(),
        &["plan", "--ledger", "meta-sheet.json", "dev2", "qa", "1.1.0"],
    );

    assert_eq!(out.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&out.stderr).contains("git_timeout_secs"));
}

#[test]
fn promote_rejects_identical_environments() {
    let temp = tempfile::tempdir().expect("tempdir");

    let out = promoter(
        temp.path(),
        &["promote", "qa", "qa", "/nonexistent/repo.git", "1.1.0"],
    );

    assert_eq!(out.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&out.stderr).contains("must differ"));
}

#[test]
fn promote_against_missing_remote_is_transport_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("missing.git");

    let out = promoter(
        temp.path(),
        &["promote", "dev2", "qa", &missing.to_string_lossy(), "1.1.0"],
    );

    assert_eq!(out.status.code(), Some(exit_codes::TRANSPORT));
}
