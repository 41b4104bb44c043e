//! Binary-level tests for `wsal-shipper`
//!
//! Only paths that stop before the database is contacted are covered here.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shipper(base_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wsal-shipper").unwrap();
    cmd.env("WSAL_BASE_DIR", base_dir.path())
        .env_remove("LOG_LEVEL")
        .env_remove("LOG_OUTPUT")
        .env_remove("LOG_FORMAT")
        .env_remove("LOG_FILTER")
        .env_remove("WSAL_DB_PASSWORD")
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .current_dir(base_dir.path());
    cmd
}

#[test]
fn test_help_lists_flags() {
    let dir = TempDir::new().unwrap();
    shipper(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_missing_config_exits_with_config_status() {
    let dir = TempDir::new().unwrap();
    shipper(&dir)
        .args(["--config", "staging", "--dry-run"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("staging.toml"));
}

#[test]
fn test_incomplete_config_exits_with_config_status() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        r#"
        [database]
        host = "localhost"
        user = "wp"
        password = "secret"
        database = "wordpress"

        [site]
        domain = "example.com"
        "#,
    )
    .unwrap();

    shipper(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("storage"));

    assert!(!dir.path().join("log_track_config").exists());
    assert!(!dir.path().join("logs").exists());
}

#[test]
fn test_path_like_config_name_is_rejected_by_parser() {
    let dir = TempDir::new().unwrap();
    shipper(&dir)
        .args(["-c", "../other"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--base-dir"));
}
