//! CLI tests for `mariadb-mongo-migrate` using `assert_cmd`.
//!
//! None of these need a running server.

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn migrate_cmd() -> Command {
    let mut cmd = Command::cargo_bin("mariadb-mongo-migrate").unwrap();
    cmd.env_remove("MARIADB_PASSWORD").env_remove("RUST_LOG");
    cmd
}

/// A complete argument set pointing at hosts that refuse connections.
fn full_args() -> Vec<&'static str> {
    vec![
        "--mariadb",
        "127.0.0.1",
        "--port",
        "1",
        "--mongodb",
        "mongodb://127.0.0.1:1",
        "--sourcedb",
        "shop",
        "--targetdb",
        "shop",
        "--table",
        "orders",
        "--collection",
        "orders",
        "--user",
        "etl",
        "--password",
        "secret",
        "--connect-timeout",
        "2",
    ]
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn test_help_displays_usage() {
    migrate_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--mariadb"))
        .stdout(predicate::str::contains("--interval-policy"));
}

#[test]
fn test_version_displays_version() {
    migrate_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mariadb-mongo-migrate"));
}

// =============================================================================
// Usage errors (exit 1)
// =============================================================================

#[test]
fn test_missing_arguments_exit_1() {
    migrate_cmd()
        .args(["--mariadb", "localhost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_missing_password_exit_1() {
    let args: Vec<&str> = full_args()
        .into_iter()
        .filter(|a| *a != "--password" && *a != "secret")
        .collect();
    migrate_cmd().args(args).assert().code(1);
}

#[test]
fn test_zero_batch_size_exit_1() {
    migrate_cmd()
        .args(full_args())
        .args(["--batch-size", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("batch size"));
}

#[test]
fn test_invalid_mongo_uri_exit_1() {
    let args: Vec<&str> = full_args()
        .into_iter()
        .map(|a| if a == "mongodb://127.0.0.1:1" { "http://127.0.0.1:1" } else { a })
        .collect();
    migrate_cmd().args(args).assert().code(1);
}

#[test]
fn test_malformed_table_name_exit_1() {
    let args: Vec<&str> = full_args()
        .into_iter()
        .map(|a| if a == "orders" { "orders;drop" } else { a })
        .collect();
    migrate_cmd().args(args).assert().code(1);
}

#[test]
fn test_unknown_interval_policy_exit_1() {
    migrate_cmd()
        .args(full_args())
        .args(["--interval-policy", "fortnights"])
        .assert()
        .code(1);
}

// =============================================================================
// Runtime errors (exit 100)
// =============================================================================

#[test]
fn test_unreachable_mariadb_exit_100() {
    migrate_cmd()
        .args(full_args())
        .assert()
        .code(100)
        .stderr(predicate::str::contains("Source connection error"));
}

#[test]
fn test_password_not_echoed_on_failure() {
    migrate_cmd()
        .args(full_args())
        .assert()
        .code(100)
        .stderr(predicate::str::contains("secret").not());
}
