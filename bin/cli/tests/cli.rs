use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{TempDir, tempdir};

fn custodian() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_custodian"));
    cmd.env_remove("CUSTODIAN_DATABASE_DIRECTORY")
        .env_remove("CUSTODIAN_NETWORK");
    cmd
}

fn setup() -> (TempDir, String) {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    let database = dir.path().join("db");

    custodian()
        .args(["setup", "--output"])
        .arg(&config)
        .arg("--database")
        .arg(&database)
        .assert()
        .success()
        .stdout(predicate::str::contains("Config has been saved"));

    (dir, config.to_string_lossy().into_owned())
}

#[test]
fn test_balance_of_unknown_account_is_zero() {
    let (_dir, config) = setup();
    custodian()
        .args(["balance", "alice", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"balance\": \"0.00000000\""));
}

#[test]
fn test_transfer_without_funds_fails() {
    let (_dir, config) = setup();
    custodian()
        .args(["transfer", "alice", "bob", "0.00000100", "--config", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Insufficient funds"));
}

#[test]
fn test_batch_transfer_must_net_to_zero() {
    let (_dir, config) = setup();
    custodian()
        .args([
            "batch-transfer",
            "alice=-0.00000005",
            "bob=+0.00000002",
            "--config",
            &config,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Batch changes do not sum to zero"));
}

#[test]
fn test_withdrawal_to_invalid_address_fails() {
    let (_dir, config) = setup();
    custodian()
        .args([
            "request-withdrawal",
            "alice",
            "not-an-address",
            "0.00010000",
            "--config",
            &config,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid destination address"));
}

#[test]
fn test_unknown_withdraw_request() {
    let (_dir, config) = setup();
    custodian()
        .args(["withdrawal-status", "missing", "--config", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Withdraw request not found"));
}

#[test]
fn test_empty_ledger_audit_and_sweep() {
    let (_dir, config) = setup();
    custodian()
        .args(["audit", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_value\": \"0.00000000\""));
    custodian()
        .args(["expire-withdrawals", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("expired_accounts"));
}

#[test]
fn test_missing_config_is_reported() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("absent.yaml");
    custodian()
        .args(["audit", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}
