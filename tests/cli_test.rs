//! CLI tests - commands that never reach the network

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("smtp-messenger").unwrap();
    cmd.env_remove("SMTP_PASSWORD")
        .env_remove("SMTP_SENDER")
        .arg("--config")
        .arg(temp_dir.path().join("smtp_configs.json"));
    cmd
}

#[test]
fn test_carriers_lists_gateways() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .arg("carriers")
        .assert()
        .success()
        .stdout(predicate::str::contains("txt.att.net"))
        .stdout(predicate::str::contains("vtext.com"));
}

#[test]
fn test_presets_lists_builtins() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("smtp.gmail.com:587"))
        .stdout(predicate::str::contains("Custom providers").not());
}

#[test]
fn test_unknown_carrier_fails_before_sending() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .args(["sms", "--from", "me@example.com", "--password", "x"])
        .args(["--phone", "5551234567", "--carrier", "nextel", "-m", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Unknown carrier: nextel"))
        .stdout(predicate::str::contains("Sending").not());
}

#[test]
fn test_invalid_email_fails_before_sending() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .args(["email", "--from", "me@example.com", "--password", "x"])
        .args(["--to", "a@example.com", "--to", "not-an-address", "-m", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid address"));
}

#[test]
fn test_unknown_provider() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .args(["email", "--provider", "nowhere", "--from", "me@example.com"])
        .args(["--password", "x", "--to", "a@example.com", "-m", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider: nowhere"));
}

#[test]
fn test_provider_add_and_remove() {
    let temp_dir = TempDir::new().unwrap();

    cli(&temp_dir)
        .args(["provider-add", "Work Relay", "--server", "relay.corp.example", "--port", "2525"])
        .assert()
        .success();

    cli(&temp_dir)
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("relay.corp.example:2525"))
        .stdout(predicate::str::contains("Custom providers"));

    cli(&temp_dir)
        .args(["provider-remove", "Work Relay"])
        .assert()
        .success();

    cli(&temp_dir)
        .args(["provider-remove", "Work Relay"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider"));
}

#[test]
fn test_provider_add_rejects_port_zero() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .args(["provider-add", "Broken", "--server", "mail.example.org", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid provider settings"));

    assert!(!temp_dir.path().join("smtp_configs.json").exists());
}

#[test]
fn test_provider_add_reports_replacement() {
    let temp_dir = TempDir::new().unwrap();
    for (port, expected) in [("2525", "Saved provider"), ("587", "Replaced provider")] {
        cli(&temp_dir)
            .args(["provider-add", "Relay", "--server", "relay.example", "--port", port])
            .assert()
            .success()
            .stdout(predicate::str::contains(expected));
    }
}

#[test]
fn test_provider_add_rejects_reserved_name() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .args(["provider-add", "Custom", "--server", "relay.example"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reserved"));
}
