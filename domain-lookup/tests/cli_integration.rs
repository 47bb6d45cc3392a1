// domain-lookup/tests/cli_integration.rs

//! CLI tests that never touch the network: every lookup goes to an extension
//! with no WHOIS or RDAP server mapped.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Data files for a `.offline` extension with no servers behind it.
struct OfflineData {
    dir: TempDir,
}

impl OfflineData {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(dir.path().join("suffixes.dat"), "// test rules\noffline\n").unwrap();
        fs::write(dir.path().join("whois.json"), "{}").unwrap();
        fs::write(dir.path().join("rdap.json"), r#"{"services": []}"#).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    /// A command isolated from user config and DL_* variables.
    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("domain-lookup").unwrap();
        cmd.current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env_remove("XDG_CONFIG_HOME")
            .env_remove("RUST_LOG")
            .args([
                "--suffix-list",
                &self.path("suffixes.dat"),
                "--whois-servers",
                &self.path("whois.json"),
                "--rdap-bootstrap",
                &self.path("rdap.json"),
            ]);
        for var in [
            "DL_SOURCES",
            "DL_TIMEOUT",
            "DL_DEFAULT_EXTENSION",
            "DL_CONFIG",
            "DL_SUFFIX_LIST",
            "DL_WHOIS_SERVERS",
            "DL_RDAP_BOOTSTRAP",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }
}

#[test]
fn test_help_shows_flags() {
    let mut cmd = Command::cargo_bin("domain-lookup").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--whois"))
        .stdout(predicate::str::contains("--rdap"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--raw"))
        .stdout(predicate::str::contains("--default-extension"));
}

#[test]
fn test_no_domains_is_an_error() {
    let data = OfflineData::new();
    data.command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("You must specify domain names"));
}

#[test]
fn test_invalid_timeout_rejected() {
    let data = OfflineData::new();
    data.command()
        .args(["shop.offline", "--timeout", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timeout"));
}

#[test]
fn test_invalid_domain_json_envelope() {
    let data = OfflineData::new();
    data.command()
        .args(["no-such-suffix.nowhere", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""code": 1"#))
        .stdout(predicate::str::contains("not a valid domain"));
}

#[test]
fn test_unmapped_extension_json_is_unknown() {
    let data = OfflineData::new();
    let output = data
        .command()
        .args(["  SHOP.OFFLINE.  ", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["code"], 0);
    assert_eq!(value["msg"], "Query successful");
    assert_eq!(value["data"]["domain"], "shop.offline");
    assert_eq!(value["data"]["extension"], "offline");
    assert_eq!(value["data"]["classification"], "unknown");
    assert_eq!(value["data"]["diagnostics"].as_array().unwrap().len(), 2);
}

#[test]
fn test_raw_flag_adds_payload_fields() {
    let data = OfflineData::new();
    let output = data
        .command()
        .args(["shop.offline", "--json", "--raw"])
        .output()
        .unwrap();

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["data"].get("rawWhois").is_some());
    assert!(value["data"]["rawWhois"].is_null());
}

#[test]
fn test_default_extension_flag() {
    let data = OfflineData::new();
    data.command()
        .args(["shop", "--default-extension", "offline", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""domain": "shop.offline""#));
}

#[test]
fn test_text_output() {
    let data = OfflineData::new();
    data.command()
        .arg("shop.offline")
        .assert()
        .success()
        .stdout(predicate::str::contains("shop.offline"))
        .stdout(predicate::str::contains("UNKNOWN"))
        .stdout(predicate::str::contains("No WHOIS server is known"));
}

#[test]
fn test_file_input_keeps_order_and_summary() {
    let data = OfflineData::new();
    let list = data.dir.path().join("domains.txt");
    fs::write(&list, "# candidates\nalpha.offline\n\nbeta.offline  # second\n").unwrap();

    data.command()
        .args(["-f", &list.to_string_lossy()])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)alpha\.offline.*beta\.offline").unwrap())
        .stdout(predicate::str::contains("2 domains"));
}

#[test]
fn test_json_array_for_several_domains() {
    let data = OfflineData::new();
    let output = data
        .command()
        .args(["alpha.offline", "not a domain!", "--json"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let envelopes = value.as_array().unwrap();
    assert_eq!(envelopes.len(), 2);
    assert_eq!(envelopes[0]["code"], 0);
    assert_eq!(envelopes[1]["code"], 1);
}

#[test]
fn test_missing_domain_file() {
    let data = OfflineData::new();
    data.command()
        .args(["-f", "does-not-exist.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read domain file"));
}

#[test]
fn test_bad_config_file_rejected() {
    let data = OfflineData::new();
    let config = data.dir.path().join("broken.toml");
    fs::write(&config, "[lookup\nsources = ").unwrap();

    data.command()
        .args(["shop.offline", "--config", &config.to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_config_file_sources_apply() {
    let data = OfflineData::new();
    let config = data.dir.path().join("rdap-only.toml");
    fs::write(&config, "[lookup]\nsources = [\"rdap\"]\n").unwrap();

    let output = data
        .command()
        .args(["shop.offline", "--json", "--config", &config.to_string_lossy()])
        .output()
        .unwrap();

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let diagnostics = value["data"]["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["source"], "rdap");
}
