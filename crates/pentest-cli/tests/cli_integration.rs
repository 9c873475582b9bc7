//! Integration tests for the `pentest` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn pentest() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("pentest").expect("binary `pentest` should be built")
}

fn write_contract(dir: &std::path::Path, allow_domain: &str) -> std::path::PathBuf {
    let path = dir.join("contract.yaml");
    let body = format!(
        r#"
schemaVersion: "1.0"
identity:
  id: eng-1
  name: Example Engagement
  client: Example Corp
  startDate: "2026-01-01"
  endDate: "2026-02-01"
  timezone: UTC
allowlist:
  domains: ["{allow_domain}"]
  ipRanges: []
  ports: []
  services: []
denylist:
  domains: []
  ipRanges: []
  ports: []
  pathKeywords: []
constraints:
  rate: {{ rps: 100.0, maxConcurrent: 10, burst: 100 }}
  budget: {{ maxTotalRequests: 1000, maxPerTarget: 500, maxDurationHours: 8 }}
  timeouts: {{ connectMs: 1000, readMs: 5000, totalMs: 10000 }}
approvalPolicy:
  mode: AUTO_APPROVE
  timeoutSec: 30
  defaultAction: DENY
  escalation: {{ onTimeout: use_default, onError: deny, notify: false }}
"#
    );
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn help_exits_zero_and_lists_subcommands() {
    pentest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pentest harness operator CLI"))
        .stdout(predicate::str::contains("contract"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("replay-finding"));
}

#[test]
fn version_shows_version_string() {
    pentest().arg("--version").assert().success().stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn contract_accepts_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let contract = write_contract(dir.path(), "example.com");
    pentest().arg("contract").arg(&contract).assert().success().stdout(predicate::str::contains("valid"));
}

#[test]
fn contract_rejects_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "not: [valid").unwrap();
    pentest().arg("contract").arg(&path).assert().failure();
}

#[test]
fn status_prints_budget_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let contract = write_contract(dir.path(), "example.com");
    pentest()
        .arg("status")
        .arg(&contract)
        .assert()
        .success()
        .stdout(predicate::str::contains("requests"))
        .stdout(predicate::str::contains("0/1000"));
}

#[test]
fn status_json_format_is_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let contract = write_contract(dir.path(), "example.com");
    let output = pentest().arg("--format").arg("json").arg("status").arg(&contract).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let _: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid JSON");
}

#[test]
fn replay_finding_rejects_out_of_scope_url() {
    let dir = tempfile::tempdir().unwrap();
    let contract = write_contract(dir.path(), "example.com");
    let finding = dir.path().join("finding.json");
    std::fs::write(
        &finding,
        serde_json::json!({
            "id": "f-1",
            "url": "https://not-allowed.com/",
            "method": "GET",
            "headers": {},
            "body": null,
            "expected": null,
        })
        .to_string(),
    )
    .unwrap();

    pentest()
        .arg("replay-finding")
        .arg("--contract")
        .arg(&contract)
        .arg(&finding)
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of scope").or(predicate::str::contains("is out of scope")));
}
