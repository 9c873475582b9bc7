//! Literal end-to-end scenarios from the testable-properties section.

use scope_guard::ScopeGuard;
use std::io::Write;

fn write_contract(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn base_contract(allow_domains: &str, deny_domains: &str, ip_ranges: &str, ports: &str) -> String {
    format!(
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
  domains: [{allow_domains}]
  ipRanges: [{ip_ranges}]
  ports: [{ports}]
  services: []
denylist:
  domains: [{deny_domains}]
  ipRanges: []
  ports: []
  pathKeywords: []
constraints:
  rate: {{ rps: 50.0, maxConcurrent: 10, burst: 50 }}
  budget: {{ maxTotalRequests: 1000, maxPerTarget: 500, maxDurationHours: 8 }}
  timeouts: {{ connectMs: 1000, readMs: 5000, totalMs: 10000 }}
approvalPolicy:
  mode: AUTO_APPROVE
  timeoutSec: 30
  defaultAction: DENY
  escalation: {{ onTimeout: use_default, onError: deny, notify: false }}
"#
    )
}

#[test]
fn scenario_1_allow_exact_host() {
    let file = write_contract(&base_contract(r#""api.example.com""#, "", "", "443"));
    let guard = ScopeGuard::load_contract(file.path()).unwrap();
    let result = guard.validate("https://api.example.com/v1/ping");
    assert!(result.valid);
    assert_eq!(result.matched_rule.as_deref(), Some("allowlist.domains: api.example.com"));
}

#[test]
fn scenario_2_wildcard_excludes_base() {
    let file = write_contract(&base_contract(r#""*.example.com""#, "", "", ""));
    let guard = ScopeGuard::load_contract(file.path()).unwrap();
    let result = guard.validate("https://example.com");
    assert!(!result.valid);
}

#[test]
fn scenario_3_deny_beats_allow() {
    let file = write_contract(&base_contract(
        r#""*.example.com""#,
        r#""prod.example.com""#,
        "",
        "",
    ));
    let guard = ScopeGuard::load_contract(file.path()).unwrap();
    let result = guard.validate("https://prod.example.com");
    assert!(!result.valid);
    assert_eq!(
        result.matched_rule.as_deref(),
        Some("denylist.domains: prod.example.com")
    );
}

#[test]
fn scenario_4_cidr_match_respects_port_gate() {
    let file = write_contract(&base_contract("", "", r#""10.0.0.0/24""#, "8080"));
    let guard = ScopeGuard::load_contract(file.path()).unwrap();
    assert!(guard.validate("http://10.0.0.17:8080").valid);

    let file2 = write_contract(&base_contract("", "", r#""10.0.0.0/24""#, "80"));
    let guard2 = ScopeGuard::load_contract(file2.path()).unwrap();
    assert!(!guard2.validate("http://10.0.0.17:8080").valid);
}

#[test]
fn assert_in_scope_is_required_before_side_effects() {
    let file = write_contract(&base_contract(r#""example.com""#, "", "", ""));
    let guard = ScopeGuard::load_contract(file.path()).unwrap();
    assert!(guard.assert_in_scope("https://example.com").is_ok());
    assert!(guard.assert_in_scope("https://not-in-scope.com").is_err());
}
