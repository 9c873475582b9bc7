//! Literal end-to-end scenarios from the testable-properties list.

use std::collections::BTreeMap;
use validator_core::{
    run_cross_identity, run_repro, AuthType, Expectation, Finding, HttpMethod, IdentityProbe,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn finding_for(url: String) -> Finding {
    Finding {
        id: "f1".to_string(),
        url,
        method: HttpMethod::Get,
        headers: BTreeMap::new(),
        body: None,
        expected: Some(Expectation {
            status_code: Some(200),
            body_contains: vec!["token".to_string()],
            ..Default::default()
        }),
    }
}

#[tokio::test]
async fn repro_consistent_three_identical_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":"abc"}"#))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let finding = finding_for(format!("{}/account", server.uri()));

    let result = run_repro(&client, &finding, 3).await;
    assert_eq!(result.success_rate, 1.0);
    assert!(result.consistent);
    assert_eq!(result.attempts.len(), 3);
}

#[tokio::test]
async fn cross_identity_violation_when_guest_matches_admin_access() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let finding = Finding {
        id: "f2".to_string(),
        url: format!("{}/admin", server.uri()),
        method: HttpMethod::Get,
        headers: BTreeMap::new(),
        body: None,
        expected: None,
    };

    let probes = vec![
        IdentityProbe {
            identity_id: "admin".to_string(),
            auth_type: AuthType::Bearer,
            auth_header: Some("admin-token".to_string()),
            cookies: vec![],
            should_have_access: true,
        },
        IdentityProbe {
            identity_id: "guest".to_string(),
            auth_type: AuthType::Bearer,
            auth_header: Some("guest-token".to_string()),
            cookies: vec![],
            should_have_access: false,
        },
    ];

    let result = run_cross_identity(&client, &finding, &probes).await;
    assert_eq!(result.results.len(), probes.len());
    assert!(!result.authorization_enforced);
    let guest = result.results.iter().find(|r| r.identity_id == "guest").unwrap();
    assert!(guest.violation);
    assert_eq!(guest.status, Some(200));
}
