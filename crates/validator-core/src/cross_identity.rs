//! Cross-identity checks (§4.3.3): replay a finding's request as several
//! distinct identities and confirm access is granted or denied as each
//! identity's expectation says it should be.

use crate::finding::Finding;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Instant;

/// How an identity's credential is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    Basic,
    ApiKey,
    Cookie,
}

/// One identity to replay the finding's request as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProbe {
    pub identity_id: String,
    pub auth_type: AuthType,
    pub auth_header: Option<String>,
    #[serde(default)]
    pub cookies: Vec<(String, String)>,
    pub should_have_access: bool,
}

/// Result of replaying as one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResult {
    pub identity_id: String,
    pub status: Option<u16>,
    pub sha256: Option<String>,
    pub has_access: bool,
    pub expected_access: bool,
    pub ms: u64,
    /// `true` when `has_access != expected_access`.
    pub violation: bool,
}

/// Aggregate cross-identity run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossIdentityResult {
    pub results: Vec<IdentityResult>,
    /// `true` iff no identity violated its expected access.
    pub authorization_enforced: bool,
}

fn auth_header_for(probe: &IdentityProbe) -> Option<(String, String)> {
    match probe.auth_type {
        AuthType::Bearer => probe.auth_header.clone().map(|v| ("Authorization".to_string(), format!("Bearer {v}"))),
        AuthType::Basic => probe.auth_header.clone().map(|v| ("Authorization".to_string(), format!("Basic {v}"))),
        AuthType::ApiKey => probe.auth_header.clone().map(|v| ("X-API-Key".to_string(), v)),
        AuthType::Cookie => {
            if probe.cookies.is_empty() {
                None
            } else {
                let joined = probe.cookies.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("; ");
                Some(("Cookie".to_string(), joined))
            }
        }
    }
}

fn has_access(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Replay `finding`'s request as each identity in `probes` and record whether
/// each got the access it was expected to get.
pub async fn run_cross_identity(
    client: &reqwest::Client,
    finding: &Finding,
    probes: &[IdentityProbe],
) -> CrossIdentityResult {
    let mut results = Vec::with_capacity(probes.len());

    for probe in probes {
        let start = Instant::now();
        let mut builder = client.request(finding.method.as_reqwest(), &finding.url);
        for (k, v) in &finding.headers {
            let lower = k.to_lowercase();
            if lower == "authorization" || lower == "x-api-key" || lower == "cookie" {
                continue;
            }
            builder = builder.header(k, v);
        }
        if let Some((name, value)) = auth_header_for(probe) {
            builder = builder.header(name, value);
        }
        if finding.method.carries_body() {
            if let Some(body) = &finding.body {
                builder = builder.body(body.clone());
            }
        }

        let result = match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                let mut hasher = Sha256::new();
                hasher.update(body.as_bytes());
                let sha256 = hex::encode(hasher.finalize());
                let got_access = has_access(status);
                IdentityResult {
                    identity_id: probe.identity_id.clone(),
                    status: Some(status),
                    sha256: Some(sha256),
                    has_access: got_access,
                    expected_access: probe.should_have_access,
                    ms: start.elapsed().as_millis() as u64,
                    violation: got_access != probe.should_have_access,
                }
            }
            Err(_) => IdentityResult {
                identity_id: probe.identity_id.clone(),
                status: None,
                sha256: None,
                has_access: false,
                expected_access: probe.should_have_access,
                ms: start.elapsed().as_millis() as u64,
                violation: probe.should_have_access,
            },
        };
        results.push(result);
    }

    let authorization_enforced = results.iter().all(|r| !r.violation);
    CrossIdentityResult { results, authorization_enforced }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_auth_header_is_formatted() {
        let probe = IdentityProbe {
            identity_id: "user-a".to_string(),
            auth_type: AuthType::Bearer,
            auth_header: Some("tok123".to_string()),
            cookies: vec![],
            should_have_access: true,
        };
        let (name, value) = auth_header_for(&probe).unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Bearer tok123");
    }

    #[test]
    fn api_key_uses_x_api_key_header() {
        let probe = IdentityProbe {
            identity_id: "user-b".to_string(),
            auth_type: AuthType::ApiKey,
            auth_header: Some("key-xyz".to_string()),
            cookies: vec![],
            should_have_access: false,
        };
        let (name, value) = auth_header_for(&probe).unwrap();
        assert_eq!(name, "X-API-Key");
        assert_eq!(value, "key-xyz");
    }

    #[test]
    fn cookie_auth_joins_multiple_cookies() {
        let probe = IdentityProbe {
            identity_id: "user-c".to_string(),
            auth_type: AuthType::Cookie,
            auth_header: None,
            cookies: vec![("session".to_string(), "abc".to_string()), ("csrf".to_string(), "def".to_string())],
            should_have_access: true,
        };
        let (name, value) = auth_header_for(&probe).unwrap();
        assert_eq!(name, "Cookie");
        assert_eq!(value, "session=abc; csrf=def");
    }

    #[test]
    fn has_access_classifies_2xx_3xx_as_access() {
        assert!(has_access(200));
        assert!(has_access(302));
        assert!(!has_access(401));
        assert!(!has_access(403));
        assert!(!has_access(500));
    }
}
