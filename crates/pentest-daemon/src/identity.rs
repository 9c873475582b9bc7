//! The identity store collaborator (§6): `list() / get(id) /
//! authHeadersFor(id)`, used by Validator Core's cross-identity checks.

use std::collections::BTreeMap;
use validator_core::{AuthType, IdentityProbe};

/// A configured test identity the harness may replay requests as.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable identifier referenced by findings and tool calls.
    pub id: String,
    /// How this identity's credential is carried on the wire.
    pub auth_type: AuthType,
    /// The credential value (bearer token, basic-auth blob, api key).
    pub auth_header: Option<String>,
    /// Cookie jar, for `AuthType::Cookie` identities.
    pub cookies: Vec<(String, String)>,
}

/// Raised when a tool call references an identity that was never configured.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown identity '{0}'")]
pub struct UnknownIdentity(pub String);

/// In-memory registry of the identities configured for one engagement.
pub struct IdentityStore {
    identities: BTreeMap<String, Identity>,
}

impl IdentityStore {
    /// Build a store from a fixed set of identities (typically loaded
    /// alongside the engagement contract).
    #[must_use]
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities: identities.into_iter().map(|i| (i.id.clone(), i)).collect() }
    }

    /// List every configured identity id, in a stable order.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.identities.keys().map(String::as_str).collect()
    }

    /// Fetch one identity by id.
    pub fn get(&self, id: &str) -> Result<&Identity, UnknownIdentity> {
        self.identities.get(id).ok_or_else(|| UnknownIdentity(id.to_string()))
    }

    /// Build an [`IdentityProbe`] for `id`, given whether it is expected to
    /// have access to the target under test.
    pub fn probe_for(&self, id: &str, should_have_access: bool) -> Result<IdentityProbe, UnknownIdentity> {
        let identity = self.get(id)?;
        Ok(IdentityProbe {
            identity_id: identity.id.clone(),
            auth_type: identity.auth_type,
            auth_header: identity.auth_header.clone(),
            cookies: identity.cookies.clone(),
            should_have_access,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> IdentityStore {
        IdentityStore::new(vec![
            Identity { id: "admin".to_string(), auth_type: AuthType::Bearer, auth_header: Some("admin-tok".to_string()), cookies: vec![] },
            Identity { id: "guest".to_string(), auth_type: AuthType::Bearer, auth_header: Some("guest-tok".to_string()), cookies: vec![] },
        ])
    }

    #[test]
    fn list_returns_every_identity() {
        let s = store();
        let mut ids = s.list();
        ids.sort_unstable();
        assert_eq!(ids, vec!["admin", "guest"]);
    }

    #[test]
    fn get_unknown_identity_errors() {
        let s = store();
        assert!(s.get("nobody").is_err());
    }

    #[test]
    fn probe_for_carries_should_have_access_through() {
        let s = store();
        let probe = s.probe_for("admin", true).unwrap();
        assert_eq!(probe.identity_id, "admin");
        assert!(probe.should_have_access);
    }
}
