//! Hash-chained audit trail for Scope Guard decisions.
//!
//! Every `assertInScope`, `consume`, and `approval` call appends one event.
//! Each event's hash covers its own fields plus the previous event's hash, so
//! the log can be verified for tamper-evidence end to end.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// RFC 3339 timestamp.
    pub ts_utc: String,
    /// Engagement this event belongs to.
    pub engagement_id: String,
    /// Event discriminator, e.g. `"SCOPE_ALLOWED"`, `"SCOPE_DENIED"`,
    /// `"BUDGET_EXCEEDED"`, `"APPROVAL_DECIDED"`.
    pub event_type: String,
    /// Arbitrary structured detail for this event type.
    pub details: serde_json::Value,
    /// Hash of the preceding event, or all-zero for the first event.
    pub prev_event_hash: String,
    /// SHA-256 of this event's other fields plus `prev_event_hash`.
    pub event_hash: String,
}

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

fn compute_hash(
    ts_utc: &str,
    engagement_id: &str,
    event_type: &str,
    details: &serde_json::Value,
    prev_event_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ts_utc.as_bytes());
    hasher.update(engagement_id.as_bytes());
    hasher.update(event_type.as_bytes());
    hasher.update(details.to_string().as_bytes());
    hasher.update(prev_event_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Append-only, hash-chained audit log for one engagement.
pub struct AuditLog {
    engagement_id: String,
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    /// Create an empty log for the given engagement.
    #[must_use]
    pub fn new(engagement_id: impl Into<String>) -> Self {
        Self {
            engagement_id: engagement_id.into(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Append a new event, chaining it to the previous event's hash.
    pub fn append(&self, event_type: impl Into<String>, details: serde_json::Value) -> AuditEvent {
        let ts_utc = chrono::Utc::now().to_rfc3339();
        let event_type = event_type.into();

        let mut events = self.events.lock().expect("audit log lock poisoned");
        let prev_event_hash = events
            .last()
            .map(|e| e.event_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let event_hash = compute_hash(&ts_utc, &self.engagement_id, &event_type, &details, &prev_event_hash);

        let event = AuditEvent {
            ts_utc,
            engagement_id: self.engagement_id.clone(),
            event_type,
            details,
            prev_event_hash,
            event_hash,
        };
        events.push(event.clone());
        event
    }

    /// Return a snapshot of all events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit log lock poisoned").clone()
    }

    /// The engagement id this log was created for, used as the
    /// `correlation_id` field on tracing events emitted alongside it.
    #[must_use]
    pub fn engagement_id(&self) -> &str {
        &self.engagement_id
    }

    /// Verify the entire chain: every event's `event_hash` must be
    /// recomputable from its fields, and each `prev_event_hash` must match
    /// its predecessor.
    #[must_use]
    pub fn verify(&self) -> bool {
        let events = self.events.lock().expect("audit log lock poisoned");
        let mut expected_prev = GENESIS_HASH.to_string();
        for event in events.iter() {
            if event.prev_event_hash != expected_prev {
                return false;
            }
            let recomputed = compute_hash(
                &event.ts_utc,
                &event.engagement_id,
                &event.event_type,
                &event.details,
                &event.prev_event_hash,
            );
            if recomputed != event.event_hash {
                return false;
            }
            expected_prev = event.event_hash.clone();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_links_and_verifies() {
        let log = AuditLog::new("eng-1");
        log.append("SCOPE_ALLOWED", json!({"host": "example.com"}));
        log.append("BUDGET_EXCEEDED", json!({"kind": "maxTotalRequests"}));
        assert!(log.verify());
        assert_eq!(log.events().len(), 2);
    }

    #[test]
    fn first_event_chains_to_genesis() {
        let log = AuditLog::new("eng-1");
        let event = log.append("SCOPE_ALLOWED", json!({}));
        assert_eq!(event.prev_event_hash, GENESIS_HASH);
    }

    #[test]
    fn tampering_breaks_verification() {
        let log = AuditLog::new("eng-1");
        log.append("SCOPE_ALLOWED", json!({"host": "example.com"}));
        {
            let mut events = log.events.lock().unwrap();
            events[0].details = json!({"host": "evil.com"});
        }
        assert!(!log.verify());
    }
}
