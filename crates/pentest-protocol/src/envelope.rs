//! The wire envelope for tool calls (§6): `{name, arguments}` in, `{code,
//! message, details?}` out on failure, raw JSON out on success.

use pentest_error::ErrorDetails;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An incoming tool call: a tool name plus its JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name, e.g. `"scope.validate"` or `"browser.navigate"`.
    pub name: String,
    /// Arguments, validated against the tool's JSON Schema before dispatch.
    pub arguments: Value,
}

/// The reply to a tool call: either the tool's JSON result, or a structured
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ToolReply {
    /// The call succeeded; `result` is the tool's own JSON output.
    Ok {
        /// Tool-specific result payload.
        result: Value,
    },
    /// The call failed.
    Error {
        /// Structured error details (`code`, `message`, optional `details`).
        error: ErrorDetails,
    },
}

impl ToolReply {
    /// Build a successful reply from any serializable result.
    pub fn ok(result: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self::Ok { result: serde_json::to_value(result)? })
    }

    /// Build an error reply from error details.
    #[must_use]
    pub fn err(error: ErrorDetails) -> Self {
        Self::Error { error }
    }

    /// `true` for a successful reply.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pentest_error::ErrorCode;
    use std::collections::BTreeMap;

    #[test]
    fn tool_call_round_trips_through_json() {
        let call = ToolCall { name: "scope.validate".to_string(), arguments: serde_json::json!({"target": "https://example.com"}) };
        let json = serde_json::to_string(&call).unwrap();
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "scope.validate");
    }

    #[test]
    fn ok_reply_serializes_with_status_tag() {
        let reply = ToolReply::ok(serde_json::json!({"valid": true})).unwrap();
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["result"]["valid"], true);
        assert!(reply.is_ok());
    }

    #[test]
    fn error_reply_carries_code_and_message() {
        let details = ErrorDetails { code: ErrorCode::OutOfScope, message: "denied".to_string(), details: BTreeMap::new() };
        let reply = ToolReply::err(details);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["code"], "OUT_OF_SCOPE");
        assert!(!reply.is_ok());
    }
}
