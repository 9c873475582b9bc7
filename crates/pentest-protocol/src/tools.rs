//! JSON Schemas for the tool-call arguments this harness exposes over the
//! MCP-style transport. One schema per tool name; `pentest-daemon` compiles
//! these once at startup and validates every incoming [`crate::ToolCall`]
//! before dispatch.

use serde_json::{json, Value};

/// `scope.validate { target }`
#[must_use]
pub fn scope_validate_schema() -> Value {
    json!({
        "type": "object",
        "required": ["target"],
        "properties": { "target": { "type": "string", "minLength": 1 } }
    })
}

/// `browser.create_session { headless?, userAgent? }`
#[must_use]
pub fn browser_create_session_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "headless": { "type": "boolean" },
            "userAgent": { "type": "string" }
        }
    })
}

/// `browser.navigate { sessionId, url }`
#[must_use]
pub fn browser_navigate_schema() -> Value {
    json!({
        "type": "object",
        "required": ["sessionId", "url"],
        "properties": {
            "sessionId": { "type": "string", "minLength": 1 },
            "url": { "type": "string", "minLength": 1 }
        }
    })
}

/// `browser.act { sessionId, instruction }`
#[must_use]
pub fn browser_act_schema() -> Value {
    json!({
        "type": "object",
        "required": ["sessionId", "instruction"],
        "properties": {
            "sessionId": { "type": "string", "minLength": 1 },
            "instruction": { "type": "string", "minLength": 1 }
        }
    })
}

/// `browser.extract { sessionId, instruction }`
#[must_use]
pub fn browser_extract_schema() -> Value {
    json!({
        "type": "object",
        "required": ["sessionId", "instruction"],
        "properties": {
            "sessionId": { "type": "string", "minLength": 1 },
            "instruction": { "type": "string", "minLength": 1 }
        }
    })
}

/// `browser.xss_probe { sessionId, formSelector, fieldName, payloads? }`
#[must_use]
pub fn browser_xss_probe_schema() -> Value {
    json!({
        "type": "object",
        "required": ["sessionId", "formSelector", "fieldName"],
        "properties": {
            "sessionId": { "type": "string", "minLength": 1 },
            "formSelector": { "type": "string", "minLength": 1 },
            "fieldName": { "type": "string", "minLength": 1 },
            "payloads": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["template", "context"],
                    "properties": {
                        "template": { "type": "string" },
                        "context": { "type": "string", "enum": ["html", "attribute", "url"] }
                    }
                }
            }
        }
    })
}

/// `validator.run_repro { finding, count? }`
#[must_use]
pub fn validator_run_repro_schema() -> Value {
    json!({
        "type": "object",
        "required": ["finding"],
        "properties": {
            "finding": { "type": "object" },
            "count": { "type": "integer", "minimum": 1 }
        }
    })
}

/// `validator.run_cross_identity { finding, identities }`
#[must_use]
pub fn validator_run_cross_identity_schema() -> Value {
    json!({
        "type": "object",
        "required": ["finding", "identities"],
        "properties": {
            "finding": { "type": "object" },
            "identities": { "type": "array", "minItems": 1 }
        }
    })
}

/// `validator.run_negative_control { finding, control }`
#[must_use]
pub fn validator_run_negative_control_schema() -> Value {
    json!({
        "type": "object",
        "required": ["finding", "control"],
        "properties": {
            "finding": { "type": "object" },
            "control": {
                "type": "object",
                "required": ["controlType"],
                "properties": {
                    "controlType": {
                        "type": "string",
                        "enum": ["unauthenticated", "invalid_token", "different_user", "modified_request"]
                    },
                    "modifiedHeaders": { "type": "object" },
                    "modifiedBody": { "type": "string" },
                    "removeAuth": { "type": "boolean" },
                    "expectedStatus": { "type": "integer", "minimum": 100, "maximum": 599 }
                }
            }
        }
    })
}
