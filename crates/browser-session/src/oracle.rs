//! The page oracle contract (§4.2.1): an external collaborator that maps a
//! natural-language instruction plus page state to a DOM action or an
//! extraction result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Truncation limits the core enforces before handing page content to the
/// oracle, regardless of what the oracle implementation itself does.
pub const MAX_ACTION_CHARS: usize = 2_000;
/// Truncation limit for extraction requests.
pub const MAX_EXTRACTION_CHARS: usize = 8_000;

/// A DOM element summary passed to the oracle so it can ground a selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibleElement {
    /// A CSS selector the oracle may return verbatim in its response.
    pub selector: String,
    /// Element tag name, e.g. `"input"`.
    pub tag: String,
    /// Visible text or accessible label, if any.
    pub label: Option<String>,
}

/// Request shape for an `act` oracle call.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    /// The natural-language instruction from the caller.
    pub instruction: String,
    /// Interactive elements currently visible on the page.
    pub visible_interactive_elements: Vec<VisibleElement>,
    /// Page text, truncated to [`MAX_ACTION_CHARS`].
    pub truncated_text: String,
}

/// Request shape for an `extract` oracle call.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    /// The natural-language extraction instruction.
    pub instruction: String,
    /// Page text, truncated to [`MAX_EXTRACTION_CHARS`].
    pub truncated_text: String,
}

/// The kind of DOM action the oracle selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Click the selected element.
    Click,
    /// Fill the selected element with `value`.
    Fill,
    /// Select an option on the selected element.
    Select,
}

/// A validated oracle response for an `act` call.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleAction {
    /// CSS selector identifying the target element.
    pub selector: String,
    /// The kind of action to perform.
    pub action_type: ActionType,
    /// Value to fill or select, required for `fill`/`select`.
    pub value: Option<String>,
}

/// Raised when an oracle response does not conform to the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleError {
    /// What was wrong with the response.
    pub message: String,
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oracle response error: {}", self.message)
    }
}

impl std::error::Error for OracleError {}

/// An opaque analysis function: natural language in, a grounded action or
/// extracted JSON out. Implementations wrap a concrete model/service; the
/// core only depends on this trait.
#[async_trait]
pub trait PageOracle: Send + Sync {
    /// Request a DOM action for an `act` call. The raw string returned is
    /// parsed and validated by [`parse_action_response`].
    async fn analyze_action(&self, request: ActionRequest) -> anyhow::Result<String>;

    /// Request JSON (or free text) extracted from the page for an `extract`
    /// call. The raw string is post-processed by [`parse_extraction_response`].
    async fn analyze_extraction(&self, request: ExtractionRequest) -> anyhow::Result<String>;
}

/// Truncate `text` to at most `limit` chars, preferring a char boundary.
#[must_use]
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    text.chars().take(limit).collect()
}

/// Strip a leading/trailing ```json or ``` fence, if present, so the oracle
/// may wrap its JSON response in markdown without breaking parsing.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_lang = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_lang.strip_suffix("```").unwrap_or(without_lang).trim()
}

/// Parse and validate a raw oracle response for an `act` call.
pub fn parse_action_response(raw: &str) -> Result<OracleAction, OracleError> {
    let cleaned = strip_code_fence(raw);
    let action: OracleAction = serde_json::from_str(cleaned).map_err(|e| OracleError {
        message: format!("not valid JSON: {e}"),
    })?;

    if action.selector.trim().is_empty() {
        return Err(OracleError { message: "missing selector".to_string() });
    }
    if matches!(action.action_type, ActionType::Fill | ActionType::Select) && action.value.is_none() {
        return Err(OracleError {
            message: format!("{:?} requires a value", action.action_type),
        });
    }

    Ok(action)
}

/// Parse an `extract` response: valid JSON passes through unwrapped, any
/// other content is wrapped as `{"text": raw}`.
#[must_use]
pub fn parse_extraction_response(raw: &str) -> serde_json::Value {
    let cleaned = strip_code_fence(raw);
    serde_json::from_str(cleaned).unwrap_or_else(|_| serde_json::json!({ "text": raw }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_limit() {
        let text = "a".repeat(3000);
        assert_eq!(truncate(&text, MAX_ACTION_CHARS).chars().count(), MAX_ACTION_CHARS);
    }

    #[test]
    fn truncate_is_noop_under_limit() {
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"selector\":\"#x\",\"actionType\":\"click\"}\n```";
        assert_eq!(strip_code_fence(raw), r#"{"selector":"#x","actionType":"click"}"#);
    }

    #[test]
    fn strips_bare_code_fence() {
        let raw = "```\n{\"selector\":\"#x\",\"actionType\":\"click\"}\n```";
        assert_eq!(strip_code_fence(raw), r#"{"selector":"#x","actionType":"click"}"#);
    }

    #[test]
    fn parses_valid_click_action() {
        let action = parse_action_response(r#"{"selector":"#submit","actionType":"click"}"#).unwrap();
        assert_eq!(action.selector, "#submit");
        assert_eq!(action.action_type, ActionType::Click);
    }

    #[test]
    fn rejects_fill_without_value() {
        let err = parse_action_response(r#"{"selector":"#x","actionType":"fill"}"#).unwrap_err();
        assert!(err.message.contains("requires a value"));
    }

    #[test]
    fn rejects_missing_selector() {
        let err = parse_action_response(r#"{"selector":"","actionType":"click"}"#).unwrap_err();
        assert!(err.message.contains("missing selector"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_action_response("not json").is_err());
    }

    #[test]
    fn extraction_passes_through_valid_json() {
        let value = parse_extraction_response(r#"{"token":"abc"}"#);
        assert_eq!(value, serde_json::json!({"token": "abc"}));
    }

    #[test]
    fn extraction_wraps_non_json_as_text() {
        let value = parse_extraction_response("plain text result");
        assert_eq!(value, serde_json::json!({"text": "plain text result"}));
    }
}
