//! MCP-style tool-call envelope and JSON-Schema argument validation (§6).

pub mod envelope;
pub mod schema;
pub mod tools;

pub use envelope::{ToolCall, ToolReply};
pub use schema::{ArgumentSchema, SchemaViolation};
