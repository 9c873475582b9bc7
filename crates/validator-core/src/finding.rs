//! The `Finding` data model: an immutable, replayable record of one request
//! that produced evidence of a vulnerability (§3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP methods a recorded request may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// Whether this method's requests carry a body worth replaying.
    #[must_use]
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    /// The corresponding `reqwest::Method`.
    #[must_use]
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Expected response shape asserted by a reproduction attempt (§4.3.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// Exact status code expected, if any.
    pub status_code: Option<u16>,
    /// Substrings that must all be present in the body.
    #[serde(default)]
    pub body_contains: Vec<String>,
    /// Substrings that must all be absent from the body.
    #[serde(default)]
    pub body_not_contains: Vec<String>,
    /// A regex the body must match, if given.
    pub body_regex: Option<String>,
}

/// An immutable, replayable HTTP request captured as evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Unique identifier for this finding.
    pub id: String,
    /// The request URL.
    pub url: String,
    /// HTTP method used.
    pub method: HttpMethod,
    /// Headers as originally captured.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body, if any (for POST/PUT/PATCH).
    pub body: Option<String>,
    /// Optional expected-response assertion for reproduction.
    pub expected: Option<Expectation>,
}
