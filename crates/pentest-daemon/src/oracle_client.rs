//! The default [`PageOracle`] adapter: POSTs the oracle request envelope to
//! an HTTP endpoint and returns the raw response body. The core accepts any
//! conformant oracle; this is the one concrete wiring the daemon ships.

use async_trait::async_trait;
use browser_session::oracle::{ActionRequest, ExtractionRequest};
use browser_session::PageOracle;

/// Calls out to an HTTP page-understanding service (an LLM gateway, or a
/// rule-based stand-in) at a fixed base URL.
pub struct HttpPageOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPageOracle {
    /// Build an oracle client pointed at `base_url` (e.g.
    /// `http://localhost:4180`), which must expose `POST /action` and
    /// `POST /extract`.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

#[async_trait]
impl PageOracle for HttpPageOracle {
    async fn analyze_action(&self, request: ActionRequest) -> anyhow::Result<String> {
        let response = self.client.post(format!("{}/action", self.base_url)).json(&request).send().await?;
        Ok(response.text().await?)
    }

    async fn analyze_extraction(&self, request: ExtractionRequest) -> anyhow::Result<String> {
        let response = self.client.post(format!("{}/extract", self.base_url)).json(&request).send().await?;
        Ok(response.text().await?)
    }
}
