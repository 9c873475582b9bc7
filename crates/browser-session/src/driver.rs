//! The browser driver contract: an external collaborator wrapping whatever
//! concrete automation backend (CDP, WebDriver) a deployment wires in. Core
//! logic in this crate depends only on this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options passed when allocating a new browser context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Upstream HTTP(S) interception proxy every request is routed through.
    pub proxy_url: String,
    /// Run without a visible window.
    pub headless: bool,
    /// Optional user agent override.
    pub user_agent: Option<String>,
}

/// Outcome of a `navigate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateOutcome {
    /// URL after following any redirects.
    pub final_url: String,
    /// HTTP status code of the final response.
    pub status_code: u16,
    /// Every hop visited, in order, for scope re-validation.
    pub redirect_chain: Vec<String>,
}

/// Outcome of an `act` call against the DOM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActOutcome {
    /// The selector the oracle picked and the driver executed against.
    pub selector_used: String,
    /// Whether the DOM operation completed without error.
    pub succeeded: bool,
    /// URL after the action settled (e.g. a form submit navigated away).
    pub post_url: String,
}

/// A JavaScript dialog (`alert`/`confirm`/`prompt`) captured during a probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogEvent {
    /// Dialog kind, e.g. `"alert"`.
    pub kind: String,
    /// The text passed to the dialog.
    pub message: String,
}

/// Failure reaching or maintaining the interception proxy for a session.
/// Terminal for session creation (§4.2 "Proxy discipline").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConnectionError {
    /// The proxy URL that could not be reached.
    pub proxy_url: String,
    /// Underlying error message.
    pub message: String,
}

impl std::fmt::Display for ProxyConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not connect to proxy {}: {}", self.proxy_url, self.message)
    }
}

impl std::error::Error for ProxyConnectionError {}

/// The browser automation backend a [`crate::core::BrowserSessionCore`] drives.
///
/// One driver instance corresponds to one browser context/tab. Every method
/// operates against that single context.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Allocate the underlying browser context, pinned to `options.proxy_url`
    /// for its whole lifetime.
    async fn open(options: &SessionOptions) -> Result<Self, ProxyConnectionError>
    where
        Self: Sized;

    /// Navigate to `url`, following redirects at the driver level.
    async fn navigate(&self, url: &str) -> anyhow::Result<NavigateOutcome>;

    /// Fill a form field matched by `selector`.
    async fn fill(&self, selector: &str, value: &str) -> anyhow::Result<()>;

    /// Click the element matched by `selector`.
    async fn click(&self, selector: &str) -> anyhow::Result<()>;

    /// Select an option on the element matched by `selector`.
    async fn select(&self, selector: &str, value: &str) -> anyhow::Result<()>;

    /// Submit the form containing `selector`.
    async fn submit(&self, selector: &str) -> anyhow::Result<ActOutcome>;

    /// Visible text content of the current page.
    async fn page_text(&self) -> anyhow::Result<String>;

    /// Interactive elements currently visible, for the oracle's action request.
    async fn visible_interactive_elements(&self) -> anyhow::Result<Vec<crate::oracle::VisibleElement>>;

    /// Raw HTML of the current page, for marker-reflection scanning.
    async fn page_html(&self) -> anyhow::Result<String>;

    /// Current URL.
    async fn current_url(&self) -> anyhow::Result<String>;

    /// Start capturing `alert`/`confirm`/`prompt` dialogs, auto-dismissing
    /// each so the page is not blocked.
    async fn install_dialog_listener(&self) -> anyhow::Result<()>;

    /// Drain dialogs captured since the last call.
    async fn drain_dialog_events(&self) -> anyhow::Result<Vec<DialogEvent>>;

    /// Capture a screenshot of the current viewport.
    async fn screenshot(&self) -> anyhow::Result<Vec<u8>>;

    /// Tear down the underlying browser context. Idempotent.
    async fn close(&self) -> anyhow::Result<()>;
}
