//! The gateway process: wires Scope Guard, Browser Session Core, and
//! Validator Core behind an MCP-style stdio/HTTP transport, and owns the
//! evidence sink, identity store, and oracle collaborator adapters (§6).

pub mod config;
pub mod evidence;
pub mod identity;
pub mod oracle_client;
pub mod tools;
pub mod transport;

pub use config::{ConfigError, DaemonConfig};
pub use evidence::{EvidenceError, EvidencePayload, EvidenceUri, FsEvidenceSink, Redactor};
pub use identity::{Identity, IdentityStore, UnknownIdentity};
pub use oracle_client::HttpPageOracle;
pub use tools::ToolRouter;

use browser_session::{BrowserDriver, BrowserSessionCore, PageOracle};
use scope_guard::ScopeGuard;
use std::sync::Arc;
use std::time::Duration;
use validator_core::ValidatorCore;

/// Everything the transports need to dispatch a tool call for one running
/// engagement.
pub struct AppState<D: BrowserDriver + 'static> {
    /// The tool-call dispatcher.
    pub router: Arc<ToolRouter<D>>,
    /// The engagement's evidence sink, for handlers that need direct access
    /// (e.g. a future `evidence.fetch` tool).
    pub evidence: Arc<FsEvidenceSink>,
}

/// Build the scope-gated subsystems and the tool router for one engagement,
/// from a loaded [`DaemonConfig`] and a page-oracle collaborator.
pub fn build_app_state<D: BrowserDriver + 'static>(
    config: &DaemonConfig,
    oracle: Arc<dyn PageOracle>,
    identities: Vec<Identity>,
) -> anyhow::Result<AppState<D>> {
    let scope_guard = Arc::new(ScopeGuard::load_contract(&config.scope_file)?);
    let browser = Arc::new(BrowserSessionCore::new(
        scope_guard.clone(),
        config.max_sessions,
        Duration::from_millis(30 * 60 * 1000),
        config.engagement_id.clone(),
    ));
    let validator = Arc::new(ValidatorCore::new(scope_guard.clone()));
    let identity_store = Arc::new(IdentityStore::new(identities));
    let evidence = Arc::new(FsEvidenceSink::new(config.evidence_dir.clone())?);

    let router = Arc::new(ToolRouter::new(
        scope_guard,
        browser,
        validator,
        identity_store,
        oracle,
        config.burp_proxy_url.clone(),
        config.headless,
    ));

    Ok(AppState { router, evidence })
}
