#![deny(unsafe_code)]

use anyhow::Context;
use browser_session::FantocciniDriver;
use clap::Parser;
use pentest_daemon::{build_app_state, transport, DaemonConfig, HttpPageOracle, Identity};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The pentest harness gateway: wires Scope Guard, Browser Session Core, and
/// Validator Core behind an MCP-style transport.
#[derive(Parser, Debug)]
#[command(name = "pentest-daemon", version, about = "Pentest harness trust-kernel gateway")]
struct Args {
    /// Bind address for the HTTP transport. The stdio transport is always
    /// also available and is selected with `--stdio`.
    #[arg(long, default_value = "127.0.0.1:8088")]
    bind: String,

    /// Speak the stdio transport (newline-delimited JSON) instead of HTTP.
    #[arg(long)]
    stdio: bool,

    /// Base URL of the page-understanding oracle service.
    #[arg(long, default_value = "http://127.0.0.1:4180")]
    oracle_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pentest_daemon=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Configuration errors are always fatal at startup (§7 category a):
    // there is no contract to gate the rest of the daemon against.
    let config = DaemonConfig::from_env().context("daemon configuration failed")?;

    let oracle = Arc::new(HttpPageOracle::new(args.oracle_url));
    // TODO: load identities from the identity store file collaborator (§6)
    // instead of starting empty; that loader lives outside this spec's core.
    let identities: Vec<Identity> = Vec::new();

    let state = build_app_state::<FantocciniDriver>(&config, oracle, identities)?;

    if args.stdio {
        info!("pentest-daemon listening on stdio");
        transport::run_stdio_loop(state.router).await
    } else {
        let app = transport::build_http_router(state.router);
        let listener = tokio::net::TcpListener::bind(&args.bind).await.with_context(|| format!("bind {}", args.bind))?;
        info!(bind = %args.bind, "pentest-daemon listening");
        axum::serve(listener, app).await.context("serve")
    }
}
