//! MCP-style transports: newline-delimited JSON over stdio, and an HTTP
//! `POST /tools/call` surface for operators who prefer a request/response
//! loop over a pipe.

use crate::tools::ToolRouter;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use browser_session::BrowserDriver;
use pentest_protocol::{ToolCall, ToolReply};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Logs method, path, status, and duration for each `/tools/call` request.
async fn request_logger(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let start = Instant::now();

    let resp = next.run(req).await;

    info!(
        http.method = %method,
        http.path = %path,
        http.status = resp.status().as_u16(),
        http.duration_ms = start.elapsed().as_millis() as u64,
        "tool call request completed"
    );
    resp
}

impl IntoResponse for ToolReply {
    fn into_response(self) -> Response {
        let status = if self.is_ok() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
        (status, Json(self)).into_response()
    }
}

async fn call_handler<D: BrowserDriver + 'static>(
    State(router): State<Arc<ToolRouter<D>>>,
    Json(call): Json<ToolCall>,
) -> ToolReply {
    router.dispatch(call).await
}

/// Build the HTTP transport's router, mounting `/tools/call` against the
/// given dispatch state.
pub fn build_http_router<D: BrowserDriver + 'static>(router: Arc<ToolRouter<D>>) -> Router {
    Router::new()
        .route("/tools/call", post(call_handler::<D>))
        .with_state(router)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logger)),
        )
}

/// Run the stdio transport: read one JSON `ToolCall` per line from `stdin`,
/// dispatch it, and write one JSON `ToolReply` per line to `stdout`. Returns
/// when `stdin` reaches EOF.
pub async fn run_stdio_loop<D: BrowserDriver + 'static>(router: Arc<ToolRouter<D>>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<ToolCall>(&line) {
            Ok(call) => {
                info!(tool = %call.name, "dispatching tool call");
                router.dispatch(call).await
            }
            Err(e) => {
                error!(error = %e, "malformed tool call on stdio transport");
                ToolReply::err(pentest_error::ErrorDetails {
                    code: pentest_error::ErrorCode::Internal,
                    message: format!("malformed tool call: {e}"),
                    details: Default::default(),
                })
            }
        };
        let encoded = serde_json::to_string(&reply)?;
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}
