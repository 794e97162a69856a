//! MCP server implementation.

use super::protocol::*;
use super::tools::get_tools;
use crate::tools::ToolContext;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "lectern";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP server exposing the Canvas tools over stdio.
///
/// Each request runs on its own task so a slow listing does not hold up
/// other calls; responses are funnelled through a single writer.
pub struct McpServer {
    tools: Arc<ToolContext>,
}

impl McpServer {
    pub fn new(tools: Arc<ToolContext>) -> Self {
        Self { tools }
    }

    /// Serve on stdin/stdout until stdin closes.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Lectern MCP server starting");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, answering on `writer`.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(req) => req,
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                    let _ = tx.send(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"));
                    continue;
                }
            };

            if request.is_notification() {
                debug!(method = %request.method, "Notification");
                continue;
            }

            let tools = Arc::clone(&self.tools);
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = handle_request(&tools, request).await;
                let _ = tx.send(response);
            });
        }

        // In-flight tasks hold their own senders; the writer drains them all.
        drop(tx);
        writer_task.await??;
        info!("Lectern MCP server stopped");
        Ok(())
    }
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Handle a single JSON-RPC request.
async fn handle_request(tools: &ToolContext, request: JsonRpcRequest) -> JsonRpcResponse {
    match request.method.as_str() {
        "initialize" => handle_initialize(request.id, request.params),
        "ping" => JsonRpcResponse::success(request.id, json!({})),
        "tools/list" => to_response(request.id, ToolsListResult { tools: get_tools() }),
        "tools/call" => handle_tools_call(tools, request.id, request.params).await,
        _ => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            &format!("Method not found: {}", request.method),
        ),
    }
}

fn handle_initialize(id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
    let params: InitializeParams = params
        .and_then(|p| serde_json::from_value(p).ok())
        .unwrap_or_default();
    if let Some(client) = &params.client_info {
        info!(
            client = %client.name,
            version = client.version.as_deref().unwrap_or("?"),
            protocol = params.protocol_version.as_deref().unwrap_or("?"),
            "Client connected"
        );
    }

    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
        },
    };
    to_response(id, result)
}

async fn handle_tools_call(
    tools: &ToolContext,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: ToolCallParams = match params.map(serde_json::from_value) {
        Some(Ok(params)) => params,
        Some(Err(e)) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, &format!("Invalid params: {}", e))
        }
        None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
    };

    let arguments = params.arguments.unwrap_or(Value::Null);
    let result = match tools.call(&params.name, &arguments).await {
        Ok(text) => ToolCallResult::text(text),
        Err(e) => {
            warn!(tool = %params.name, error = %e, "Tool call failed");
            ToolCallResult::error(e.to_string())
        }
    };
    to_response(id, result)
}

fn to_response<T: serde::Serialize>(id: Option<Value>, result: T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, &e.to_string()),
    }
}
