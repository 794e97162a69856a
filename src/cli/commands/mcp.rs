//! MCP command implementation.

use crate::config::Settings;
use crate::mcp::McpServer;
use crate::tools::ToolContext;
use anyhow::Result;
use std::sync::Arc;

/// Run the MCP server on stdio.
pub async fn run_mcp(settings: &Settings) -> Result<()> {
    let context = ToolContext::from_settings(settings)?;
    let server = McpServer::new(Arc::new(context));
    server.run().await
}
