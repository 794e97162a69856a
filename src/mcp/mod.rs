//! MCP (Model Context Protocol) server for Lectern.
//!
//! Lets AI assistants call the Canvas tools.
//! Implements JSON-RPC 2.0 over stdio.

mod protocol;
mod server;
mod tools;

pub use protocol::Tool;
pub use server::McpServer;
pub use tools::get_tools;
