//! Lectern - Canvas LMS tools for AI assistants
//!
//! A client for the Canvas LMS REST API that exposes course content,
//! discussions, files and quizzes as tools over the Model Context Protocol.
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `client` - Authenticated transport: pagination, rate limits, retries
//! - `resolver` - Course code to numeric ID resolution
//! - `quiz` - Quiz eligibility and attempt state
//! - `tools` - The tool surface rendered as plain text
//! - `mcp` - JSON-RPC server over stdio
//!
//! # Example
//!
//! ```rust,no_run
//! use lectern::config::Settings;
//! use lectern::tools::ToolContext;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let tools = ToolContext::from_settings(&settings)?;
//!
//!     let text = tools
//!         .call("list_assignments", &json!({"course_identifier": "CS_101"}))
//!         .await?;
//!     println!("{}", text);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod mcp;
pub mod quiz;
pub mod resolver;
pub mod tools;

pub use error::{LecternError, Result};
