//! CLI module for Lectern.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lectern - Canvas LMS tools for AI assistants
///
/// Serves course, assignment, discussion, file and quiz tools over MCP,
/// and runs them directly from the command line.
#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start MCP server for AI assistant integration
    Mcp,

    /// Check configuration and connectivity to Canvas
    Doctor,

    /// List enrolled courses
    Courses,

    /// List the available tools
    Tools,

    /// Run a single tool and print its output
    Call {
        /// Tool name (see `lectern tools`)
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration (token masked)
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
