//! CLI command implementations.

mod call;
mod config;
mod courses;
mod doctor;
mod mcp;

pub use call::{run_call, run_tools};
pub use config::run_config;
pub use courses::run_courses;
pub use doctor::run_doctor;
pub use mcp::run_mcp;
