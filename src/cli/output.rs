//! CLI output formatting utilities.

use console::style;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a course line: code in bold, name, ID dimmed.
    pub fn course(code: &str, name: &str, id: u64) {
        println!(
            "  {} {} {} ({})",
            style("*").cyan(),
            style(code).bold(),
            name,
            style(id).dim()
        );
    }

    /// Print a tool name with its description.
    pub fn tool(name: &str, description: &str) {
        println!("  {} {}", style(name).bold(), style(description).dim());
    }
}
