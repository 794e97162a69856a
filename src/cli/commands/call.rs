//! Direct tool invocation from the command line.

use crate::cli::Output;
use crate::config::Settings;
use crate::mcp::get_tools;
use crate::tools::ToolContext;
use anyhow::{Context, Result};
use serde_json::Value;

/// Run one tool and print its text output.
pub async fn run_call(settings: &Settings, tool: &str, arguments: &str) -> Result<()> {
    let arguments = parse_arguments(arguments)?;
    let context = ToolContext::from_settings(settings)?;
    let text = context
        .call(tool, &arguments)
        .await
        .with_context(|| format!("{} failed", tool))?;
    println!("{}", text);
    Ok(())
}

/// Print the tool catalog.
pub fn run_tools() -> Result<()> {
    let tools = get_tools();
    Output::header(&format!("Tools ({})", tools.len()));
    for tool in &tools {
        Output::tool(&tool.name, first_line(&tool.description));
    }
    Ok(())
}

fn parse_arguments(raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).context("Tool arguments must be a JSON object")?;
    anyhow::ensure!(
        value.is_object(),
        "Tool arguments must be a JSON object, got: {}",
        raw
    );
    Ok(value)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let value = parse_arguments(r#"{"course_identifier": "CS_101"}"#).unwrap();
        assert_eq!(value["course_identifier"], "CS_101");

        assert!(parse_arguments("[1, 2]").is_err());
        assert!(parse_arguments("course=CS_101").is_err());
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("List quizzes.\nMore detail."), "List quizzes.");
        assert_eq!(first_line(""), "");
    }
}
