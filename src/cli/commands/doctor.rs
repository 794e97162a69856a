//! Doctor command - verify configuration and Canvas connectivity.

use crate::cli::Output;
use crate::client::{LmsApi, LmsClient, Query};
use crate::config::{Settings, ENV_API_TOKEN};
use console::style;
use std::path::PathBuf;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("Lectern Doctor");
    println!();
    println!("Checking configuration and Canvas connectivity...\n");

    let mut checks = Vec::new();

    println!("{}", style("Configuration").bold());
    let section = vec![
        check_config_file(config_path),
        check_base_url(settings),
        check_token(settings),
    ];
    for check in &section {
        check.print();
    }
    checks.extend(section);

    println!();

    println!("{}", style("Canvas").bold());
    let connectivity = if checks.iter().any(|c| c.status == CheckStatus::Error) {
        CheckResult::warning("Connectivity", "skipped", "Fix the configuration errors above first")
    } else {
        check_connectivity(settings).await
    };
    connectivity.print();
    checks.push(connectivity);

    println!();

    println!("{}", style("Downloads").bold());
    let downloads = check_download_dir(settings);
    downloads.print();
    checks.push(downloads);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Lectern.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Lectern is ready to use.");
    }

    Ok(())
}

fn check_config_file(path: Option<&PathBuf>) -> CheckResult {
    let config_path = path.cloned().unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: lectern config edit",
        )
    }
}

fn check_base_url(settings: &Settings) -> CheckResult {
    match url::Url::parse(&settings.api.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if url.path().contains("/api/v1") {
                CheckResult::ok("Base URL", url.as_str())
            } else {
                CheckResult::warning(
                    "Base URL",
                    url.as_str(),
                    "Canvas API roots usually end in /api/v1",
                )
            }
        }
        Ok(url) => CheckResult::error(
            "Base URL",
            &format!("unsupported scheme '{}'", url.scheme()),
            "Use an https:// URL",
        ),
        Err(e) => CheckResult::error(
            "Base URL",
            &format!("invalid ({})", e),
            "Set api.base_url, e.g. https://school.instructure.com/api/v1",
        ),
    }
}

fn check_token(settings: &Settings) -> CheckResult {
    let hint = format!("Set with: export {}='...'", ENV_API_TOKEN);
    match settings.require_token() {
        Ok(token) => CheckResult::ok("API token", &format!("configured ({})", mask(token))),
        Err(_) => CheckResult::error("API token", "not set", &hint),
    }
}

async fn check_connectivity(settings: &Settings) -> CheckResult {
    let client = match LmsClient::from_settings(settings) {
        Ok(client) => client,
        Err(e) => return CheckResult::error("Connectivity", &e.to_string(), "Check api settings"),
    };

    match client.get("/users/self", &Query::new()).await {
        Ok(user) => {
            let name = user
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or("unknown user");
            let budget = match client.budget().remaining().await {
                Some(remaining) => format!(", rate-limit budget {:.0}", remaining),
                None => String::new(),
            };
            CheckResult::ok("Connectivity", &format!("authenticated as {}{}", name, budget))
        }
        Err(e) => {
            let hint = match &e {
                crate::error::LecternError::Unauthorized(_) => "The token was rejected; generate a new one",
                _ if e.is_transient() => "Canvas is unreachable or throttling; try again shortly",
                _ => "Check the base URL and token",
            };
            CheckResult::error("Connectivity", &e.to_string(), hint)
        }
    }
}

fn check_download_dir(settings: &Settings) -> CheckResult {
    let dir = settings.download_dir();
    if dir.is_dir() {
        CheckResult::ok("Download directory", &dir.display().to_string())
    } else {
        CheckResult::warning(
            "Download directory",
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first download",
        )
    }
}

/// First and last four characters of a token.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
