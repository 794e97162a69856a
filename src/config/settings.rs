//! Configuration settings for Lectern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides `api.base_url`.
pub const ENV_API_URL: &str = "CANVAS_API_URL";
/// Environment variable that overrides `api.token`.
pub const ENV_API_TOKEN: &str = "CANVAS_API_TOKEN";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub api: ApiSettings,
    pub transport: TransportSettings,
    pub downloads: DownloadSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Canvas API endpoint and credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Versioned API root, e.g. `https://school.instructure.com/api/v1`.
    pub base_url: String,
    /// Personal access token. Prefer `CANVAS_API_TOKEN` over storing it here.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://canvas.instructure.com/api/v1".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry, backoff and pagination behaviour of the transport client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Attempts made for transient failures (network errors, 5xx) before giving up.
    pub max_attempts: u32,
    /// Delay before the first transient retry, doubled on each further retry.
    pub initial_backoff_ms: u64,
    /// Upper bound on a single backoff delay.
    pub max_backoff_ms: u64,
    /// Page size requested from listing endpoints.
    pub per_page: u32,
    /// Wait applied when a rate-limit response carries no usable Retry-After.
    pub default_retry_after_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            per_page: 100,
            default_retry_after_secs: 1,
        }
    }
}

/// Local file download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Default destination folder for downloaded course files.
    pub destination: String,
    /// Timeout for a single file transfer in seconds.
    pub timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            destination: "~/Downloads".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied after the file is read.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_API_TOKEN).ok(),
        );
        Ok(settings)
    }

    /// Apply explicit overrides for the API endpoint and credential.
    pub fn apply_overrides(&mut self, base_url: Option<String>, token: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.api.token = Some(token);
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::LecternError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lectern")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded default download directory.
    pub fn download_dir(&self) -> PathBuf {
        Self::expand_path(&self.downloads.destination)
    }

    /// The configured token, or a configuration error naming how to supply one.
    pub fn require_token(&self) -> crate::error::Result<&str> {
        self.api
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                crate::error::LecternError::Config(format!(
                    "No Canvas API token configured. Set {} or api.token in {}",
                    ENV_API_TOKEN,
                    Self::default_config_path().display()
                ))
            })
    }

    /// A copy safe to print: the token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(token) = &copy.api.token {
            let tail: String = token
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            copy.api.token = Some(format!("****{}", tail));
        }
        copy
    }
}
