//! `reqwest`-backed Canvas client with retry, backoff and pagination.

use super::pagination::next_link;
use super::rate_limit::{parse_retry_after, RateLimitBudget};
use super::{LmsApi, Method, Query};
use crate::config::{Settings, TransportSettings};
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

const USER_AGENT: &str = concat!("lectern/", env!("CARGO_PKG_VERSION"));

/// Default timeout for file transfers (2 minutes).
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Canvas prepends this to JSON bodies served to non-API sessions.
const JSON_GUARD: &str = "while(1);";

/// Bounded retry behaviour for transient failures and rate limits.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts for transient failures, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Wait used when a rate-limit response has no parseable Retry-After.
    pub default_retry_after: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &TransportSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            default_retry_after: Duration::from_secs(settings.default_retry_after_secs),
        }
    }

    /// Delay after the `failures`-th consecutive transient failure.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&TransportSettings::default())
    }
}

/// One decoded response page.
struct Page {
    body: Value,
    next: Option<String>,
}

/// Authenticated Canvas API client.
pub struct LmsClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    budget: Arc<RateLimitBudget>,
    policy: RetryPolicy,
    per_page: u32,
    download_timeout: Duration,
}

impl LmsClient {
    /// Create a client for `base_url` (the versioned API root).
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        transport: &TransportSettings,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.trim().trim_end_matches('/'))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(LecternError::Config(format!(
                "Canvas base URL must be http(s), got {}",
                base_url.scheme()
            )));
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(LecternError::Config("Canvas API token is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: token.to_string(),
            budget: Arc::new(RateLimitBudget::new()),
            policy: RetryPolicy::from_settings(transport),
            per_page: transport.per_page.max(1),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        })
    }

    /// Create a client from loaded settings. Fails if no token is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let token = settings.require_token()?;
        let client = Self::new(
            &settings.api.base_url,
            token,
            settings.api.timeout(),
            &settings.transport,
        )?;
        Ok(client.with_download_timeout(Duration::from_secs(settings.downloads.timeout_secs)))
    }

    /// Share an existing budget, e.g. between clients in one process.
    pub fn with_budget(mut self, budget: Arc<RateLimitBudget>) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn budget(&self) -> &Arc<RateLimitBudget> {
        &self.budget
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    /// Resolve a continuation link, refusing anything off the API origin.
    fn continuation(&self, link: &str) -> Result<Url> {
        let url = self.base_url.join(link)?;
        if url.origin() != self.base_url.origin() {
            return Err(LecternError::InvalidResponse(format!(
                "pagination link points outside {}: {}",
                self.base_url.origin().ascii_serialization(),
                url.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }

    /// Send one logical request, retrying rate limits once and transient
    /// failures up to the policy ceiling.
    #[instrument(skip_all, fields(method = %method, path = %url.path()))]
    async fn send(
        &self,
        method: &Method,
        url: &Url,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Page> {
        let mut failures = 0u32;
        let mut rate_limited = false;

        loop {
            let waited = self.budget.wait_ready().await;
            if !waited.is_zero() {
                debug!(waited_ms = waited.as_millis() as u64, "Resumed after rate limit wait");
            }

            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.token);
            if !query.is_empty() {
                builder = builder.query(query.pairs());
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let failure = match builder.send().await {
                Err(e) => format!("request failed: {}", e),
                Ok(response) => {
                    self.budget.observe(response.headers()).await;
                    let status = response.status();
                    let headers = response.headers().clone();

                    match response.bytes().await {
                        Err(e) => format!("failed reading response body: {}", e),
                        Ok(bytes) if status.is_success() => {
                            return Ok(Page {
                                body: parse_body(&bytes)?,
                                next: next_link(&headers),
                            });
                        }
                        Ok(bytes) => {
                            let text = String::from_utf8_lossy(&bytes);

                            if is_rate_limited(status, &text) {
                                let wait = parse_retry_after(&headers)
                                    .unwrap_or(self.policy.default_retry_after);
                                self.budget.defer(wait).await;
                                if rate_limited {
                                    return Err(LecternError::RateLimited { retry_after: wait });
                                }
                                rate_limited = true;
                                warn!(
                                    retry_after_ms = wait.as_millis() as u64,
                                    "Rate limited by Canvas, retrying once"
                                );
                                continue;
                            }

                            if !status.is_server_error() {
                                return Err(classify(status, &text, url.path()));
                            }

                            format!(
                                "HTTP {}: {}",
                                status.as_u16(),
                                remote_message(&text).unwrap_or_else(|| reason(status))
                            )
                        }
                    }
                }
            };

            rate_limited = false;
            failures += 1;
            if failures >= self.policy.max_attempts {
                return Err(LecternError::Unavailable(format!(
                    "{} {} gave up after {} attempts: {}",
                    method,
                    url.path(),
                    failures,
                    failure
                )));
            }

            let delay = self.policy.backoff(failures);
            warn!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "Transient Canvas failure: {}",
                failure
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LmsApi for LmsClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.endpoint(path)?;
        let page = self.send(&method, &url, query, body).await?;
        Ok(page.body)
    }

    #[instrument(skip(self, query))]
    async fn list(&self, path: &str, query: &Query) -> Result<Vec<Value>> {
        let first_query = if query.contains("per_page") {
            query.clone()
        } else {
            query.clone().with("per_page", self.per_page)
        };
        // Continuation links already carry every parameter.
        let no_query = Query::new();

        let mut url = self.endpoint(path)?;
        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            let query = if pages == 0 { &first_query } else { &no_query };
            let page = self.send(&Method::GET, &url, query, None).await?;
            pages += 1;

            match page.body {
                Value::Array(items) => records.extend(items),
                Value::Null => {}
                other => {
                    return Err(LecternError::InvalidResponse(format!(
                        "expected a JSON array from {}, got {}",
                        path,
                        json_kind(&other)
                    )));
                }
            }

            let Some(link) = page.next else { break };
            let next = self.continuation(&link)?;
            if next == url {
                return Err(LecternError::InvalidResponse(format!(
                    "pagination link for {} points back at the current page",
                    path
                )));
            }
            url = next;
        }

        debug!(pages, records = records.len(), "Fetched listing");
        Ok(records)
    }

    #[instrument(skip_all)]
    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(url)?;
        let mut failures = 0u32;

        loop {
            // Pre-signed file URLs carry their own verifier; no bearer token.
            let request = self.http.get(url.clone()).timeout(self.download_timeout);

            let failure = match request.send().await {
                Err(e) => format!("download failed: {}", e),
                Ok(response) if response.status().is_success() => match response.bytes().await {
                    Ok(bytes) => return Ok(bytes.to_vec()),
                    Err(e) => format!("download interrupted: {}", e),
                },
                Ok(response) if response.status().is_server_error() => {
                    format!("HTTP {}", response.status().as_u16())
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(classify(status, &text, url.path()));
                }
            };

            failures += 1;
            if failures >= self.policy.max_attempts {
                return Err(LecternError::Unavailable(format!(
                    "file download gave up after {} attempts: {}",
                    failures, failure
                )));
            }
            let delay = self.policy.backoff(failures);
            warn!(attempt = failures, "Retrying file download: {}", failure);
            tokio::time::sleep(delay).await;
        }
    }
}

fn parse_body(bytes: &[u8]) -> Result<Value> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start();
    let text = text.strip_prefix(JSON_GUARD).unwrap_or(text).trim();
    if text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| LecternError::InvalidResponse(format!("body is not valid JSON: {}", e)))
}

/// Canvas signals throttling with 429, and also with a 403 whose body says so.
fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && body.to_ascii_lowercase().contains("rate limit exceeded"))
}

/// Map a non-success, non-retryable status to the failure taxonomy.
fn classify(status: StatusCode, body: &str, path: &str) -> LecternError {
    let message = remote_message(body).unwrap_or_else(|| reason(status));
    match status {
        StatusCode::UNAUTHORIZED => LecternError::Unauthorized(message),
        StatusCode::FORBIDDEN => LecternError::Forbidden(message),
        StatusCode::NOT_FOUND => LecternError::NotFound(format!("{} ({})", message, path)),
        s if s.is_client_error() => LecternError::Rejected {
            status: s.as_u16(),
            message,
        },
        s => LecternError::InvalidResponse(format!(
            "unexpected HTTP {} from {}: {}",
            s.as_u16(),
            path,
            message
        )),
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}

/// Extract the human-readable message from a Canvas error body.
pub(crate) fn remote_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        // HTML error pages carry nothing useful.
        if trimmed.starts_with('<') {
            return None;
        }
        return Some(trimmed.chars().take(200).collect());
    };

    let mut messages = Vec::new();
    match json.get("errors") {
        Some(Value::Array(items)) => {
            for item in items {
                if let Some(m) = item.get("message").and_then(Value::as_str).or(item.as_str()) {
                    messages.push(m.to_string());
                }
            }
        }
        Some(Value::Object(fields)) => {
            for (field, detail) in fields {
                let details: Vec<&Value> = match detail {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                for d in details {
                    if let Some(m) = d.get("message").and_then(Value::as_str).or(d.as_str()) {
                        messages.push(format!("{}: {}", field, m));
                    }
                }
            }
        }
        Some(Value::String(s)) => messages.push(s.clone()),
        _ => {}
    }

    if messages.is_empty() {
        for key in ["message", "error"] {
            if let Some(m) = json.get(key).and_then(Value::as_str) {
                messages.push(m.to_string());
                break;
            }
        }
    }

    (!messages.is_empty()).then(|| messages.join("; "))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
