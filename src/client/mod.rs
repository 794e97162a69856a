//! Canvas REST transport.
//!
//! Every other component talks to Canvas through the [`LmsApi`] trait.
//! [`LmsClient`] is the production implementation: it attaches the bearer
//! credential, follows pagination cursors, honours rate-limit backoff and
//! classifies failures.

mod http;
#[cfg(test)]
pub(crate) mod mock;
mod pagination;
mod rate_limit;

pub use http::{LmsClient, RetryPolicy};
pub use pagination::next_link;
pub use rate_limit::{parse_retry_after, RateLimitBudget, REMAINING_HEADER};
pub use reqwest::Method;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Ordered query parameters. Keys may repeat (`include[]=a&include[]=b`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a parameter only when a value is present.
    pub fn with_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Authenticated access to the Canvas REST API.
#[async_trait]
pub trait LmsApi: Send + Sync {
    /// Issue a single request and return the parsed JSON body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value>;

    /// Fetch every page of a listing endpoint, concatenated in page order.
    async fn list(&self, path: &str, query: &Query) -> Result<Vec<Value>>;

    /// Download raw bytes from a pre-signed file URL.
    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>>;

    async fn get(&self, path: &str, query: &Query) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::POST, path, &Query::new(), body).await
    }
}
