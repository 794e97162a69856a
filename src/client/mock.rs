//! In-memory `LmsApi` used by resolver, quiz and tool tests.

use super::{LmsApi, Method, Query};
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ErrorFactory = Arc<dyn Fn() -> LecternError + Send + Sync>;

#[derive(Clone)]
enum Reply {
    Json(Value),
    Records(Vec<Value>),
    Bytes(Vec<u8>),
    Fail(ErrorFactory),
}

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Query,
    pub body: Option<Value>,
}

/// Scripted Canvas double. Unscripted routes answer `NotFound`.
#[derive(Default)]
pub struct MockApi {
    replies: Mutex<HashMap<(Method, String), Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Option<Duration>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, widening race windows in concurrency tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn on(self, method: Method, path: &str, value: Value) -> Self {
        self.script(method, path, Reply::Json(value))
    }

    pub fn on_list(self, path: &str, records: Vec<Value>) -> Self {
        self.script(Method::GET, path, Reply::Records(records))
    }

    pub fn on_file(self, url: &str, bytes: &[u8]) -> Self {
        self.script(Method::GET, url, Reply::Bytes(bytes.to_vec()))
    }

    pub fn on_error(
        self,
        method: Method,
        path: &str,
        error: impl Fn() -> LecternError + Send + Sync + 'static,
    ) -> Self {
        self.script(method, path, Reply::Fail(Arc::new(error)))
    }

    fn script(self, method: Method, path: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert((method, path.to_string()), reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of calls made to `path` with any method.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path == path)
            .count()
    }

    async fn reply(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Option<Reply> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.clone(),
            path: path.to_string(),
            query: query.clone(),
            body: body.cloned(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.replies
            .lock()
            .unwrap()
            .get(&(method, path.to_string()))
            .cloned()
    }
}

fn not_scripted(path: &str) -> LecternError {
    LecternError::NotFound(format!("no scripted reply ({})", path))
}

#[async_trait]
impl LmsApi for MockApi {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value> {
        match self.reply(method, path, query, body).await {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Records(records)) => Ok(Value::Array(records)),
            Some(Reply::Fail(error)) => Err(error()),
            Some(Reply::Bytes(_)) | None => Err(not_scripted(path)),
        }
    }

    async fn list(&self, path: &str, query: &Query) -> Result<Vec<Value>> {
        match self.reply(Method::GET, path, query, None).await {
            Some(Reply::Records(records)) => Ok(records),
            Some(Reply::Fail(error)) => Err(error()),
            Some(Reply::Json(_)) => Err(LecternError::InvalidResponse(format!(
                "expected a JSON array from {}",
                path
            ))),
            Some(Reply::Bytes(_)) | None => Err(not_scripted(path)),
        }
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        match self.reply(Method::GET, url, &Query::new(), None).await {
            Some(Reply::Bytes(bytes)) => Ok(bytes),
            Some(Reply::Fail(error)) => Err(error()),
            _ => Err(not_scripted(url)),
        }
    }
}
