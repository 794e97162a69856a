//! Process-wide rate limit budget shared by every transport caller.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Header carrying Canvas's estimate of the remaining request budget.
pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";

/// Longest wait honoured from a Retry-After header.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
struct BudgetState {
    remaining: Option<f64>,
    next_allowed: Option<Instant>,
}

/// Remaining-call estimate and next-allowed time.
///
/// Read before each request and written after each response. The
/// remaining estimate is informational; only the next-allowed time gates
/// requests.
#[derive(Debug, Default)]
pub struct RateLimitBudget {
    state: Mutex<BudgetState>,
}

impl RateLimitBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend until the next-allowed time has passed.
    ///
    /// Re-checks after every sleep because another caller may have pushed
    /// the deadline further out in the meantime. Returns the total time spent
    /// waiting.
    pub async fn wait_ready(&self) -> Duration {
        let started = Instant::now();
        loop {
            let deadline = self.state.lock().await.next_allowed;
            match deadline {
                Some(deadline) if deadline > Instant::now() => {
                    debug!(
                        wait_ms = (deadline - Instant::now()).as_millis() as u64,
                        "Waiting for rate limit window"
                    );
                    tokio::time::sleep_until(deadline).await;
                }
                _ => return started.elapsed(),
            }
        }
    }

    /// Forbid new requests for `wait` from now. Never shortens an existing deadline.
    pub async fn defer(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut state = self.state.lock().await;
        if state.next_allowed.map_or(true, |current| until > current) {
            state.next_allowed = Some(until);
        }
    }

    /// Record the rate limit headers of a response.
    pub async fn observe(&self, headers: &HeaderMap) {
        if let Some(remaining) = parse_remaining(headers) {
            self.state.lock().await.remaining = Some(remaining);
        }
    }

    /// Latest remaining-call estimate reported by Canvas.
    pub async fn remaining(&self) -> Option<f64> {
        self.state.lock().await.remaining
    }

    /// When the next request may be dispatched, if a wait is in force.
    pub async fn next_allowed(&self) -> Option<Instant> {
        self.state
            .lock()
            .await
            .next_allowed
            .filter(|deadline| *deadline > Instant::now())
    }
}

fn parse_remaining(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(REMAINING_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a Retry-After header given either as seconds or as an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    let wait = if let Ok(secs) = raw.parse::<f64>() {
        Duration::try_from_secs_f64(secs).ok()?
    } else {
        let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
        (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    };

    Some(wait.min(MAX_RETRY_AFTER))
}
