//! Error types for Lectern.

use std::time::Duration;
use thiserror::Error;

/// Library-level error type for Lectern operations.
///
/// The first group of variants is the failure taxonomy surfaced to tool
/// callers; every one of them carries the remote message when the LMS
/// provided one.
#[derive(Error, Debug)]
pub enum LecternError {
    #[error("Unauthorized: {0}. Check that the Canvas API token is present and not expired.")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by Canvas; retry after {:.1}s", .retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },

    #[error("Canvas unavailable: {0}")]
    Unavailable(String),

    #[error("Quiz cannot be started from here: {0}")]
    Ineligible(String),

    #[error("Rejected by Canvas (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Quiz attempt is closed: {0}")]
    Closed(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected response from Canvas: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl LecternError {
    /// Whether a caller may reasonably retry the same operation later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LecternError::RateLimited { .. } | LecternError::Unavailable(_)
        )
    }

    /// An owned copy of this failure for handing to another waiter.
    ///
    /// Taxonomy variants are copied as-is; wrapped library errors keep their
    /// message under the closest taxonomy variant.
    pub fn replay(&self) -> Self {
        match self {
            LecternError::Unauthorized(m) => LecternError::Unauthorized(m.clone()),
            LecternError::Forbidden(m) => LecternError::Forbidden(m.clone()),
            LecternError::NotFound(m) => LecternError::NotFound(m.clone()),
            LecternError::RateLimited { retry_after } => LecternError::RateLimited {
                retry_after: *retry_after,
            },
            LecternError::Unavailable(m) => LecternError::Unavailable(m.clone()),
            LecternError::Ineligible(m) => LecternError::Ineligible(m.clone()),
            LecternError::Rejected { status, message } => LecternError::Rejected {
                status: *status,
                message: message.clone(),
            },
            LecternError::Closed(m) => LecternError::Closed(m.clone()),
            LecternError::Precondition(m) => LecternError::Precondition(m.clone()),
            LecternError::InvalidInput(m) => LecternError::InvalidInput(m.clone()),
            LecternError::InvalidResponse(m) => LecternError::InvalidResponse(m.clone()),
            LecternError::Config(m) => LecternError::Config(m.clone()),
            LecternError::Io(e) => LecternError::Unavailable(e.to_string()),
            LecternError::Http(e) => LecternError::Unavailable(e.to_string()),
            LecternError::Json(e) => LecternError::InvalidResponse(e.to_string()),
            LecternError::TomlParse(e) => LecternError::Config(e.to_string()),
            LecternError::Url(e) => LecternError::Config(e.to_string()),
        }
    }
}

/// Result type alias for Lectern operations.
pub type Result<T> = std::result::Result<T, LecternError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_keeps_taxonomy() {
        let err = LecternError::Rejected {
            status: 422,
            message: "bad".to_string(),
        };
        assert!(matches!(
            err.replay(),
            LecternError::Rejected { status: 422, ref message } if message == "bad"
        ));

        let err = LecternError::RateLimited {
            retry_after: Duration::from_secs(2),
        };
        assert!(err.replay().is_transient());
    }

    #[test]
    fn test_replay_of_wrapped_io_is_unavailable() {
        let err = LecternError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        match err.replay() {
            LecternError::Unavailable(message) => assert!(message.contains("reset by peer")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}
