//! Offline check of whether an attempt may be started from here.

use super::QuizDetails;
use crate::error::{LecternError, Result};
use serde::Serialize;

/// How many attempts a quiz allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptLimit {
    Limited(u32),
    Unlimited,
}

impl AttemptLimit {
    /// Interpret Canvas's `allowed_attempts` (`-1` unlimited, missing means one).
    pub fn from_allowed_attempts(allowed: Option<i64>) -> Self {
        match allowed {
            Some(n) if n < 0 => AttemptLimit::Unlimited,
            Some(n) => AttemptLimit::Limited(u32::try_from(n).unwrap_or(u32::MAX)),
            None => AttemptLimit::Limited(1),
        }
    }
}

impl std::fmt::Display for AttemptLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptLimit::Limited(n) => write!(f, "{}", n),
            AttemptLimit::Unlimited => write!(f, "Unlimited"),
        }
    }
}

/// Eligibility class of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Eligibility {
    Eligible,
    /// Timed and attempt-limited: must be taken in the Canvas UI.
    Ineligible {
        time_limit_minutes: u32,
        allowed_attempts: u32,
    },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    /// Turn an ineligible class into the `Ineligible` failure for `title`.
    pub fn ensure(self, title: &str) -> Result<()> {
        match self {
            Eligibility::Eligible => Ok(()),
            Eligibility::Ineligible {
                time_limit_minutes,
                allowed_attempts,
            } => Err(LecternError::Ineligible(format!(
                "'{}' has both a time limit ({} min) and limited attempts ({}). Take it directly in Canvas so the timer is handled properly.",
                title, time_limit_minutes, allowed_attempts
            ))),
        }
    }
}

/// Classify a quiz: startable unless it is both timed and attempt-limited.
pub fn eligibility(quiz: &QuizDetails) -> Eligibility {
    match (quiz.time_limit, quiz.attempt_limit()) {
        (Some(minutes), AttemptLimit::Limited(attempts)) => Eligibility::Ineligible {
            time_limit_minutes: minutes,
            allowed_attempts: attempts,
        },
        _ => Eligibility::Eligible,
    }
}
