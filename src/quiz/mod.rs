//! Quiz metadata and attempt handling.
//!
//! Read-side types decode Canvas quiz payloads; [`QuizSessionManager`] owns
//! the attempt state machine (eligibility, start, questions, answers).
//! Finishing an attempt is deliberately absent: Canvas auto-submits on
//! expiry, or the user finishes in the Canvas UI.

mod answer;
mod eligibility;
mod session;

pub use answer::{AnswerValue, BlankValue, MatchPair};
pub use eligibility::{eligibility, AttemptLimit, Eligibility};
pub use session::{AnswerAck, AttemptStatus, QuizAttempt, QuizSessionManager};

use serde::{Deserialize, Serialize};

/// Quiz metadata from `GET /courses/:course_id/quizzes/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDetails {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Minutes; `None` means untimed.
    #[serde(default)]
    pub time_limit: Option<u32>,
    /// `-1` means unlimited. Canvas omits it for single-attempt quizzes.
    #[serde(default)]
    pub allowed_attempts: Option<i64>,
    #[serde(default)]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub unlock_at: Option<String>,
    #[serde(default)]
    pub lock_at: Option<String>,
    #[serde(default)]
    pub scoring_policy: Option<String>,
    #[serde(default)]
    pub shuffle_answers: bool,
    #[serde(default)]
    pub one_question_at_a_time: bool,
    #[serde(default)]
    pub cant_go_back: bool,
    #[serde(default)]
    pub access_code: Option<String>,
    #[serde(default)]
    pub ip_filter: Option<String>,
}

impl QuizDetails {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    pub fn attempt_limit(&self) -> AttemptLimit {
        AttemptLimit::from_allowed_attempts(self.allowed_attempts)
    }
}

/// One attempt from `GET .../quizzes/:id/submissions` or a start response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub id: u64,
    #[serde(default)]
    pub attempt: Option<u32>,
    #[serde(default)]
    pub validation_token: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub kept_score: Option<f64>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub time_spent: Option<u64>,
}

impl QuizSubmission {
    /// Whether the attempt is still open, so its validation token is still useful.
    pub fn in_progress(&self) -> bool {
        matches!(
            self.workflow_state.as_deref(),
            Some("untaken" | "pending_review" | "settings_only")
        )
    }
}

/// A question of an active attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: u64,
    #[serde(default)]
    pub question_name: Option<String>,
    #[serde(default = "unknown_type")]
    pub question_type: String,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub answers: Vec<QuestionOption>,
    #[serde(default)]
    pub matches: Vec<QuestionMatch>,
}

fn unknown_type() -> String {
    "unknown".to_string()
}

/// A selectable answer, matching left side, or blank option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub blank_id: Option<String>,
}

/// Right-hand side of a matching question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMatch {
    #[serde(default)]
    pub match_id: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
}
