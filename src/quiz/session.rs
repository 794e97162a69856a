//! Quiz attempt state machine.

use super::{eligibility, AnswerValue, QuizDetails, QuizQuestion, QuizSubmission};
use crate::client::{LmsApi, Query};
use crate::error::{LecternError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of an attempt started through this process.
///
/// Ineligible quizzes never get this far; `start` fails before any remote
/// call. `Closed` is only ever entered because Canvas said so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptStatus {
    Started,
    Active,
    Closed,
}

impl AttemptStatus {
    fn can_become(self, next: AttemptStatus) -> bool {
        matches!(
            (self, next),
            (AttemptStatus::Started, AttemptStatus::Active)
                | (AttemptStatus::Started, AttemptStatus::Closed)
                | (AttemptStatus::Active, AttemptStatus::Closed)
        )
    }
}

/// Handle returned by `start`. The caller echoes the triple on every answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizAttempt {
    pub submission_id: u64,
    pub attempt_number: u32,
    pub validation_token: String,
    pub course_id: u64,
    pub quiz_id: u64,
    pub status: AttemptStatus,
    pub started_at: Option<String>,
    /// When Canvas will auto-submit, for timed quizzes.
    pub end_at: Option<String>,
}

impl QuizAttempt {
    fn transition(&mut self, next: AttemptStatus) {
        if self.status.can_become(next) {
            debug!(
                submission_id = self.submission_id,
                from = ?self.status,
                to = ?next,
                "Attempt status changed"
            );
            self.status = next;
        }
    }
}

/// Acknowledgement of an answer submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerAck {
    pub submission_id: u64,
    pub question_id: u64,
    /// Whether Canvas echoed the question back as updated.
    pub recorded: bool,
}

#[derive(Debug, Default)]
struct AttemptSlot {
    /// Set when the attempt was started by this process.
    issued: Option<QuizAttempt>,
    /// Remote message that closed the attempt.
    closed: Option<String>,
}

impl AttemptSlot {
    fn close(&mut self, reason: &str) {
        if let Some(attempt) = self.issued.as_mut() {
            attempt.transition(AttemptStatus::Closed);
        }
        self.closed = Some(reason.to_string());
    }
}

/// Starts attempts and forwards questions and answers for them.
///
/// Calls for one submission are serialized; different submissions proceed
/// independently.
pub struct QuizSessionManager {
    api: Arc<dyn LmsApi>,
    attempts: std::sync::Mutex<HashMap<u64, Arc<Mutex<AttemptSlot>>>>,
}

impl QuizSessionManager {
    pub fn new(api: Arc<dyn LmsApi>) -> Self {
        Self {
            api,
            attempts: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Fetch quiz metadata.
    pub async fn details(&self, course_id: u64, quiz_id: u64) -> Result<QuizDetails> {
        let value = self
            .api
            .get(
                &format!("/courses/{}/quizzes/{}", course_id, quiz_id),
                &Query::new(),
            )
            .await?;
        decode(value, "quiz")
    }

    /// The caller's attempts at a quiz, oldest first.
    pub async fn submissions(&self, course_id: u64, quiz_id: u64) -> Result<Vec<QuizSubmission>> {
        let value = self
            .api
            .get(
                &format!("/courses/{}/quizzes/{}/submissions", course_id, quiz_id),
                &Query::new().with("include[]", "submission"),
            )
            .await?;
        let mut submissions: Vec<QuizSubmission> = match value.get("quiz_submissions") {
            Some(list) => decode(list.clone(), "quiz submissions")?,
            None => Vec::new(),
        };
        // Tokens of finished attempts are useless and should not circulate.
        for submission in submissions.iter_mut().filter(|s| !s.in_progress()) {
            submission.validation_token = None;
        }
        Ok(submissions)
    }

    /// Start a new attempt at an eligible quiz.
    ///
    /// `quiz` is metadata the caller already fetched; eligibility is decided
    /// from it without a network call.
    #[instrument(skip(self, quiz), fields(quiz_id = quiz.id))]
    pub async fn start(&self, course_id: u64, quiz: &QuizDetails) -> Result<QuizAttempt> {
        eligibility(quiz).ensure(quiz.display_title())?;

        let response = self
            .api
            .post(
                &format!("/courses/{}/quizzes/{}/submissions", course_id, quiz.id),
                None,
            )
            .await?;

        let first = response
            .get("quiz_submissions")
            .and_then(Value::as_array)
            .and_then(|subs| subs.first())
            .cloned()
            .ok_or_else(|| {
                LecternError::InvalidResponse(
                    "quiz start returned no quiz_submissions".to_string(),
                )
            })?;
        let submission: QuizSubmission = decode(first, "quiz submission")?;
        let validation_token = submission
            .validation_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                LecternError::InvalidResponse(
                    "quiz start returned no validation token".to_string(),
                )
            })?;

        let mut attempt = QuizAttempt {
            submission_id: submission.id,
            attempt_number: submission.attempt.unwrap_or(1),
            validation_token,
            course_id,
            quiz_id: quiz.id,
            status: AttemptStatus::Started,
            started_at: submission.started_at,
            end_at: submission.end_at,
        };
        attempt.transition(AttemptStatus::Active);

        let slot = self.slot(attempt.submission_id);
        let mut slot = slot.lock().await;
        slot.issued = Some(attempt.clone());
        slot.closed = None;

        info!(
            submission_id = attempt.submission_id,
            attempt = attempt.attempt_number,
            "Quiz attempt started"
        );
        Ok(attempt)
    }

    /// Questions of an open attempt, in Canvas order.
    #[instrument(skip(self))]
    pub async fn questions(&self, submission_id: u64) -> Result<Vec<QuizQuestion>> {
        let slot = self.slot(submission_id);
        let mut state = slot.lock().await;
        let result = self.fetch_questions(submission_id, &mut state).await;
        drop(state);
        self.release(submission_id, slot);
        result
    }

    async fn fetch_questions(
        &self,
        submission_id: u64,
        slot: &mut AttemptSlot,
    ) -> Result<Vec<QuizQuestion>> {
        if let Some(reason) = &slot.closed {
            return Err(LecternError::Closed(reason.clone()));
        }

        let response = self
            .api
            .get(
                &format!("/quiz_submissions/{}/questions", submission_id),
                &Query::new(),
            )
            .await
            .map_err(|e| closed_or(slot, e))?;

        match response.get("quiz_submission_questions") {
            Some(list) => decode(list.clone(), "quiz questions"),
            None => Err(LecternError::InvalidResponse(
                "questions response has no quiz_submission_questions".to_string(),
            )),
        }
    }

    /// Submit one answer.
    ///
    /// `attempt_number` and `validation_token` must equal what `start`
    /// returned for this submission; a mismatch fails without contacting
    /// Canvas. Submissions started elsewhere are forwarded as-is.
    #[instrument(skip(self, validation_token, value), fields(kind = value.kind()))]
    pub async fn answer(
        &self,
        submission_id: u64,
        attempt_number: u32,
        validation_token: &str,
        question_id: u64,
        value: &AnswerValue,
    ) -> Result<AnswerAck> {
        if validation_token.is_empty() {
            return Err(LecternError::Precondition(
                "validation token is empty".to_string(),
            ));
        }

        let slot = self.slot(submission_id);
        let mut state = slot.lock().await;
        let result = self
            .send_answer(
                &mut state,
                submission_id,
                attempt_number,
                validation_token,
                question_id,
                value,
            )
            .await;
        drop(state);
        self.release(submission_id, slot);
        result
    }

    async fn send_answer(
        &self,
        slot: &mut AttemptSlot,
        submission_id: u64,
        attempt_number: u32,
        validation_token: &str,
        question_id: u64,
        value: &AnswerValue,
    ) -> Result<AnswerAck> {
        if let Some(reason) = &slot.closed {
            return Err(LecternError::Closed(reason.clone()));
        }
        if let Some(issued) = &slot.issued {
            if issued.attempt_number != attempt_number {
                return Err(LecternError::Precondition(format!(
                    "attempt number {} does not match attempt {} returned when submission {} was started",
                    attempt_number, issued.attempt_number, submission_id
                )));
            }
            if issued.validation_token != validation_token {
                return Err(LecternError::Precondition(format!(
                    "validation token does not match the one returned when submission {} was started",
                    submission_id
                )));
            }
        } else {
            debug!(submission_id, "Submission not started here; forwarding unchecked");
        }

        let payload = json!({
            "attempt": attempt_number,
            "validation_token": validation_token,
            "quiz_questions": [{"id": question_id, "answer": value}],
        });
        let response = self
            .api
            .post(
                &format!("/quiz_submissions/{}/questions", submission_id),
                Some(&payload),
            )
            .await
            .map_err(|e| closed_or(slot, e))?;

        let recorded = response
            .get("quiz_submission_questions")
            .and_then(Value::as_array)
            .map(|questions| {
                questions
                    .iter()
                    .any(|q| q.get("id").and_then(Value::as_u64) == Some(question_id))
            })
            .unwrap_or(false);

        Ok(AnswerAck {
            submission_id,
            question_id,
            recorded,
        })
    }

    /// The handle issued by `start` for a submission, if this process started it.
    pub async fn attempt(&self, submission_id: u64) -> Option<QuizAttempt> {
        let slot = self.existing_slot(submission_id)?;
        let slot = slot.lock().await;
        slot.issued.clone()
    }

    fn slot(&self, submission_id: u64) -> Arc<Mutex<AttemptSlot>> {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(attempts.entry(submission_id).or_default())
    }

    /// Forget a slot that holds no attempt state once nobody else is using it.
    fn release(&self, submission_id: u64, slot: Arc<Mutex<AttemptSlot>>) {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map and `slot` hold it; no new holder can appear while the map is locked.
        let sole_holder = Arc::strong_count(&slot) == 2
            && attempts
                .get(&submission_id)
                .is_some_and(|held| Arc::ptr_eq(held, &slot));
        if !sole_holder {
            return;
        }
        let idle = slot
            .try_lock()
            .map(|state| state.issued.is_none() && state.closed.is_none())
            .unwrap_or(false);
        if idle {
            attempts.remove(&submission_id);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn existing_slot(&self, submission_id: u64) -> Option<Arc<Mutex<AttemptSlot>>> {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&submission_id)
            .cloned()
    }
}

const CLOSED_MARKERS: &[&str] = &[
    "not accepting",
    "not in progress",
    "no longer",
    "already complete",
    "has been completed",
    "has ended",
    "expired",
];

/// Canvas reports a finished attempt as a 403/400-class rejection with a
/// message, or as a 409 conflict.
fn closure_message(err: &LecternError) -> Option<&str> {
    let message = match err {
        LecternError::Rejected { status: 409, message } => return Some(message.as_str()),
        LecternError::Forbidden(message) => message,
        LecternError::Rejected { message, .. } => message,
        _ => return None,
    };
    let lower = message.to_lowercase();
    CLOSED_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
        .then_some(message.as_str())
}

fn closed_or(slot: &mut AttemptSlot, err: LecternError) -> LecternError {
    match closure_message(&err) {
        Some(message) => {
            warn!(message, "Canvas reports the attempt closed");
            slot.close(message);
            LecternError::Closed(message.to_string())
        }
        None => err,
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| LecternError::InvalidResponse(format!("malformed {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockApi;
    use crate::client::Method;
    use crate::resolver::CourseResolver;
    use std::time::Duration;

    fn quiz(time_limit: Option<u32>, allowed_attempts: i64) -> QuizDetails {
        serde_json::from_value(json!({
            "id": 55,
            "title": "Borrow checker basics",
            "time_limit": time_limit,
            "allowed_attempts": allowed_attempts,
        }))
        .unwrap()
    }

    fn started_api() -> MockApi {
        MockApi::new()
            .on_list(
                "/courses",
                vec![json!({"id": 101, "course_code": "CS_101"})],
            )
            .on(
                Method::POST,
                "/courses/101/quizzes/55/submissions",
                json!({"quiz_submissions": [{
                    "id": 9001,
                    "attempt": 1,
                    "validation_token": "tok-a",
                    "workflow_state": "untaken",
                    "started_at": "2026-10-16T09:00:00Z"
                }]}),
            )
            .on(
                Method::POST,
                "/quiz_submissions/9001/questions",
                json!({"quiz_submission_questions": [{"id": 1, "answer": 1234}]}),
            )
    }

    #[tokio::test]
    async fn test_ineligible_quiz_never_calls_canvas() {
        let api = Arc::new(MockApi::new());
        let manager = QuizSessionManager::new(api.clone());

        let err = manager.start(101, &quiz(Some(20), 2)).await.unwrap_err();
        assert!(matches!(err, LecternError::Ineligible(_)), "got {:?}", err);
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_start_answer_scenario() {
        let api = Arc::new(started_api());
        let resolver = CourseResolver::new(api.clone());
        let manager = QuizSessionManager::new(api.clone());

        let course_id = resolver.resolve("CS_101").await.unwrap();
        assert_eq!(course_id, 101);

        let attempt = manager.start(course_id, &quiz(None, 3)).await.unwrap();
        assert_eq!(attempt.submission_id, 9001);
        assert_eq!(attempt.attempt_number, 1);
        assert_eq!(attempt.validation_token, "tok-a");
        assert_eq!(attempt.status, AttemptStatus::Active);

        let ack = manager
            .answer(9001, 1, "tok-a", 1, &AnswerValue::Choice(1234))
            .await
            .unwrap();
        assert!(ack.recorded);

        let sent = api.calls().last().unwrap().body.clone().unwrap();
        assert_eq!(
            sent,
            json!({
                "attempt": 1,
                "validation_token": "tok-a",
                "quiz_questions": [{"id": 1, "answer": 1234}]
            })
        );

        let before = api.call_count();
        let err = manager
            .answer(9001, 2, "tok-a", 1, &AnswerValue::Choice(1234))
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Precondition(_)), "got {:?}", err);
        assert_eq!(api.call_count(), before);
    }

    #[tokio::test]
    async fn test_token_mismatch_fails_locally() {
        let api = Arc::new(started_api());
        let manager = QuizSessionManager::new(api.clone());
        manager.start(101, &quiz(Some(30), -1)).await.unwrap();

        let before = api.call_count();
        let err = manager
            .answer(9001, 1, "tok-b", 1, &AnswerValue::Choice(1234))
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Precondition(_)));
        assert_eq!(api.call_count(), before);
    }

    #[tokio::test]
    async fn test_unknown_submission_is_forwarded() {
        let api = Arc::new(started_api());
        let manager = QuizSessionManager::new(api.clone());

        let ack = manager
            .answer(9001, 4, "tok-elsewhere", 1, &AnswerValue::Text("x".into()))
            .await
            .unwrap();
        assert!(ack.recorded);
        assert!(manager.attempt(9001).await.is_none());
    }

    #[tokio::test]
    async fn test_untracked_submissions_leave_no_slot() {
        let api = Arc::new(started_api().on_error(
            Method::GET,
            "/quiz_submissions/500/questions",
            || LecternError::Forbidden("this quiz has ended".to_string()),
        ));
        let manager = QuizSessionManager::new(api.clone());

        for submission_id in [9001, 9002, 9003] {
            let _ = manager
                .answer(submission_id, 1, "tok-x", 1, &AnswerValue::Choice(1))
                .await;
            let _ = manager.questions(submission_id).await;
        }
        assert_eq!(manager.tracked(), 0);

        // A remote closure is state worth keeping, even for foreign submissions.
        assert!(matches!(
            manager.questions(500).await,
            Err(LecternError::Closed(_))
        ));
        assert_eq!(manager.tracked(), 1);

        manager.start(101, &quiz(None, 3)).await.unwrap();
        manager
            .answer(9001, 1, "tok-a", 1, &AnswerValue::Choice(1))
            .await
            .unwrap();
        assert_eq!(manager.tracked(), 2);
    }

    #[tokio::test]
    async fn test_remote_closure_becomes_closed() {
        let api = Arc::new(started_api().on_error(
            Method::GET,
            "/quiz_submissions/9001/questions",
            || LecternError::Forbidden("quiz submission is not accepting answers".to_string()),
        ));
        let manager = QuizSessionManager::new(api.clone());
        manager.start(101, &quiz(None, 3)).await.unwrap();

        let err = manager.questions(9001).await.unwrap_err();
        assert!(matches!(err, LecternError::Closed(_)), "got {:?}", err);
        assert_eq!(
            manager.attempt(9001).await.unwrap().status,
            AttemptStatus::Closed
        );

        // Closed is terminal: later calls fail without a round-trip.
        let before = api.call_count();
        let err = manager
            .answer(9001, 1, "tok-a", 1, &AnswerValue::Choice(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Closed(_)));
        assert_eq!(api.call_count(), before);
    }

    #[tokio::test]
    async fn test_shape_rejection_passes_through() {
        let api = Arc::new(started_api().on_error(
            Method::POST,
            "/quiz_submissions/9001/questions",
            || LecternError::Rejected {
                status: 400,
                message: "invalid answer format".to_string(),
            },
        ));
        let manager = QuizSessionManager::new(api.clone());
        manager.start(101, &quiz(None, 3)).await.unwrap();

        let err = manager
            .answer(9001, 1, "tok-a", 1, &AnswerValue::Text("maybe".into()))
            .await
            .unwrap_err();
        match err {
            LecternError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid answer format");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_questions_are_decoded_in_order() {
        let api = Arc::new(MockApi::new().on(
            Method::GET,
            "/quiz_submissions/77/questions",
            json!({"quiz_submission_questions": [
                {"id": 3, "question_type": "essay_question"},
                {"id": 1, "question_type": "multiple_choice_question",
                 "answers": [{"id": 1234, "text": "Move"}]}
            ]}),
        ));
        let manager = QuizSessionManager::new(api);

        let questions = manager.questions(77).await.unwrap();
        let ids: Vec<u64> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(questions[1].answers[0].text.as_deref(), Some("Move"));
    }

    #[tokio::test]
    async fn test_submissions_hide_finished_tokens() {
        let api = Arc::new(MockApi::new().on(
            Method::GET,
            "/courses/101/quizzes/55/submissions",
            json!({"quiz_submissions": [
                {"id": 1, "attempt": 1, "validation_token": "old", "workflow_state": "complete"},
                {"id": 2, "attempt": 2, "validation_token": "live", "workflow_state": "untaken"}
            ]}),
        ));
        let manager = QuizSessionManager::new(api);

        let subs = manager.submissions(101, 55).await.unwrap();
        assert_eq!(subs[0].validation_token, None);
        assert_eq!(subs[1].validation_token.as_deref(), Some("live"));
    }

    #[tokio::test]
    async fn test_same_submission_answers_are_serialized() {
        let api = Arc::new(started_api().with_latency(Duration::from_millis(20)));
        let manager = Arc::new(QuizSessionManager::new(api.clone()));
        manager.start(101, &quiz(None, 3)).await.unwrap();

        let started = tokio::time::Instant::now();
        let tasks = (0..3).map(|i| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .answer(9001, 1, "tok-a", 1, &AnswerValue::Choice(i))
                    .await
            })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
