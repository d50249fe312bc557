//! Transport-neutral entry points: start, submit, status, summary, finish.
//!
//! Every request type and response type is serde-serializable so an HTTP or
//! RPC layer can mount the service directly.
//!
//! A submission is all-or-nothing: the session is locked for the whole
//! evaluate-then-commit cycle and is only mutated after the oracle returned
//! a valid verdict. A failed, timed-out, or dropped submission leaves the
//! session exactly as it was.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::engine::{AdaptiveEngine, Selection};
use crate::error::{OracleError, QuizError, QuizResult};
use crate::model::{DifficultyTier, QuestionView, SessionId};
use crate::session::{SessionStatus, SessionSummary};
use crate::store::SessionStore;
use crate::traits::{ScoringOracle, Submission};

/// Default upper bound on a single oracle call.
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

/// Response to starting a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: SessionId,
    pub question: QuestionView,
    pub difficulty: DifficultyTier,
}

/// An answer to the session's pending question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub session_id: SessionId,
    pub question_id: String,
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// What comes after a committed answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Next { question: QuestionView },
    Completed { summary: SessionSummary },
}

/// Response to a committed answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub misconception: Option<String>,
    #[serde(default)]
    pub explanation_score: Option<f64>,
    pub updated_difficulty: DifficultyTier,
    pub outcome: Outcome,
}

impl SubmitResponse {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, Outcome::Completed { .. })
    }
}

/// The quiz service.
pub struct QuizService {
    engine: Arc<AdaptiveEngine>,
    store: Arc<SessionStore>,
    oracle: Arc<dyn ScoringOracle>,
    oracle_timeout: Duration,
}

impl QuizService {
    pub fn new(
        engine: Arc<AdaptiveEngine>,
        store: Arc<SessionStore>,
        oracle: Arc<dyn ScoringOracle>,
    ) -> Self {
        Self {
            engine,
            store,
            oracle,
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        }
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &AdaptiveEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Create a session and present its first question.
    pub async fn start(&self) -> QuizResult<StartResponse> {
        let mut session = self.engine.new_session();
        let question = self.engine.begin(&mut session)?;
        let response = StartResponse {
            session_id: session.id(),
            question: QuestionView::new(question, 1, session.total()),
            difficulty: session.difficulty(),
        };
        self.store.create(session)?;

        tracing::info!(session = %response.session_id, oracle = self.oracle.name(), "new session started");
        Ok(response)
    }

    /// Evaluate and commit an answer for the pending question.
    pub async fn submit(&self, request: SubmitRequest) -> QuizResult<SubmitResponse> {
        let id = request.session_id;
        let handle = self.store.get(id)?;

        let Ok(mut session) = handle.try_lock() else {
            tracing::warn!(session = %id, question = %request.question_id, "rejected submission for busy session");
            return Err(QuizError::invalid_state("session is busy with another request"));
        };
        // Any submission counts as activity, even one that fails below.
        session.touch(Utc::now());

        if session.is_complete() {
            tracing::warn!(session = %id, "attempt to submit answer to finished session");
            return Err(QuizError::invalid_state("assessment already completed"));
        }
        match session.pending() {
            Some(pending) if pending == request.question_id => {}
            Some(pending) => {
                return Err(QuizError::invalid_state(format!(
                    "question {} is not the current question ({pending})",
                    request.question_id
                )))
            }
            None => return Err(QuizError::invalid_state("no active question")),
        }

        let question = self.engine.bank().by_id(&request.question_id).ok_or_else(|| {
            QuizError::invalid_state(format!("unknown question {}", request.question_id))
        })?;
        let submission = Submission {
            answer: request.answer,
            explanation: request.explanation,
        };

        let scoring = self.oracle.evaluate(question, &submission);
        let evaluation = match tokio::time::timeout(self.oracle_timeout, scoring).await {
            Ok(Ok(evaluation)) => evaluation,
            Ok(Err(e)) => {
                tracing::warn!(session = %id, question = %question.id, "evaluation failed: {e}");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(
                    session = %id,
                    question = %question.id,
                    timeout_secs = self.oracle_timeout.as_secs_f64(),
                    "evaluation timed out"
                );
                return Err(OracleError::unavailable(format!(
                    "evaluation timed out after {:.1}s",
                    self.oracle_timeout.as_secs_f64()
                ))
                .into());
            }
        };
        evaluation.validate()?;

        let selection =
            self.engine
                .record_answer_and_select_next(&mut session, question, &submission, &evaluation)?;
        let updated_difficulty = session.difficulty();

        tracing::info!(
            session = %id,
            question = session.served_count(),
            score = evaluation.score,
            difficulty = %updated_difficulty,
            "answer scored"
        );

        let outcome = match selection {
            Selection::Next(next) => Outcome::Next {
                question: QuestionView::new(next, session.served_count() + 1, session.total()),
            },
            Selection::Exhausted => {
                let summary = session.compute_summary();
                tracing::info!(
                    session = %id,
                    average_score = summary.average_score,
                    "session completed"
                );
                Outcome::Completed { summary }
            }
        };

        Ok(SubmitResponse {
            score: evaluation.score,
            feedback: evaluation.feedback,
            misconception: evaluation.misconception,
            explanation_score: evaluation.explanation_score,
            updated_difficulty,
            outcome,
        })
    }

    /// Progress snapshot. Counts as activity.
    pub async fn status(&self, id: SessionId) -> QuizResult<SessionStatus> {
        let handle = self.store.get(id)?;
        let mut session = handle.lock().await;
        session.touch(Utc::now());
        Ok(session.status())
    }

    /// Summary so far. Counts as activity.
    pub async fn summary(&self, id: SessionId) -> QuizResult<SessionSummary> {
        let handle = self.store.get(id)?;
        let mut session = handle.lock().await;
        session.touch(Utc::now());
        Ok(session.compute_summary())
    }

    /// Acknowledge completion, or end a quiz early. Removes the session and
    /// returns its final summary.
    pub async fn finish(&self, id: SessionId) -> QuizResult<SessionSummary> {
        let handle = self.store.get(id)?;
        let mut session = handle.lock().await;
        self.store.remove(id);
        let early = !session.is_complete();
        session.complete();
        tracing::info!(session = %id, early, "session ended");
        Ok(session.compute_summary())
    }

    /// Number of sessions currently stored.
    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }
}
