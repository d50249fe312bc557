//! One test-taker's run through a quiz.
//!
//! A session's state changes only through its own methods. "Served" counts
//! questions whose answers have been committed, so `served_count()` always
//! equals the history length; the question on screen but not yet answered
//! is tracked separately as `pending`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QuizError, QuizResult};
use crate::model::{AnswerRecord, DifficultyTier, SessionId};

/// Whether the session can still accept answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Completed,
}

/// The state container for one quiz run.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    history: Vec<AnswerRecord>,
    difficulty: DifficultyTier,
    total: usize,
    pending: Option<String>,
    state: SessionState,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a new session starting at `start_tier` for a quiz of `total` questions.
    pub fn new(start_tier: DifficultyTier, total: usize) -> Self {
        Self::new_at(start_tier, total, Utc::now())
    }

    /// Create a new session with explicit timestamps.
    pub fn new_at(start_tier: DifficultyTier, total: usize, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
            difficulty: start_tier,
            total,
            pending: None,
            state: SessionState::Active,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Committed answers in question order.
    pub fn history(&self) -> &[AnswerRecord] {
        &self.history
    }

    /// Current difficulty estimate.
    pub fn difficulty(&self) -> DifficultyTier {
        self.difficulty
    }

    /// Number of questions answered and committed.
    pub fn served_count(&self) -> usize {
        self.history.len()
    }

    /// Quiz length for this session.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The question currently awaiting an answer.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Completed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// True if `question_id` was answered or is currently pending.
    pub fn has_seen(&self, question_id: &str) -> bool {
        self.pending.as_deref() == Some(question_id)
            || self.history.iter().any(|r| r.question_id == question_id)
    }

    /// Mark a question as presented and awaiting an answer.
    pub fn present(&mut self, question_id: impl Into<String>) -> QuizResult<()> {
        if self.is_complete() {
            return Err(QuizError::invalid_state("session is already complete"));
        }
        if self.served_count() >= self.total {
            return Err(QuizError::invalid_state(format!(
                "all {} questions have been served",
                self.total
            )));
        }
        if let Some(pending) = &self.pending {
            return Err(QuizError::invalid_state(format!(
                "question {pending} is still awaiting an answer"
            )));
        }
        self.pending = Some(question_id.into());
        Ok(())
    }

    /// Commit an answer for the pending question and move the difficulty
    /// estimate to `next_tier`.
    pub fn record_answer(
        &mut self,
        record: AnswerRecord,
        next_tier: DifficultyTier,
    ) -> QuizResult<()> {
        if self.is_complete() || self.served_count() >= self.total {
            return Err(QuizError::invalid_state(format!(
                "all {} questions have already been answered",
                self.total
            )));
        }
        match self.pending.as_deref() {
            Some(pending) if pending == record.question_id => {}
            Some(pending) => {
                return Err(QuizError::invalid_state(format!(
                    "answer is for question {} but {pending} is pending",
                    record.question_id
                )))
            }
            None => {
                return Err(QuizError::invalid_state("no question is pending"));
            }
        }

        self.last_activity = self.last_activity.max(record.answered_at);
        self.history.push(record);
        self.difficulty = next_tier;
        self.pending = None;
        Ok(())
    }

    /// Mark the session as finished. Idempotent.
    pub fn complete(&mut self) {
        self.pending = None;
        self.state = SessionState::Completed;
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = self.last_activity.max(now);
    }

    /// True iff more than `threshold` has passed since the last activity.
    pub fn is_expired(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.last_activity > threshold
    }

    /// Aggregate the session's history.
    pub fn compute_summary(&self) -> SessionSummary {
        let answered = self.history.len();
        let average_score = if answered == 0 {
            0.0
        } else {
            self.history.iter().map(|r| r.score).sum::<f64>() / answered as f64
        };

        let explained: Vec<f64> = self
            .history
            .iter()
            .filter_map(|r| r.explanation_score)
            .collect();
        let average_explanation = if explained.is_empty() {
            0.0
        } else {
            explained.iter().sum::<f64>() / explained.len() as f64
        };

        let mut by_tier: BTreeMap<DifficultyTier, (usize, f64)> = BTreeMap::new();
        for r in &self.history {
            let entry = by_tier.entry(r.tier).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += r.score;
        }
        let per_tier = by_tier
            .into_iter()
            .map(|(tier, (count, sum))| TierBreakdown {
                tier,
                answered: count,
                average_score: sum / count as f64,
            })
            .collect();

        let elapsed = (self.last_activity - self.created_at).max(Duration::zero());

        SessionSummary {
            session_id: self.id,
            answered,
            total: self.total,
            average_score,
            average_explanation,
            per_tier,
            final_difficulty: self.difficulty,
            elapsed_secs: elapsed.num_milliseconds() as f64 / 1000.0,
            completed: self.is_complete(),
            responses: self.history.clone(),
        }
    }

    /// Snapshot for status queries.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            question_number: (self.served_count() + 1).min(self.total),
            total: self.total,
            served: self.served_count(),
            difficulty: self.difficulty,
            finished: self.is_complete(),
            pending_question: self.pending.clone(),
        }
    }
}

/// Per-tier slice of a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub tier: DifficultyTier,
    pub answered: usize,
    pub average_score: f64,
}

/// Aggregate results of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub answered: usize,
    pub total: usize,
    /// Mean score; exactly 0.0 when nothing has been answered.
    pub average_score: f64,
    /// Mean explanation score over the answers that had one graded; 0.0 when
    /// none did.
    pub average_explanation: f64,
    /// Ascending by tier.
    pub per_tier: Vec<TierBreakdown>,
    pub final_difficulty: DifficultyTier,
    /// Seconds from creation to the last activity.
    pub elapsed_secs: f64,
    pub completed: bool,
    pub responses: Vec<AnswerRecord>,
}

/// Lightweight progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    /// 1-based number of the current (or last) question.
    pub question_number: usize,
    pub total: usize,
    pub served: usize,
    pub difficulty: DifficultyTier,
    pub finished: bool,
    pub pending_question: Option<String>,
}
