//! Adaptive question selection.
//!
//! The difficulty controller is a proportional step: one tier up on a high
//! score, one tier down on a low score, otherwise unchanged. Selection picks
//! the first unserved question at the new tier in bank order, falling back
//! to the nearest tier (lower tier wins ties).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::error::{QuizError, QuizResult};
use crate::model::{AnswerRecord, DifficultyTier, Question};
use crate::session::Session;
use crate::traits::{Evaluation, Submission};

/// Default quiz length.
pub const DEFAULT_MAX_QUESTIONS: usize = 15;

/// Difficulty adjustment policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyPolicy {
    /// Scores at or above this move up one tier.
    pub high_threshold: f64,
    /// Scores at or below this move down one tier.
    pub low_threshold: f64,
    pub min_tier: DifficultyTier,
    pub max_tier: DifficultyTier,
    /// Starting tier; the bank's median tier when unset.
    pub start_tier: Option<DifficultyTier>,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            high_threshold: 0.7,
            low_threshold: 0.3,
            min_tier: DifficultyTier(1),
            max_tier: DifficultyTier(5),
            start_tier: None,
        }
    }
}

impl DifficultyPolicy {
    /// Apply the step controller to `current` given `score`.
    pub fn adjust(&self, current: DifficultyTier, score: f64) -> DifficultyTier {
        if score >= self.high_threshold {
            current.raised(self.max_tier)
        } else if score <= self.low_threshold {
            current.lowered(self.min_tier)
        } else {
            current
        }
    }

    /// Returns a list of problems with the policy, empty if it is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, value) in [
            ("high_threshold", self.high_threshold),
            ("low_threshold", self.low_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        if self.low_threshold >= self.high_threshold {
            problems.push(format!(
                "low_threshold ({}) must be below high_threshold ({})",
                self.low_threshold, self.high_threshold
            ));
        }
        if self.min_tier > self.max_tier {
            problems.push(format!(
                "min_tier ({}) must not exceed max_tier ({})",
                self.min_tier.value(),
                self.max_tier.value()
            ));
        }
        if let Some(start) = self.start_tier {
            if start < self.min_tier || start > self.max_tier {
                problems.push(format!(
                    "start_tier ({}) is outside {}..={}",
                    start.value(),
                    self.min_tier.value(),
                    self.max_tier.value()
                ));
            }
        }
        problems
    }
}

/// Result of asking the engine for the next question.
#[derive(Debug)]
pub enum Selection<'a> {
    /// Another question is available and is now pending on the session.
    Next(&'a Question),
    /// Every question of the quiz has been served. Not an error.
    Exhausted,
}

impl Selection<'_> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Selection::Exhausted)
    }
}

/// Chooses questions and steers difficulty.
#[derive(Debug, Clone)]
pub struct AdaptiveEngine {
    bank: Arc<QuestionBank>,
    policy: DifficultyPolicy,
    max_questions: usize,
}

impl AdaptiveEngine {
    pub fn new(bank: Arc<QuestionBank>, policy: DifficultyPolicy, max_questions: usize) -> Self {
        Self {
            bank,
            policy,
            max_questions,
        }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn policy(&self) -> &DifficultyPolicy {
        &self.policy
    }

    /// Number of questions a session will be served: never more than the bank holds.
    pub fn total_questions(&self) -> usize {
        self.max_questions.min(self.bank.len())
    }

    /// The configured start tier, or the bank's median tier.
    pub fn start_tier(&self) -> DifficultyTier {
        self.policy
            .start_tier
            .or_else(|| self.bank.median_tier())
            .unwrap_or(self.policy.min_tier)
    }

    /// A fresh session sized and positioned for this engine.
    pub fn new_session(&self) -> Session {
        Session::new(self.start_tier(), self.total_questions())
    }

    /// The opening question: nearest to the start tier, first in bank order.
    pub fn select_first_question(&self) -> QuizResult<&Question> {
        if self.total_questions() == 0 {
            return Err(QuizError::invalid_state("question bank is empty"));
        }
        self.closest_unserved(self.start_tier(), |_| false)
            .ok_or_else(|| QuizError::invalid_state("question bank is empty"))
    }

    /// Select the opening question and mark it pending on `session`.
    pub fn begin<'a>(&'a self, session: &mut Session) -> QuizResult<&'a Question> {
        if session.served_count() > 0 || session.pending().is_some() {
            return Err(QuizError::invalid_state("session has already started"));
        }
        let question = self.select_first_question()?;
        session.present(question.id.clone())?;
        tracing::debug!(session = %session.id(), question = %question.id, tier = %question.tier, "first question");
        Ok(question)
    }

    /// Commit the evaluation of `answered`, adjust difficulty, and pick the
    /// next question (marking it pending) or report exhaustion.
    ///
    /// On any error the session is left untouched.
    pub fn record_answer_and_select_next<'a>(
        &'a self,
        session: &mut Session,
        answered: &Question,
        submission: &Submission,
        evaluation: &Evaluation,
    ) -> QuizResult<Selection<'a>> {
        if !(evaluation.score.is_finite() && (0.0..=1.0).contains(&evaluation.score)) {
            return Err(QuizError::invalid_state(format!(
                "score {} is outside [0, 1]",
                evaluation.score
            )));
        }
        if session.is_complete() || session.served_count() >= session.total() {
            return Err(QuizError::invalid_state(format!(
                "all {} questions have already been served",
                session.total()
            )));
        }

        let asked_at = session.difficulty();
        let next_tier = self.policy.adjust(asked_at, evaluation.score);
        let record = AnswerRecord {
            question_id: answered.id.clone(),
            answer: submission.answer.clone(),
            explanation: submission.explanation.clone(),
            score: evaluation.score,
            feedback: evaluation.feedback.clone(),
            misconception: evaluation.misconception.clone(),
            explanation_score: evaluation.explanation_score,
            tier: asked_at,
            answered_at: Utc::now(),
        };
        session.record_answer(record, next_tier)?;

        tracing::debug!(
            session = %session.id(),
            question = %answered.id,
            score = evaluation.score,
            from = %asked_at,
            to = %next_tier,
            "difficulty adjusted"
        );

        if session.served_count() >= session.total() {
            session.complete();
            return Ok(Selection::Exhausted);
        }

        // served < total <= bank.len() guarantees an unserved question exists
        let next = self
            .closest_unserved(next_tier, |q| session.has_seen(&q.id))
            .ok_or_else(|| QuizError::invalid_state("no unserved question remains"))?;
        session.present(next.id.clone())?;
        Ok(Selection::Next(next))
    }

    /// First question in bank order at the tier nearest `target`, skipping
    /// `seen` ones. Ties in distance go to the lower tier.
    fn closest_unserved(
        &self,
        target: DifficultyTier,
        seen: impl Fn(&Question) -> bool,
    ) -> Option<&Question> {
        self.bank
            .questions()
            .iter()
            .enumerate()
            .filter(|&(_, q)| !seen(q))
            .min_by_key(|(index, q)| (q.tier.distance(target), q.tier, *index))
            .map(|(_, q)| q)
    }
}
