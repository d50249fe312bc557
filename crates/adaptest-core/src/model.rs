//! Core data model types for adaptest.
//!
//! Questions are immutable once loaded into a bank; answer records are
//! immutable once appended to a session's history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique session identifier (UUID v4, server-generated).
pub type SessionId = Uuid;

/// An ordered difficulty level. Higher is harder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifficultyTier(pub u8);

impl DifficultyTier {
    pub fn value(self) -> u8 {
        self.0
    }

    /// One tier harder, capped at `max`.
    pub fn raised(self, max: DifficultyTier) -> DifficultyTier {
        DifficultyTier(self.0.saturating_add(1).min(max.0))
    }

    /// One tier easier, floored at `min`.
    pub fn lowered(self, min: DifficultyTier) -> DifficultyTier {
        DifficultyTier(self.0.saturating_sub(1).max(min.0))
    }

    /// Absolute distance between two tiers.
    pub fn distance(self, other: DifficultyTier) -> u8 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// A single quiz question from the bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the bank.
    pub id: String,
    /// The question text shown to the test-taker.
    pub prompt: String,
    /// The expected answer, given to the judge and never to the test-taker.
    pub reference_answer: String,
    /// Declared difficulty.
    pub tier: DifficultyTier,
    /// Optional topic label (e.g. "generators").
    #[serde(default)]
    pub topic: Option<String>,
    /// Concepts a complete answer is expected to mention.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// The test-taker's view of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub prompt: String,
    pub tier: DifficultyTier,
    #[serde(default)]
    pub topic: Option<String>,
    /// 1-based position of this question in the quiz.
    pub number: usize,
    /// Quiz length.
    pub total: usize,
}

impl QuestionView {
    pub fn new(question: &Question, number: usize, total: usize) -> Self {
        Self {
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            tier: question.tier,
            topic: question.topic.clone(),
            number,
            total,
        }
    }
}

/// One committed answer in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    /// Awarded score in `[0.0, 1.0]`.
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub misconception: Option<String>,
    /// Graded quality of the explanation, if the oracle scored one.
    #[serde(default)]
    pub explanation_score: Option<f64>,
    /// Difficulty at the time the question was asked.
    pub tier: DifficultyTier,
    pub answered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_steps_respect_bounds() {
        let min = DifficultyTier(1);
        let max = DifficultyTier(5);
        assert_eq!(DifficultyTier(3).raised(max), DifficultyTier(4));
        assert_eq!(DifficultyTier(5).raised(max), DifficultyTier(5));
        assert_eq!(DifficultyTier(3).lowered(min), DifficultyTier(2));
        assert_eq!(DifficultyTier(1).lowered(min), DifficultyTier(1));
    }

    #[test]
    fn tier_distance_is_symmetric() {
        assert_eq!(DifficultyTier(2).distance(DifficultyTier(5)), 3);
        assert_eq!(DifficultyTier(5).distance(DifficultyTier(2)), 3);
        assert_eq!(DifficultyTier(4).distance(DifficultyTier(4)), 0);
    }

    #[test]
    fn question_view_hides_reference_answer() {
        let q = Question {
            id: "py-01".into(),
            prompt: "What does `len([])` return?".into(),
            reference_answer: "0".into(),
            tier: DifficultyTier(1),
            topic: Some("lists".into()),
            keywords: vec![],
        };
        let view = QuestionView::new(&q, 1, 15);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("reference_answer"));
        assert_eq!(view.number, 1);
        assert_eq!(view.tier, DifficultyTier(1));
    }
}
