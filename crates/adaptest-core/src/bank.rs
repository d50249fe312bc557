//! The question bank: an ordered, immutable collection of questions.
//!
//! Banks are loaded once from TOML at startup and shared read-only
//! (behind an `Arc`) for the lifetime of the process.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::DifficultyPolicy;
use crate::error::{QuizError, QuizResult};
use crate::model::{DifficultyTier, Question};

/// An ordered, read-only set of questions.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    id: String,
    name: String,
    description: String,
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank, rejecting empty banks and duplicate question ids.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        questions: Vec<Question>,
    ) -> QuizResult<Self> {
        if questions.is_empty() {
            return Err(QuizError::Bank("bank contains no questions".into()));
        }
        let mut seen = HashSet::new();
        for q in &questions {
            if !seen.insert(q.id.as_str()) {
                return Err(QuizError::Bank(format!("duplicate question id: {}", q.id)));
            }
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            questions,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Questions in bank order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn by_id(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Distinct tiers present in the bank, ascending.
    pub fn tiers(&self) -> BTreeSet<DifficultyTier> {
        self.questions.iter().map(|q| q.tier).collect()
    }

    /// The median of all questions' tiers (lower median for even counts).
    pub fn median_tier(&self) -> Option<DifficultyTier> {
        let mut tiers: Vec<DifficultyTier> = self.questions.iter().map(|q| q.tier).collect();
        if tiers.is_empty() {
            return None;
        }
        tiers.sort_unstable();
        Some(tiers[(tiers.len() - 1) / 2])
    }
}

// ---------------------------------------------------------------------------
// TOML loading
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    tier: u8,
    prompt: String,
    #[serde(default)]
    reference_answer: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Parse a question bank TOML file.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank` (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| Question {
            id: q.id,
            prompt: q.prompt,
            reference_answer: q.reference_answer,
            tier: DifficultyTier(q.tier),
            topic: q.topic,
            keywords: q.keywords,
        })
        .collect();

    let bank = QuestionBank::new(parsed.bank.id, parsed.bank.name, questions)
        .with_context(|| format!("invalid question bank: {}", source_path.display()))?
        .with_description(parsed.bank.description);

    tracing::debug!(bank = %bank.id(), questions = bank.len(), "loaded question bank");
    Ok(bank)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A warning from question bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Check a bank against the difficulty policy and quiz length.
pub fn validate_bank(
    bank: &QuestionBank,
    policy: &DifficultyPolicy,
    max_questions: usize,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for q in bank.questions() {
        if q.prompt.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: "prompt is empty".into(),
            });
        }
        if q.reference_answer.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: "reference_answer is empty; the judge has nothing to compare against"
                    .into(),
            });
        }
        if q.tier < policy.min_tier || q.tier > policy.max_tier {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!(
                    "{} is outside the policy range {}..={}",
                    q.tier,
                    policy.min_tier.value(),
                    policy.max_tier.value()
                ),
            });
        }
    }

    let present = bank.tiers();
    for level in policy.min_tier.value()..=policy.max_tier.value() {
        let tier = DifficultyTier(level);
        if !present.contains(&tier) {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "no questions at {tier}; selection will fall back to the nearest tier"
                ),
            });
        }
    }

    if bank.len() < max_questions {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!(
                "bank has {} questions but the quiz length is {max_questions}; quizzes will end after {}",
                bank.len(),
                bank.len()
            ),
        });
    }

    warnings
}
