//! Deterministic oracles for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use adaptest_core::model::Question;
use adaptest_core::traits::{Evaluation, ScoringOracle, Submission};
use adaptest_core::OracleError;

/// One scripted reaction of a `MockOracle`.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this score.
    Score(f64),
    /// Fail with this error.
    Fail(OracleError),
    /// Never answer (for exercising caller timeouts).
    Hang,
}

enum Mode {
    /// Pop outcomes in order; fall back to `default` when the script runs out.
    Scripted {
        script: Mutex<VecDeque<MockOutcome>>,
        default: MockOutcome,
    },
    /// Score by the share of the question's keywords found in the answer.
    Keyword,
}

/// A mock oracle for exercising the quiz without real API calls.
pub struct MockOracle {
    mode: Mode,
    delay: Duration,
    call_count: AtomicU32,
    last_submission: Mutex<Option<Submission>>,
}

impl MockOracle {
    /// Play `script` in order, then keep returning `default`.
    pub fn scripted(script: impl IntoIterator<Item = MockOutcome>, default: MockOutcome) -> Self {
        Self::with_mode(Mode::Scripted {
            script: Mutex::new(script.into_iter().collect()),
            default,
        })
    }

    /// Always return the same score.
    pub fn with_fixed_score(score: f64) -> Self {
        Self::scripted([], MockOutcome::Score(score))
    }

    /// Score answers by keyword coverage; a rough offline stand-in for a judge.
    pub fn keyword() -> Self {
        Self::with_mode(Mode::Keyword)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            call_count: AtomicU32::new(0),
            last_submission: Mutex::new(None),
        }
    }

    /// Wait this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of calls made to this oracle.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last submission this oracle was asked to score.
    pub fn last_submission(&self) -> Option<Submission> {
        self.last_submission
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_outcome(&self, question: &Question, submission: &Submission) -> MockOutcome {
        match &self.mode {
            Mode::Scripted { script, default } => script
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or_else(|| default.clone()),
            Mode::Keyword => MockOutcome::Score(keyword_score(question, submission)),
        }
    }
}

/// Share of `question.keywords` mentioned in the answer or explanation.
/// Without keywords, any non-empty answer that shares a word with the
/// reference answer scores 0.5.
fn keyword_score(question: &Question, submission: &Submission) -> f64 {
    let text = format!(
        "{} {}",
        submission.answer,
        submission.explanation.as_deref().unwrap_or_default()
    )
    .to_lowercase();

    if question.keywords.is_empty() {
        let shares_word = question
            .reference_answer
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .any(|w| text.contains(w));
        return if shares_word { 0.5 } else { 0.0 };
    }

    let hits = question
        .keywords
        .iter()
        .filter(|k| text.contains(&k.to_lowercase()))
        .count();
    hits as f64 / question.keywords.len() as f64
}

#[async_trait]
impl ScoringOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(
        &self,
        question: &Question,
        submission: &Submission,
    ) -> Result<Evaluation, OracleError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_submission
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(submission.clone());

        let outcome = self.next_outcome(question, submission);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        // An explanation, when given, is graded the same as the answer.
        let explained = submission
            .explanation
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty());
        match outcome {
            MockOutcome::Score(score) => Ok(Evaluation {
                score,
                feedback: format!("Scored {score:.2} on {}.", question.id),
                misconception: None,
                explanation_score: explained.then_some(score),
            }),
            MockOutcome::Fail(error) => Err(error),
            MockOutcome::Hang => std::future::pending().await,
        }
    }
}
