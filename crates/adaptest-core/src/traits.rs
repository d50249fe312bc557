//! The scoring oracle trait and its request/response types.
//!
//! Concrete oracles (OpenAI, Anthropic, mock) live in `adaptest-oracles`.
//! The engine and sessions only ever see `Evaluation` values that passed
//! `Evaluation::validate`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::model::Question;

// ---------------------------------------------------------------------------
// Scoring oracle trait
// ---------------------------------------------------------------------------

/// Trait for backends that judge a free-text answer to a question.
///
/// Each call is a single logical attempt. Implementations that retry do so
/// internally (see `RetryingOracle` in `adaptest-oracles`).
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Human-readable oracle name (e.g. "openai").
    fn name(&self) -> &str;

    /// Score a submission against a question.
    async fn evaluate(
        &self,
        question: &Question,
        submission: &Submission,
    ) -> Result<Evaluation, OracleError>;

    /// Verify the backend is reachable and the credentials are accepted.
    async fn check(&self) -> Result<(), OracleError> {
        Ok(())
    }
}

/// What the test-taker submitted for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// The answer text.
    pub answer: String,
    /// Optional reasoning behind the answer.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// The oracle's verdict on a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Correctness in `[0.0, 1.0]`.
    pub score: f64,
    /// Qualitative feedback for the test-taker.
    pub feedback: String,
    /// The main misconception the judge identified, if any.
    #[serde(default)]
    pub misconception: Option<String>,
    /// Quality of the submitted explanation in `[0.0, 1.0]`, when one was
    /// given and graded. Reported in summaries only; difficulty follows `score`.
    #[serde(default)]
    pub explanation_score: Option<f64>,
}

impl Evaluation {
    /// Reject scores outside `[0.0, 1.0]` (including NaN and infinities).
    ///
    /// Never clamps: a degraded evaluation must surface as an error.
    pub fn validate(&self) -> Result<(), OracleError> {
        check_unit_interval("score", self.score)?;
        if let Some(explanation_score) = self.explanation_score {
            check_unit_interval("explanation_score", explanation_score)?;
        }
        Ok(())
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), OracleError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(OracleError::InvalidResponse(format!(
            "{field} {value} is outside [0, 1]"
        )))
    }
}

// ---------------------------------------------------------------------------
// Judge prompt
// ---------------------------------------------------------------------------

/// System prompt for LLM-backed oracles.
pub const JUDGE_SYSTEM_PROMPT: &str = "You are a strict but fair programming examiner. \
Compare the candidate's answer with the reference answer and grade its correctness. \
If the candidate explained their reasoning, grade the explanation separately. \
Respond ONLY with a JSON object of the form \
{\"score\": <number between 0 and 1>, \
\"explanation_score\": <number between 0 and 1, or null when no explanation was given>, \
\"feedback\": \"<one or two sentences for the candidate>\", \
\"misconception\": \"<main misconception or null>\"}. \
Do not wrap the JSON in prose.";

/// Build the user message sent to an LLM judge.
pub fn build_judge_prompt(question: &Question, submission: &Submission) -> String {
    let mut prompt = format!(
        "Question ({}):\n{}\n\nReference answer:\n{}\n",
        question.tier, question.prompt, question.reference_answer
    );
    if !question.keywords.is_empty() {
        prompt.push_str(&format!(
            "\nKey concepts: {}\n",
            question.keywords.join(", ")
        ));
    }
    prompt.push_str(&format!("\nCandidate answer:\n{}\n", submission.answer));
    if let Some(explanation) = submission
        .explanation
        .as_deref()
        .filter(|e| !e.trim().is_empty())
    {
        prompt.push_str(&format!("\nCandidate explanation:\n{explanation}\n"));
    }
    prompt
}

// ---------------------------------------------------------------------------
// Verdict parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawVerdict {
    score: serde_json::Value,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    misconception: Option<String>,
    #[serde(default)]
    explanation_score: serde_json::Value,
}

/// A number or numeric string; `None` for anything else.
fn numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse a judge's text response into a validated `Evaluation`.
///
/// Accepts a bare JSON object or one inside a markdown code block. Scores
/// may be JSON numbers or numeric strings; `explanation_score` may be absent
/// or null.
pub fn parse_verdict(response: &str) -> Result<Evaluation, OracleError> {
    let json = extract_json_from_markdown(response);
    let raw: RawVerdict = serde_json::from_str(json.trim())
        .map_err(|e| OracleError::InvalidResponse(format!("verdict is not valid JSON: {e}")))?;

    let score = numeric(&raw.score).ok_or_else(|| {
        OracleError::InvalidResponse(format!("score is not a number: {}", raw.score))
    })?;
    let explanation_score = match &raw.explanation_score {
        serde_json::Value::Null => None,
        value => Some(numeric(value).ok_or_else(|| {
            OracleError::InvalidResponse(format!("explanation_score is not a number: {value}"))
        })?),
    };

    let misconception = raw
        .misconception
        .filter(|m| !m.trim().is_empty() && !m.eq_ignore_ascii_case("null"));

    let evaluation = Evaluation {
        score,
        feedback: raw.feedback,
        misconception,
        explanation_score,
    };
    evaluation.validate()?;
    Ok(evaluation)
}

/// Extract a JSON payload from a markdown-formatted LLM response.
///
/// Handles:
/// - ```json``` blocks (preferred)
/// - Generic ``` blocks
/// - Raw text, trimmed to the outermost `{ ... }` when present
pub fn extract_json_from_markdown(response: &str) -> &str {
    let mut generic = None;
    let mut rest = response;

    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let line_end = after_fence.find('\n').unwrap_or(after_fence.len());
        let lang = after_fence[..line_end].trim().to_lowercase();
        let body_start = (line_end + 1).min(after_fence.len());
        let body = &after_fence[body_start..];
        // Unclosed fences (truncated responses) run to the end of the text.
        let close = body.find("```").unwrap_or(body.len());
        let block = &body[..close];

        if lang == "json" {
            return block;
        }
        if lang.is_empty() && generic.is_none() {
            generic = Some(block);
        }
        rest = &body[(close + 3).min(body.len())..];
    }

    if let Some(block) = generic {
        return block;
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DifficultyTier;

    fn question() -> Question {
        Question {
            id: "py-07".into(),
            prompt: "What is a Python generator?".into(),
            reference_answer: "A function that yields values lazily.".into(),
            tier: DifficultyTier(3),
            topic: Some("generators".into()),
            keywords: vec!["yield".into(), "lazy".into()],
        }
    }

    #[test]
    fn validate_accepts_bounds() {
        for score in [0.0, 0.3, 0.7, 1.0] {
            let e = Evaluation {
                score,
                feedback: String::new(),
                misconception: None,
                explanation_score: Some(score),
            };
            assert!(e.validate().is_ok(), "score {score} should be valid");
        }
    }

    #[test]
    fn validate_rejects_out_of_range_and_nan() {
        for score in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            let e = Evaluation {
                score,
                feedback: String::new(),
                misconception: None,
                explanation_score: None,
            };
            assert!(matches!(
                e.validate(),
                Err(OracleError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn validate_checks_explanation_score() {
        let e = Evaluation {
            score: 0.5,
            feedback: String::new(),
            misconception: None,
            explanation_score: Some(1.2),
        };
        let err = e.validate().unwrap_err();
        assert!(err.to_string().contains("explanation_score 1.2"));
    }

    #[test]
    fn judge_prompt_includes_reference_and_explanation() {
        let submission = Submission {
            answer: "It uses yield".into(),
            explanation: Some("values are produced on demand".into()),
        };
        let prompt = build_judge_prompt(&question(), &submission);
        assert!(prompt.contains("Reference answer:\nA function that yields values lazily."));
        assert!(prompt.contains("Key concepts: yield, lazy"));
        assert!(prompt.contains("Candidate explanation:\nvalues are produced on demand"));
        assert!(prompt.contains("tier 3"));
    }

    #[test]
    fn judge_prompt_skips_blank_explanation() {
        let submission = Submission {
            answer: "It uses yield".into(),
            explanation: Some("   ".into()),
        };
        let prompt = build_judge_prompt(&question(), &submission);
        assert!(!prompt.contains("Candidate explanation"));
    }

    #[test]
    fn parse_bare_verdict() {
        let e = parse_verdict(r#"{"score": 0.8, "feedback": "Good.", "misconception": null}"#)
            .unwrap();
        assert_eq!(e.score, 0.8);
        assert_eq!(e.feedback, "Good.");
        assert!(e.misconception.is_none());
        assert!(e.explanation_score.is_none());
    }

    #[test]
    fn parse_verdict_with_explanation_score() {
        let e = parse_verdict(
            r#"{"score": 0.9, "explanation_score": "0.4", "feedback": "Right, thin reasoning."}"#,
        )
        .unwrap();
        assert_eq!(e.score, 0.9);
        assert_eq!(e.explanation_score, Some(0.4));

        let e = parse_verdict(r#"{"score": 0.9, "explanation_score": null}"#).unwrap();
        assert_eq!(e.explanation_score, None);
    }

    #[test]
    fn parse_verdict_rejects_bad_explanation_score() {
        let err = parse_verdict(r#"{"score": 0.9, "explanation_score": 3}"#).unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse(_)));
        let err = parse_verdict(r#"{"score": 0.9, "explanation_score": "good"}"#).unwrap_err();
        assert!(err.to_string().contains("explanation_score is not a number"));
    }

    #[test]
    fn parse_verdict_in_json_block() {
        let response = "Here is my grading:\n\n```json\n{\"score\": \"0.25\", \"feedback\": \"Missing yield.\", \"misconception\": \"confuses with lists\"}\n```\n";
        let e = parse_verdict(response).unwrap();
        assert_eq!(e.score, 0.25);
        assert_eq!(e.misconception.as_deref(), Some("confuses with lists"));
    }

    #[test]
    fn parse_verdict_with_surrounding_prose() {
        let e = parse_verdict("Verdict: {\"score\": 1, \"feedback\": \"Exact.\"} done").unwrap();
        assert_eq!(e.score, 1.0);
    }

    #[test]
    fn parse_verdict_rejects_out_of_range_score() {
        let err = parse_verdict(r#"{"score": 7, "feedback": "out of ten"}"#).unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse(_)));
    }

    #[test]
    fn parse_verdict_rejects_non_numeric_score() {
        let err = parse_verdict(r#"{"score": "high", "feedback": ""}"#).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn parse_verdict_rejects_garbage() {
        assert!(matches!(
            parse_verdict("I cannot grade this."),
            Err(OracleError::InvalidResponse(_))
        ));
    }

    #[test]
    fn extract_prefers_json_over_generic_block() {
        let input = "```\n{\"a\": 1}\n```\n\n```json\n{\"b\": 2}\n```";
        assert_eq!(extract_json_from_markdown(input).trim(), "{\"b\": 2}");
    }

    #[test]
    fn extract_truncated_block() {
        let input = "```json\n{\"score\": 0.5, \"feedback\": \"ok\"}";
        assert_eq!(
            extract_json_from_markdown(input).trim(),
            "{\"score\": 0.5, \"feedback\": \"ok\"}"
        );
    }
}
