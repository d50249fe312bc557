//! Anthropic Messages API judge.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use adaptest_core::model::Question;
use adaptest_core::traits::{
    build_judge_prompt, parse_verdict, Evaluation, ScoringOracle, Submission, JUDGE_SYSTEM_PROMPT,
};
use adaptest_core::OracleError;

use crate::http::{build_client, status_error, transport_error, DEFAULT_HTTP_TIMEOUT_SECS};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 512;
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Judge backed by the Anthropic API.
pub struct AnthropicOracle {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicOracle {
    pub fn new(api_key: &str, base_url: Option<String>, model: Option<String>) -> Result<Self> {
        let timeout = Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS);
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
            client: build_client(timeout)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    system: &'static str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<AnthropicError>(body)
        .ok()
        .map(|e| e.error.message)
}

#[async_trait]
impl ScoringOracle for AnthropicOracle {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip_all, fields(model = %self.model, question = %question.id))]
    async fn evaluate(
        &self,
        question: &Question,
        submission: &Submission,
    ) -> Result<Evaluation, OracleError> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: JUDGE_SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: build_judge_prompt(question, submission),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response, error_message).await);
        }

        let api_response: MessagesResponse = response.json().await.map_err(|e| {
            OracleError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        let text: String = api_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(OracleError::InvalidResponse(
                "response contained no text".into(),
            ));
        }

        let evaluation = parse_verdict(&text)?;
        tracing::debug!(score = evaluation.score, "judge verdict");
        Ok(evaluation)
    }

    async fn check(&self) -> Result<(), OracleError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response, error_message).await)
        }
    }
}
