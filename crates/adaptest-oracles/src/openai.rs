//! OpenAI-compatible chat-completions judge.

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Judge backed by an OpenAI-compatible API.
pub struct OpenAiOracle {
    api_key: String,
    base_url: String,
    org_id: Option<String>,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiOracle {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        org_id: Option<String>,
        model: Option<String>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS);
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
            client: build_client(timeout)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.header("Authorization", format!("Bearer {}", self.api_key));
        match &self.org_id {
            Some(org) => req.header("OpenAI-Organization", org),
            None => req,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAiError>(body)
        .ok()
        .map(|e| e.error.message)
}

#[async_trait]
impl ScoringOracle for OpenAiOracle {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip_all, fields(model = %self.model, question = %question.id))]
    async fn evaluate(
        &self,
        question: &Question,
        submission: &Submission,
    ) -> Result<Evaluation, OracleError> {
        let body = ChatRequest {
            model: self.model.clone(),
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: JUDGE_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_judge_prompt(question, submission),
                },
            ],
        };

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/v1/chat/completions", self.base_url)),
            )
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response, error_message).await);
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            OracleError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::InvalidResponse("response contained no message".into()))?;

        let evaluation = parse_verdict(&content)?;
        tracing::debug!(score = evaluation.score, "judge verdict");
        Ok(evaluation)
    }

    async fn check(&self) -> Result<(), OracleError> {
        let response = self
            .authorized(self.client.get(format!("{}/v1/models", self.base_url)))
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
