//! Retry wrapper for flaky oracle backends.
//!
//! Retries live here, inside the adapter layer. From the quiz's point of
//! view a `RetryingOracle` is still one `evaluate` call.

use std::time::Duration;

use async_trait::async_trait;

use adaptest_core::model::Question;
use adaptest_core::traits::{Evaluation, ScoringOracle, Submission};
use adaptest_core::OracleError;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retries transient failures of an inner oracle with exponential backoff.
pub struct RetryingOracle<O> {
    inner: O,
    max_retries: u32,
    retry_delay: Duration,
}

impl<O: ScoringOracle> RetryingOracle<O> {
    pub fn new(inner: O, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            retry_delay,
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: ScoringOracle> ScoringOracle for RetryingOracle<O> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn evaluate(
        &self,
        question: &Question,
        submission: &Submission,
    ) -> Result<Evaluation, OracleError> {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            match self.inner.evaluate(question, submission).await {
                Ok(evaluation) => return Ok(evaluation),
                Err(e) if e.is_permanent() || attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    // Use the provider's retry-after hint if available
                    let wait = e.retry_after().unwrap_or(delay);
                    tracing::warn!(
                        oracle = self.inner.name(),
                        attempt,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "evaluation failed, retrying: {e}"
                    );
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn check(&self) -> Result<(), OracleError> {
        self.inner.check().await
    }
}
