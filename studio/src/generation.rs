//! Question generation at the AI-service seam.
//!
//! The hosted generation function takes a topic description (or one question
//! plus free-text feedback) and returns a JSON array of questions. Everything
//! that talks to it goes through [`QuestionGenerator`], so tests can script
//! outcomes without a network.

use async_trait::async_trait;
use survey_types::{GenerateRequest, GenerateResponse, Question};

#[derive(Debug, thiserror::Error, Clone)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation response parse failed: {0}")]
    Parse(String),
    #[error("generation service error: {0}")]
    Upstream(String),
    #[error("generation service returned no questions")]
    Empty,
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// One request, one response. The generator is non-deterministic:
    /// callers may rely on the shape of the result, never on exact text.
    async fn generate(&self, request: GenerateRequest) -> Result<Vec<Question>, GenerationError>;
}

/// Production generator: JSON POST to the hosted generation endpoint.
#[derive(Debug, Clone)]
pub struct HttpQuestionGenerator {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpQuestionGenerator {
    pub fn new(endpoint: impl Into<String>, timeout: std::time::Duration) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<Vec<Question>, GenerationError> {
        let started = std::time::Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        // Failures come back as HTTP 500 with `{ error, questions: [] }`, so
        // parse the body before deciding on the status code.
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(GenerationError::Upstream(error));
        }
        if !status.is_success() {
            return Err(GenerationError::Upstream(format!("HTTP {status}")));
        }
        if body.questions.is_empty() {
            return Err(GenerationError::Empty);
        }

        tracing::debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            count = body.questions.len(),
            refinement = request.refine_question.is_some(),
            "generation call completed"
        );
        Ok(body.questions)
    }
}
