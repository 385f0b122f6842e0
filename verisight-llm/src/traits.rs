use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use verisight_http::HttpError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("{0}")]
    Http(#[from] HttpError),

    #[error("API error: {0}")]
    Api(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Requested shape of the completion text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Text,
    /// Provider-enforced JSON object output.
    Json,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        mode: ResponseMode,
    ) -> Result<LlmResponse>;

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Generate with the provider's JSON mode switched on.
    async fn generate_json(&self, prompt: &str, system_prompt: Option<&str>) -> Result<LlmResponse> {
        self.generate(prompt, system_prompt, None, None, ResponseMode::Json)
            .await
    }

    /// System prompt used when judging claims against retrieved evidence.
    fn default_fact_check_system_prompt(&self) -> &str {
        r#"You are an impartial fact-checking analyst.

Your role:
- Judge the claim ONLY against the supplied search context
- Prefer recent, authoritative sources and note contradictions
- Never invent facts that are absent from the context

Output rules:
- Return a single JSON object, no markdown, no prose outside fields"#
    }
}
