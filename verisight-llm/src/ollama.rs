use crate::traits::{LlmClient, LlmError, LlmResponse, ResponseMode, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use verisight_http::{HttpClient, RequestOpts};

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    /// Create a new client and verify the server is up and the model is present.
    pub async fn new(base_url: &str, model: String) -> Result<Self> {
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let client = HttpClient::new(&base)
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {e}")))?
            .with_timeout(Duration::from_secs(120))
            .with_retries(0);

        let ollama_client = Self {
            client,
            model,
            temperature: None,
        };

        let models = ollama_client.fetch_available_models().await?;
        if !models.iter().any(|m| m == &ollama_client.model) {
            return Err(LlmError::ModelNotAvailable(format!(
                "{} (pull it with `ollama pull {}`)",
                ollama_client.model, ollama_client.model
            )));
        }

        Ok(ollama_client)
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self
            .client
            .get_json("api/tags", RequestOpts::default())
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "llm.ollama.tags_failed");
                LlmError::Api(OLLAMA_CONNECTION_ERROR.to_string())
            })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        mode: ResponseMode,
    ) -> Result<LlmResponse> {
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            system: system_prompt,
            stream: false,
            format: match mode {
                ResponseMode::Json => Some("json"),
                ResponseMode::Text => None,
            },
            options: GenerateOptions {
                temperature: temperature.or(self.temperature),
                num_predict: max_tokens,
            },
        };

        let resp: GenerateResponse = self
            .client
            .post_json_opts("api/generate", &req, RequestOpts::default())
            .await?;

        Ok(LlmResponse {
            text: resp.response,
            model: resp.model,
            tokens_used: resp.eval_count,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fetch_available_models().await.is_ok())
    }
}
