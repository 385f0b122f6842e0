//! Provider‑agnostic LLM integration for VeriSight.
//!
//! This crate exposes a common [`traits::LlmClient`] interface and concrete
//! provider implementations for OpenAI-compatible APIs (OpenAI, Groq) and
//! Ollama. It also provides a convenience function to initialize a client
//! from a [`verisight_common::LlmConfig`].
//!
//! # Examples
//! ```no_run
//! use verisight_common::LlmConfig;
//! use verisight_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> verisight_llm::traits::Result<()> {
//! let cfg = LlmConfig::Groq {
//!     api_key: "gsk_live".into(),
//!     model: "llama-3.3-70b-versatile".into(),
//!     endpoint: verisight_common::DEFAULT_GROQ_ENDPOINT.into(),
//!     temperature: None,
//! };
//! let client = ensure_llm_ready(&cfg).await?;
//! assert_eq!(client.model_name(), "llama-3.3-70b-versatile");
//! # Ok(())
//! # }
//! ```
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod traits;

use std::sync::Arc;
use verisight_common::LlmConfig;

pub use traits::{LlmClient, LlmError, LlmResponse, ResponseMode, Result};

/// Build the configured LLM client (probing local servers where needed).
pub async fn ensure_llm_ready(
    config: &LlmConfig,
) -> traits::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    tracing::info!(provider = config.provider_name(), "llm.init");
    match config {
        #[cfg(feature = "openai")]
        LlmConfig::Groq {
            api_key,
            model,
            endpoint,
            temperature,
        }
        | LlmConfig::Openai {
            api_key,
            model,
            endpoint,
            temperature,
        } => {
            let client =
                openai::OpenAiClient::with_endpoint(endpoint, api_key.clone(), model.clone())?
                    .with_temperature(*temperature);
            Ok(Arc::new(client))
        }
        #[cfg(feature = "ollama")]
        LlmConfig::Ollama {
            model,
            endpoint,
            temperature,
        } => {
            let client = ollama::OllamaClient::new(endpoint, model.clone())
                .await?
                .with_temperature(*temperature);
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(LlmError::Config("No LLM configured".to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(LlmError::Config("LLM provider not enabled".to_string())),
    }
}
