//! Common types and utilities shared across VeriSight crates.
//!
//! This crate defines the LLM provider configuration and observability helpers
//! used throughout the VeriSight workspace. It is
//! intentionally lightweight so that every crate can depend on it without
//! pulling in heavy transitive costs.
//!
//! # Overview
//!
//! - [`LlmConfig`]: Provider‑agnostic LLM configuration
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`truncate_chars`]: Bounded diagnostics for logs and payloads
//!
//! # Examples
//!
//! ```rust
//! use verisight_common::{truncate_chars, LlmConfig};
//!
//! let cfg = LlmConfig::default();
//! assert_eq!(cfg.provider_name(), "groq");
//! assert_eq!(truncate_chars("model is loading", 5), "model");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

pub const DEFAULT_GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Configuration for the LLM provider that judges claims.
///
/// Groq and OpenAI share the OpenAI-compatible chat completions wire format;
/// see the `verisight-llm` crate for the concrete clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Groq {
        api_key: String,
        #[serde(default = "default_groq_model")]
        model: String,
        #[serde(default = "default_groq_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    Openai {
        api_key: String,
        model: String,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    Ollama {
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    None,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::Groq {
            api_key: "${GROQ_API_KEY}".to_string(),
            model: default_groq_model(),
            endpoint: default_groq_endpoint(),
            temperature: None,
        }
    }
}

impl LlmConfig {
    /// Short provider tag, as written in configuration files.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Groq { .. } => "groq",
            Self::Openai { .. } => "openai",
            Self::Ollama { .. } => "ollama",
            Self::None => "none",
        }
    }

    /// The secret this provider needs, if any.
    pub fn api_key(&self) -> Option<&str> {
        match self {
            Self::Groq { api_key, .. } | Self::Openai { api_key, .. } => Some(api_key),
            Self::Ollama { .. } | Self::None => None,
        }
    }
}

fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_groq_endpoint() -> String {
    DEFAULT_GROQ_ENDPOINT.into()
}
fn default_openai_endpoint() -> String {
    DEFAULT_OPENAI_ENDPOINT.into()
}
fn default_ollama_endpoint() -> String {
    DEFAULT_OLLAMA_ENDPOINT.into()
}

/// Keep at most `max_chars` characters of `text`, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn llm_config_parses_tagged_provider() {
        let cfg: LlmConfig = serde_json::from_str(
            r#"{"provider":"ollama","model":"llama3.2:3b"}"#,
        )
        .unwrap();
        match cfg {
            LlmConfig::Ollama { endpoint, model, .. } => {
                assert_eq!(endpoint, DEFAULT_OLLAMA_ENDPOINT);
                assert_eq!(model, "llama3.2:3b");
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn groq_defaults_fill_model_and_endpoint() {
        let cfg: LlmConfig =
            serde_json::from_str(r#"{"provider":"groq","api_key":"gsk_test"}"#).unwrap();
        assert_eq!(cfg.api_key(), Some("gsk_test"));
        match cfg {
            LlmConfig::Groq { model, endpoint, .. } => {
                assert_eq!(model, DEFAULT_GROQ_MODEL);
                assert_eq!(endpoint, DEFAULT_GROQ_ENDPOINT);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }
}
