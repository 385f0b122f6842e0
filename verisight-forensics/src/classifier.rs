//! Hosted image classification with cold-start handling.
//!
//! Hosted inference endpoints unload idle models and answer `503` while they
//! spin back up. The gateway waits out one such response and retries exactly
//! once; a second `503` is final.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use verisight_common::truncate_chars;
use verisight_http::{HttpClient, HttpError, RequestOpts};

pub const HF_INFERENCE_BASE: &str = "https://router.huggingface.co/hf-inference/models/";

/// One `{label, score}` pair as returned by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Some endpoints wrap the list once more (`[[...]]`).
#[derive(Deserialize)]
#[serde(untagged)]
enum PredictionPayload {
    Flat(Vec<Prediction>),
    Nested(Vec<Vec<Prediction>>),
}

impl PredictionPayload {
    fn into_predictions(self) -> Vec<Prediction> {
        match self {
            PredictionPayload::Flat(list) => list,
            PredictionPayload::Nested(lists) => lists.into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Non-success status after the cold-start retry (if any).
    #[error("API Error {status}: {message}")]
    Status { status: u16, message: String },
    /// DNS, connect, reset or timeout.
    #[error("{message}")]
    Transport { message: String },
    /// Success status with a body that is not a prediction list.
    #[error("Unexpected classifier response: {message}")]
    Decode { message: String },
}

/// Timing and truncation knobs for [`ClassificationGateway`].
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub timeout: Duration,
    pub cold_start_backoff: Duration,
    pub retry_timeout: Duration,
    pub error_snippet_chars: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cold_start_backoff: Duration::from_secs(15),
            retry_timeout: Duration::from_secs(60),
            error_snippet_chars: 50,
        }
    }
}

/// Anything that can turn image bytes into predictions for a given model.
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    async fn classify(
        &self,
        model_id: &str,
        image: &[u8],
        content_type: &str,
    ) -> Result<Vec<Prediction>, GatewayError>;
}

/// Hugging Face style inference gateway: `POST <base>/<model_id>` with raw bytes.
#[derive(Clone)]
pub struct ClassificationGateway {
    http: HttpClient,
    token: String,
    settings: GatewaySettings,
}

impl ClassificationGateway {
    pub fn new(base_url: &str, token: String, settings: GatewaySettings) -> Result<Self, HttpError> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        // Retries are owned by the cold-start policy below, not the transport.
        let http = HttpClient::new(&base)?
            .with_retries(0)
            .with_timeout(settings.timeout);
        Ok(Self {
            http,
            token,
            settings,
        })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    async fn call(
        &self,
        model_id: &str,
        image: &[u8],
        content_type: &str,
        timeout: Duration,
    ) -> Result<PredictionPayload, HttpError> {
        self.http
            .post_bytes_opts(
                model_id.trim_start_matches('/'),
                image,
                content_type,
                RequestOpts {
                    bearer: Some(&self.token),
                    timeout: Some(timeout),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
    }

    fn map_error(&self, err: HttpError) -> GatewayError {
        let limit = self.settings.error_snippet_chars;
        match err {
            HttpError::Api {
                status, message, ..
            } => GatewayError::Status {
                status: status.as_u16(),
                message: truncate_chars(&message, limit),
            },
            HttpError::Decode(message, _) => GatewayError::Decode {
                message: truncate_chars(&message, limit),
            },
            other @ (HttpError::Network(_) | HttpError::Url(_) | HttpError::Build(_)) => {
                GatewayError::Transport {
                    message: other.to_string(),
                }
            }
        }
    }
}

fn is_cold_start(err: &HttpError) -> bool {
    err.status().map(|s| s.as_u16()) == Some(503)
}

#[async_trait]
impl ClassifierBackend for ClassificationGateway {
    async fn classify(
        &self,
        model_id: &str,
        image: &[u8],
        content_type: &str,
    ) -> Result<Vec<Prediction>, GatewayError> {
        let first = self
            .call(model_id, image, content_type, self.settings.timeout)
            .await;

        let outcome = match first {
            Err(err) if is_cold_start(&err) => {
                tracing::warn!(
                    model = model_id,
                    backoff_ms = self.settings.cold_start_backoff.as_millis() as u64,
                    "classifier.cold_start"
                );
                sleep(self.settings.cold_start_backoff).await;
                self.call(model_id, image, content_type, self.settings.retry_timeout)
                    .await
            }
            other => other,
        };

        match outcome {
            Ok(payload) => {
                let predictions = payload.into_predictions();
                tracing::debug!(
                    model = model_id,
                    count = predictions.len(),
                    top_label = predictions.first().map(|p| p.label.as_str()).unwrap_or("-"),
                    "classifier.predictions"
                );
                Ok(predictions)
            }
            Err(err) => {
                let mapped = self.map_error(err);
                tracing::warn!(model = model_id, error = %mapped, "classifier.failed");
                Err(mapped)
            }
        }
    }
}
