//! Search-grounded claim verification.
//!
//! The claim is searched, the raw search blob is embedded into a prompt, and
//! the LLM answers in forced-JSON mode. Its output is untrusted: it is parsed,
//! then every field is normalized before it reaches the caller.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use verisight_common::truncate_chars;
use verisight_llm::{LlmClient, LlmError};
use verisight_search::{SearchContext, SearchError, SearchProvider};

const EXPLANATION_FALLBACK: &str = "Analysis complete.";
const EMPTY_CLAIM: &str = "No claim provided.";
const ERROR_DETAIL_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    True,
    False,
    Misleading,
    Unknown,
    /// Produced locally when verification could not run; never taken from the LLM.
    Error,
}

impl Verdict {
    /// Map model output onto the closed vocabulary.
    pub fn from_model(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "TRUE" => Verdict::True,
            "FALSE" => Verdict::False,
            "MISLEADING" => Verdict::Misleading,
            _ => Verdict::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimVerdict {
    pub verdict: Verdict,
    pub confidence: u8,
    pub explanation: String,
}

impl ClaimVerdict {
    pub fn error(explanation: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Error,
            confidence: 0,
            explanation: explanation.into(),
        }
    }

    fn api_error(detail: &str) -> Self {
        Self::error(format!(
            "API Error: {}",
            truncate_chars(detail, ERROR_DETAIL_CHARS)
        ))
    }
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("{0}")]
    Search(#[from] SearchError),
    #[error("{0}")]
    Llm(#[from] LlmError),
    #[error("{0}")]
    Parse(#[from] serde_json::Error),
    #[error("model output is not a JSON object: {0}")]
    Shape(String),
}

/// Prompt sent to the LLM for one claim.
pub fn build_prompt(claim: &str, context: &SearchContext) -> String {
    format!(
        r#"VERIFY THIS CLAIM: "{claim}"
CONTEXT: {context}

Return ONLY valid JSON:
{{
  "verdict": "TRUE" | "FALSE" | "MISLEADING",
  "confidence": 0-100,
  "explanation": "2-sentence summary of findings."
}}"#
    )
}

/// Parse and normalize raw model output.
pub fn parse_verdict(raw: &str) -> Result<ClaimVerdict, ClaimError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let Value::Object(fields) = value else {
        return Err(ClaimError::Shape(truncate_chars(raw.trim(), 80)));
    };

    let verdict = fields
        .get("verdict")
        .and_then(Value::as_str)
        .map(Verdict::from_model)
        .unwrap_or(Verdict::Unknown);

    let confidence = fields.get("confidence").map(coerce_confidence).unwrap_or(0);

    let explanation = match fields.get("explanation") {
        None | Some(Value::Null) => EXPLANATION_FALLBACK.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };

    Ok(ClaimVerdict {
        verdict,
        confidence,
        explanation,
    })
}

fn coerce_confidence(value: &Value) -> u8 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => n.trunc().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

pub struct ClaimVerifier {
    search: Arc<dyn SearchProvider>,
    llm: Arc<dyn LlmClient>,
    deadline: Duration,
}

impl ClaimVerifier {
    pub fn new(search: Arc<dyn SearchProvider>, llm: Arc<dyn LlmClient>, deadline: Duration) -> Self {
        Self {
            search,
            llm,
            deadline,
        }
    }

    /// Verify one claim. Never fails: faults come back as an ERROR verdict.
    pub async fn verify(&self, claim: &str) -> ClaimVerdict {
        let claim = claim.trim();
        if claim.is_empty() {
            debug!("claim.verify.empty");
            return ClaimVerdict::error(EMPTY_CLAIM);
        }

        info!(
            claim_chars = claim.chars().count(),
            model = self.llm.model_name(),
            "claim.verify.start"
        );

        let guarded = AssertUnwindSafe(self.run(claim)).catch_unwind();
        let verdict = match tokio::time::timeout(self.deadline, guarded).await {
            Ok(Ok(Ok(verdict))) => verdict,
            Ok(Ok(Err(err))) => {
                warn!(error = %err, "claim.verify.error");
                ClaimVerdict::api_error(&err.to_string())
            }
            Ok(Err(_panic)) => {
                warn!("claim.verify.panic");
                ClaimVerdict::api_error("internal error while verifying claim")
            }
            Err(_elapsed) => {
                warn!(deadline_secs = self.deadline.as_secs(), "claim.verify.timeout");
                ClaimVerdict::api_error(&format!(
                    "verification exceeded the {}s deadline",
                    self.deadline.as_secs()
                ))
            }
        };

        info!(
            verdict = ?verdict.verdict,
            confidence = verdict.confidence,
            "claim.verify.done"
        );
        verdict
    }

    async fn run(&self, claim: &str) -> Result<ClaimVerdict, ClaimError> {
        let context = self.search.search(claim).await?;
        let prompt = build_prompt(claim, &context);
        debug!(prompt_chars = prompt.len(), "claim.prompt");

        let response = self
            .llm
            .generate_json(&prompt, Some(self.llm.default_fact_check_system_prompt()))
            .await?;
        debug!(
            tokens = response.tokens_used.unwrap_or(0),
            "claim.llm.response"
        );
        parse_verdict(&response.text)
    }
}
