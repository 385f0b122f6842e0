//! How media pipeline failures are reported to callers.
//!
//! Every failure still produces a normal report; the policy decides which
//! integrity score and tampered flag accompany it.

use serde::{Deserialize, Serialize};

/// Why a media analysis did not produce an assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFailure {
    /// The video could not be decoded or its frame read.
    ExtractionFailed(String),
    /// Every classifier candidate failed; carries the last gateway error.
    GatewayFailed(String),
    /// Anything else: bad upload, deadline, internal fault.
    SystemFault(String),
}

impl MediaFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaFailure::ExtractionFailed(_) => "extraction_failed",
            MediaFailure::GatewayFailed(_) => "gateway_failed",
            MediaFailure::SystemFault(_) => "system_fault",
        }
    }

    /// Caller-facing report text.
    pub fn report(&self) -> String {
        match self {
            MediaFailure::ExtractionFailed(reason) | MediaFailure::GatewayFailed(reason) => {
                reason.clone()
            }
            MediaFailure::SystemFault(reason) => format!("System Error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureOutcome {
    pub integrity_score: u8,
    pub is_tampered: bool,
}

/// Reported values per failure kind.
///
/// The defaults assume tampering when the content could not be decoded or
/// classified, and make no claim on internal faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    pub extraction_failed: FailureOutcome,
    pub gateway_failed: FailureOutcome,
    pub system_fault: FailureOutcome,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            extraction_failed: FailureOutcome {
                integrity_score: 0,
                is_tampered: true,
            },
            gateway_failed: FailureOutcome {
                integrity_score: 0,
                is_tampered: true,
            },
            system_fault: FailureOutcome {
                integrity_score: 0,
                is_tampered: false,
            },
        }
    }
}

impl FailurePolicy {
    pub fn outcome(&self, failure: &MediaFailure) -> FailureOutcome {
        match failure {
            MediaFailure::ExtractionFailed(_) => self.extraction_failed,
            MediaFailure::GatewayFailed(_) => self.gateway_failed,
            MediaFailure::SystemFault(_) => self.system_fault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_historic_mapping() {
        let policy = FailurePolicy::default();
        assert!(policy.outcome(&MediaFailure::ExtractionFailed("x".into())).is_tampered);
        assert!(policy.outcome(&MediaFailure::GatewayFailed("x".into())).is_tampered);
        assert!(!policy.outcome(&MediaFailure::SystemFault("x".into())).is_tampered);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let policy: FailurePolicy = serde_json::from_str(
            r#"{"system_fault": {"integrity_score": 0, "is_tampered": true}}"#,
        )
        .unwrap();
        assert!(policy.system_fault.is_tampered);
        assert_eq!(policy.gateway_failed, FailurePolicy::default().gateway_failed);
    }

    #[test]
    fn system_fault_report_is_prefixed() {
        let failure = MediaFailure::SystemFault("boom".into());
        assert_eq!(failure.report(), "System Error: boom");
        assert_eq!(MediaFailure::GatewayFailed("API Error 500: x".into()).report(), "API Error 500: x");
    }
}
