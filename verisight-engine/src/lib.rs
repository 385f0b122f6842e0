//! Request orchestration for VeriSight.
//!
//! [`MediaAnalyzer`] and [`ClaimVerifier`] are the two entry points the HTTP
//! surface calls. Both always return a caller-facing payload; failures are
//! folded in according to [`FailurePolicy`] or as an `ERROR` verdict.

pub mod claim;
pub mod media;
pub mod policy;

pub use claim::{ClaimError, ClaimVerdict, ClaimVerifier, Verdict, build_prompt, parse_verdict};
pub use media::{MediaAnalyzer, MediaReport, ModelChain};
pub use policy::{FailureOutcome, FailurePolicy, MediaFailure};
