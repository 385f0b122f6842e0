//! Media analysis: upload → (frame) → classification → assessment → report.

use crate::policy::{FailurePolicy, MediaFailure};
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use verisight_forensics::{
    ClassifierBackend, FakenessAssessment, FrameExtractor, GatewayError, MediaInput, assess,
};

/// Caller-facing result of `/analyze-media`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaReport {
    pub integrity_score: u8,
    pub is_tampered: bool,
    pub report: String,
}

impl MediaReport {
    pub fn from_assessment(assessment: &FakenessAssessment) -> Self {
        Self {
            integrity_score: assessment.integrity,
            is_tampered: assessment.tampered,
            report: format!(
                "Analysis complete. Content is {}% likely to be authentic.",
                assessment.integrity
            ),
        }
    }

    pub fn from_failure(failure: &MediaFailure, policy: &FailurePolicy) -> Self {
        let outcome = policy.outcome(failure);
        Self {
            integrity_score: outcome.integrity_score,
            is_tampered: outcome.is_tampered,
            report: failure.report(),
        }
    }
}

/// Pipeline stage, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Extracting,
    Classifying,
    Normalizing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Extracting => "extracting",
            Stage::Classifying => "classifying",
            Stage::Normalizing => "normalizing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Ordered classifier model identifiers; later entries are fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    candidates: Vec<String>,
}

impl ModelChain {
    pub fn new(primary: impl Into<String>, fallbacks: Vec<String>, use_fallbacks: bool) -> Self {
        let mut candidates = vec![primary.into()];
        if use_fallbacks {
            for model in fallbacks {
                if !model.trim().is_empty() && !candidates.contains(&model) {
                    candidates.push(model);
                }
            }
        }
        Self { candidates }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

pub struct MediaAnalyzer {
    extractor: FrameExtractor,
    classifier: Arc<dyn ClassifierBackend>,
    models: ModelChain,
    policy: FailurePolicy,
    deadline: Duration,
}

impl MediaAnalyzer {
    pub fn new(
        extractor: FrameExtractor,
        classifier: Arc<dyn ClassifierBackend>,
        models: ModelChain,
        policy: FailurePolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            extractor,
            classifier,
            models,
            policy,
            deadline,
        }
    }

    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    /// Analyse one upload. Never fails: every failure is folded into the report.
    pub async fn analyze(&self, input: MediaInput) -> MediaReport {
        let digest = blake3::hash(input.bytes()).to_hex();
        info!(
            stage = %Stage::Received,
            digest = %&digest[..16],
            mime = input.mime(),
            bytes = input.bytes().len(),
            "media.analyze"
        );

        let guarded = AssertUnwindSafe(self.run(&input)).catch_unwind();
        let outcome = match tokio::time::timeout(self.deadline, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(_panic)) => Err(MediaFailure::SystemFault(
                "internal error while analysing media".into(),
            )),
            Err(_elapsed) => Err(MediaFailure::SystemFault(format!(
                "analysis exceeded the {}s deadline",
                self.deadline.as_secs()
            ))),
        };

        match outcome {
            Ok(assessment) => {
                info!(
                    stage = %Stage::Done,
                    digest = %&digest[..16],
                    fakeness = assessment.fakeness,
                    integrity = assessment.integrity,
                    tampered = assessment.tampered,
                    "media.analyze.done"
                );
                MediaReport::from_assessment(&assessment)
            }
            Err(failure) => {
                warn!(
                    digest = %&digest[..16],
                    failure = failure.kind(),
                    reason = %failure.report(),
                    "media.analyze.failed"
                );
                MediaReport::from_failure(&failure, &self.policy)
            }
        }
    }

    async fn run(&self, input: &MediaInput) -> Result<FakenessAssessment, MediaFailure> {
        let (image, content_type) = match input {
            MediaInput::Video { bytes, mime } => {
                info!(stage = %Stage::Extracting, "media.stage");
                let frame = self
                    .extractor
                    .extract_representative_frame(bytes, mime)
                    .await
                    .map_err(|e| MediaFailure::ExtractionFailed(e.to_string()))?;
                (frame, "image/jpeg")
            }
            MediaInput::Image { bytes, mime } => (bytes.clone(), mime.as_str()),
        };

        info!(stage = %Stage::Classifying, "media.stage");
        let predictions = self.classify_with_fallback(&image, content_type).await?;

        info!(stage = %Stage::Normalizing, count = predictions.len(), "media.stage");
        Ok(assess(&predictions))
    }

    async fn classify_with_fallback(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Vec<verisight_forensics::Prediction>, MediaFailure> {
        let mut last_error: Option<GatewayError> = None;
        for model in self.models.candidates() {
            match self.classifier.classify(model, image, content_type).await {
                Ok(predictions) => return Ok(predictions),
                Err(err) => {
                    warn!(model = %model, error = %err, "media.classifier_candidate_failed");
                    last_error = Some(err);
                }
            }
        }
        Err(MediaFailure::GatewayFailed(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no classifier model configured".into()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use verisight_forensics::{FrameError, Prediction, VideoDecoder};

    type Scripted = Result<Vec<Prediction>, GatewayError>;

    struct FakeClassifier {
        script: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<(String, String)>>,
        delay: Option<Duration>,
    }

    impl FakeClassifier {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        fn models_called(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl ClassifierBackend for FakeClassifier {
        async fn classify(
            &self,
            model_id: &str,
            _image: &[u8],
            content_type: &str,
        ) -> Result<Vec<Prediction>, GatewayError> {
            self.calls
                .lock()
                .unwrap()
                .push((model_id.to_string(), content_type.to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct StubDecoder {
        frames: u64,
    }

    #[async_trait]
    impl VideoDecoder for StubDecoder {
        async fn frame_count(&self, _path: &Path) -> Result<u64, FrameError> {
            Ok(self.frames)
        }

        async fn read_frame_jpeg(&self, _path: &Path, _index: u64) -> Result<Vec<u8>, FrameError> {
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    fn analyzer(classifier: Arc<FakeClassifier>, frames: u64, fallback: bool) -> MediaAnalyzer {
        MediaAnalyzer::new(
            FrameExtractor::new(Arc::new(StubDecoder { frames })),
            classifier,
            ModelChain::new("primary/model", vec!["fallback/model".into()], fallback),
            FailurePolicy::default(),
            Duration::from_secs(5),
        )
    }

    fn gateway_503() -> GatewayError {
        GatewayError::Status {
            status: 503,
            message: "Model is currently loading".into(),
        }
    }

    struct PanickingClassifier;

    #[async_trait]
    impl ClassifierBackend for PanickingClassifier {
        async fn classify(
            &self,
            _model_id: &str,
            _image: &[u8],
            _content_type: &str,
        ) -> Result<Vec<Prediction>, GatewayError> {
            panic!("classifier client bug")
        }
    }

    #[tokio::test]
    async fn panicking_classifier_is_a_system_fault() {
        let analyzer = MediaAnalyzer::new(
            FrameExtractor::new(Arc::new(StubDecoder { frames: 10 })),
            Arc::new(PanickingClassifier),
            ModelChain::new("primary/model", Vec::new(), false),
            FailurePolicy::default(),
            Duration::from_secs(5),
        );
        let report = analyzer
            .analyze(MediaInput::from_upload(vec![1, 2, 3], Some("image/png")))
            .await;

        assert_eq!(report.integrity_score, 0);
        assert!(!report.is_tampered);
        assert!(report.report.starts_with("System Error: "), "{}", report.report);
    }

    #[tokio::test]
    async fn image_success_reports_integrity() {
        let classifier = FakeClassifier::new(vec![Ok(vec![Prediction::new("fake", 0.8)])]);
        let report = analyzer(classifier.clone(), 10, true)
            .analyze(MediaInput::from_upload(vec![1, 2, 3], Some("image/png")))
            .await;

        assert_eq!(
            report,
            MediaReport {
                integrity_score: 20,
                is_tampered: true,
                report: "Analysis complete. Content is 20% likely to be authentic.".into(),
            }
        );
        assert_eq!(
            *classifier.calls.lock().unwrap(),
            vec![("primary/model".to_string(), "image/png".to_string())]
        );
    }

    #[tokio::test]
    async fn video_frames_are_sent_as_jpeg() {
        let classifier = FakeClassifier::new(vec![Ok(vec![Prediction::new("real", 0.9)])]);
        let report = analyzer(classifier.clone(), 10, true)
            .analyze(MediaInput::from_upload(vec![0; 16], Some("video/mp4")))
            .await;

        assert_eq!(report.integrity_score, 90);
        assert!(!report.is_tampered);
        assert_eq!(classifier.calls.lock().unwrap()[0].1, "image/jpeg");
    }

    #[tokio::test]
    async fn extraction_failure_is_reported_as_tampered() {
        let classifier = FakeClassifier::new(vec![]);
        let report = analyzer(classifier.clone(), 0, true)
            .analyze(MediaInput::from_upload(vec![0; 16], Some("video/mp4")))
            .await;

        assert_eq!(report.integrity_score, 0);
        assert!(report.is_tampered);
        assert!(report.report.contains("zero frames"), "{}", report.report);
        assert!(classifier.models_called().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_falls_back_to_next_model() {
        let classifier = FakeClassifier::new(vec![
            Err(gateway_503()),
            Ok(vec![Prediction::new("LABEL_0", 0.7)]),
        ]);
        let report = analyzer(classifier.clone(), 10, true)
            .analyze(MediaInput::from_upload(vec![1], Some("image/jpeg")))
            .await;

        assert_eq!(report.integrity_score, 70);
        assert_eq!(
            classifier.models_called(),
            vec!["primary/model".to_string(), "fallback/model".to_string()]
        );
    }

    #[tokio::test]
    async fn exhausted_models_report_last_gateway_error() {
        let classifier = FakeClassifier::new(vec![
            Err(gateway_503()),
            Err(GatewayError::Transport {
                message: "connection reset".into(),
            }),
        ]);
        let report = analyzer(classifier, 10, true)
            .analyze(MediaInput::from_upload(vec![1], Some("image/jpeg")))
            .await;

        assert_eq!(
            report,
            MediaReport {
                integrity_score: 0,
                is_tampered: true,
                report: "connection reset".into(),
            }
        );
    }

    #[tokio::test]
    async fn fallback_can_be_disabled() {
        let classifier = FakeClassifier::new(vec![Err(gateway_503())]);
        let report = analyzer(classifier.clone(), 10, false)
            .analyze(MediaInput::from_upload(vec![1], Some("image/jpeg")))
            .await;

        assert_eq!(report.report, "API Error 503: Model is currently loading");
        assert_eq!(classifier.models_called(), vec!["primary/model".to_string()]);
    }

    #[tokio::test]
    async fn deadline_is_a_system_fault() {
        let classifier = Arc::new(FakeClassifier {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: Some(Duration::from_millis(200)),
        });
        let analyzer = MediaAnalyzer::new(
            FrameExtractor::new(Arc::new(StubDecoder { frames: 1 })),
            classifier,
            ModelChain::new("primary/model", vec![], false),
            FailurePolicy::default(),
            Duration::from_millis(20),
        );

        let report = analyzer
            .analyze(MediaInput::from_upload(vec![1], Some("image/jpeg")))
            .await;
        assert_eq!(report.integrity_score, 0);
        assert!(!report.is_tampered);
        assert!(report.report.starts_with("System Error: "));
    }

    #[test]
    fn model_chain_dedups_and_skips_blank_fallbacks() {
        let chain = ModelChain::new("a", vec!["a".into(), " ".into(), "b".into()], true);
        assert_eq!(chain.candidates(), &["a".to_string(), "b".to_string()]);
    }
}
