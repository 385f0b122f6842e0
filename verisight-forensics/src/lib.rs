//! Media forensics building blocks.
//!
//! - [`frame`]: pick and encode one representative still from a video
//! - [`classifier`]: call a hosted image classifier with cold-start handling
//! - [`labels`]: fold provider-specific labels into one fakeness probability
//! - [`media`]: the per-request media input
//!
//! Each piece is usable alone; `verisight-engine` composes them.

pub mod classifier;
pub mod frame;
pub mod labels;
pub mod media;

pub use classifier::{ClassificationGateway, ClassifierBackend, GatewayError, GatewaySettings, Prediction};
pub use frame::{FfmpegDecoder, FrameError, FrameExtractor, VideoDecoder};
pub use labels::{FakenessAssessment, assess, normalize};
pub use media::MediaInput;
