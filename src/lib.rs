//! dtln-stream - Real-time streaming speech-noise suppression
//!
//! Two-stage DTLN enhancement (spectral mask + time-domain post-filter)
//! behind a hard-deadline producer / async controller split.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod config;
pub mod controller;
pub mod defaults;
pub mod dsp;
pub mod error;
pub mod inference;
pub mod messages;
pub mod pipeline;
pub mod processor;
pub mod queue;
pub mod realtime;
pub mod stats;

// Core seam (models are pluggable behind this trait)
pub use inference::{DualStageInferenceEngine, InferenceSession, SessionOutput};
#[cfg(feature = "onnx")]
pub use inference::{OnnxEngine, load_engine};

// Pipeline
pub use controller::{PipelineController, PipelineState};
pub use pipeline::{PipelineLaunch, launch};
pub use processor::EnhancementProcessor;
pub use realtime::RealtimeProducer;

// Error handling
pub use error::{DenoiseError, Result};

// Config
pub use config::{PerformanceProfile, PipelineConfig};

// Building blocks
pub use messages::{AudioFrame, InboundMessage, OutboundMessage, ProcessedFrame};
pub use queue::BoundedQueue;
pub use stats::{QueueHealth, StatsSnapshot};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
