//! Model inference: the session abstraction, the two-stage engine that
//! threads recurrent state between calls, and the ONNX Runtime backend.

pub mod engine;
pub mod mock;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use engine::DualStageInferenceEngine;
pub use mock::{MockOutput, MockSession};
#[cfg(feature = "onnx")]
pub use onnx::{OnnxEngine, OrtSession, load_engine};

use crate::error::Result;

/// Output of one inference call: the payload plus the recurrent state to
/// feed into the next call on the same session.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub data: Vec<f32>,
    pub state: Vec<f32>,
}

/// A stateful model session.
///
/// Implementations own their weights; the caller owns the recurrent state
/// and threads it through successive calls. This keeps state handling
/// testable without loading real models.
pub trait InferenceSession: Send {
    /// Expected feature vector length.
    fn input_len(&self) -> usize;

    /// Recurrent state vector length. A fresh stream starts from a
    /// zero-filled state of this size.
    fn state_len(&self) -> usize;

    /// Runs one inference step.
    fn run(&mut self, features: &[f32], state: &[f32]) -> Result<SessionOutput>;
}
