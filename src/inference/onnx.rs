//! ONNX Runtime sessions for the two shipped model stages.
//!
//! Both stages are LSTM-based and export the same signature: a feature
//! tensor `[1, 1, N]` plus a recurrent state tensor, producing the enhanced
//! features and the next state. Tensor names vary between model exports, so
//! they are read from the session metadata rather than hardcoded.

use super::{DualStageInferenceEngine, InferenceSession, SessionOutput};
use crate::config::ModelConfig;
use crate::defaults::{BLOCK_LEN, NUM_BINS};
use crate::error::{DenoiseError, Result};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use std::path::Path;

/// Recurrent state layout of the shipped weights: two LSTM layers of 128
/// units, hidden and cell state each.
const STATE_SHAPE: [usize; 4] = [1, 2, 128, 2];
const STATE_LEN: usize = 2 * 128 * 2;

/// One ONNX Runtime model session.
pub struct OrtSession {
    session: Session,
    input_len: usize,
    feature_name: String,
    state_in_name: String,
    output_name: String,
    state_out_name: String,
}

impl OrtSession {
    /// Loads a model from disk.
    ///
    /// Inference runs on the controller task next to real-time audio, so
    /// the session is pinned to a single thread rather than letting the
    /// runtime spawn its own pool.
    pub fn from_file(path: &Path, input_len: usize) -> Result<Self> {
        if !path.exists() {
            return Err(DenoiseError::ModelNotFound {
                path: path.display().to_string(),
            });
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .with_inter_threads(1)?
            .commit_from_file(path)?;

        let take_name = |names: Vec<String>, idx: usize, what: &str| -> Result<String> {
            names
                .get(idx)
                .cloned()
                .ok_or_else(|| DenoiseError::InferenceFailed {
                    message: format!(
                        "{}: expected feature and state {}, found {}",
                        path.display(),
                        what,
                        names.len()
                    ),
                })
        };

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        Ok(Self {
            feature_name: take_name(input_names.clone(), 0, "inputs")?,
            state_in_name: take_name(input_names, 1, "inputs")?,
            output_name: take_name(output_names.clone(), 0, "outputs")?,
            state_out_name: take_name(output_names, 1, "outputs")?,
            session,
            input_len,
        })
    }
}

impl InferenceSession for OrtSession {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn state_len(&self) -> usize {
        STATE_LEN
    }

    fn run(&mut self, features: &[f32], state: &[f32]) -> Result<SessionOutput> {
        if features.len() != self.input_len {
            return Err(DenoiseError::InferenceFailed {
                message: format!(
                    "feature length {} does not match model input {}",
                    features.len(),
                    self.input_len
                ),
            });
        }

        let feature_tensor =
            Tensor::from_array(([1usize, 1, self.input_len], features.to_vec()))?;
        let state_tensor = Tensor::from_array((STATE_SHAPE, state.to_vec()))?;

        let outputs = self.session.run(ort::inputs![
            self.feature_name.as_str() => feature_tensor,
            self.state_in_name.as_str() => state_tensor,
        ])?;

        let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        let (_, next_state) = outputs[self.state_out_name.as_str()].try_extract_tensor::<f32>()?;

        Ok(SessionOutput {
            data: data.to_vec(),
            state: next_state.to_vec(),
        })
    }
}

/// Two-stage engine backed by ONNX Runtime.
pub type OnnxEngine = DualStageInferenceEngine<OrtSession, OrtSession>;

/// Loads both model stages and runs a warm-up pass so the first real
/// frame does not pay lazy-initialization cost.
pub fn load_engine(models: &ModelConfig) -> Result<OnnxEngine> {
    let mask = OrtSession::from_file(&models.mask_model, NUM_BINS)?;
    let postfilter = OrtSession::from_file(&models.postfilter_model, BLOCK_LEN)?;

    let mut engine = DualStageInferenceEngine::new(mask, postfilter);
    engine.warm_up()?;
    Ok(engine)
}
