//! Two-stage inference engine with per-stream recurrent state.

use super::{InferenceSession, SessionOutput};
use crate::error::Result;
use std::time::Instant;

/// Owns both model sessions and their recurrent states.
///
/// The mask stage consumes a magnitude spectrum; the post-filter stage
/// consumes a time-domain block. Each stage's output state becomes the
/// input state of its next call, which is what carries temporal context
/// across hops. The two stages never share state.
pub struct DualStageInferenceEngine<M, P> {
    mask_session: M,
    postfilter_session: P,
    mask_state: Vec<f32>,
    postfilter_state: Vec<f32>,
}

impl<M: InferenceSession, P: InferenceSession> DualStageInferenceEngine<M, P> {
    pub fn new(mask_session: M, postfilter_session: P) -> Self {
        let mask_state = vec![0.0; mask_session.state_len()];
        let postfilter_state = vec![0.0; postfilter_session.state_len()];
        Self {
            mask_session,
            postfilter_session,
            mask_state,
            postfilter_state,
        }
    }

    /// Runs the stage-1 mask estimator on a magnitude spectrum.
    ///
    /// Returns the mask and the inference duration in milliseconds. On
    /// error the recurrent state is left untouched, so the next call
    /// continues from the last successful step.
    pub fn infer_mask(&mut self, magnitude: &[f32]) -> Result<(Vec<f32>, f64)> {
        let started = Instant::now();
        let SessionOutput { data, state } = self.mask_session.run(magnitude, &self.mask_state)?;
        self.mask_state = state;
        Ok((data, started.elapsed().as_secs_f64() * 1000.0))
    }

    /// Runs the stage-2 post-filter on a time-domain block.
    pub fn infer_postfilter(&mut self, block: &[f32]) -> Result<(Vec<f32>, f64)> {
        let started = Instant::now();
        let SessionOutput { data, state } =
            self.postfilter_session.run(block, &self.postfilter_state)?;
        self.postfilter_state = state;
        Ok((data, started.elapsed().as_secs_f64() * 1000.0))
    }

    /// Zeroes both recurrent states, as for the start of a new stream.
    pub fn reset_states(&mut self) {
        self.mask_state.fill(0.0);
        self.postfilter_state.fill(0.0);
    }

    /// Runs one throwaway step through both stages so first-call lazy
    /// allocations happen before real-time audio arrives, then resets.
    pub fn warm_up(&mut self) -> Result<()> {
        let silent_features = vec![0.0; self.mask_session.input_len()];
        self.infer_mask(&silent_features)?;

        let silent_block = vec![0.0; self.postfilter_session.input_len()];
        self.infer_postfilter(&silent_block)?;

        self.reset_states();
        Ok(())
    }

    pub fn mask_session(&self) -> &M {
        &self.mask_session
    }

    pub fn postfilter_session(&self) -> &P {
        &self.postfilter_session
    }
}
