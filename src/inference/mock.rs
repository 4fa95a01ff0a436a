//! Deterministic stand-in sessions for tests and benchmarks.

use super::{InferenceSession, SessionOutput};
use crate::error::{DenoiseError, Result};

/// What a [`MockSession`] returns for the data half of its output.
#[derive(Debug, Clone, Copy)]
pub enum MockOutput {
    /// Echo the input features unchanged.
    Echo,
    /// A constant value in every output slot.
    Constant(f32),
    /// Input features scaled by a fixed factor.
    Gain(f32),
    /// Every call fails.
    Fail,
}

/// Scripted inference session.
///
/// The returned state is `call_count` broadcast across the state vector,
/// so tests can assert that the caller threads state from call N into
/// call N+1. Received states are recorded in `seen_states`.
#[derive(Debug)]
pub struct MockSession {
    input_len: usize,
    state_len: usize,
    output: MockOutput,
    calls: u64,
    /// Every state vector this session was handed, in call order.
    pub seen_states: Vec<Vec<f32>>,
}

impl MockSession {
    pub fn new(input_len: usize, state_len: usize, output: MockOutput) -> Self {
        Self {
            input_len,
            state_len,
            output,
            calls: 0,
            seen_states: Vec::new(),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl InferenceSession for MockSession {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn state_len(&self) -> usize {
        self.state_len
    }

    fn run(&mut self, features: &[f32], state: &[f32]) -> Result<SessionOutput> {
        self.seen_states.push(state.to_vec());

        let data = match self.output {
            MockOutput::Echo => features.to_vec(),
            MockOutput::Constant(value) => vec![value; features.len()],
            MockOutput::Gain(factor) => features.iter().map(|&s| s * factor).collect(),
            MockOutput::Fail => {
                return Err(DenoiseError::InferenceFailed {
                    message: "scripted failure".into(),
                });
            }
        };

        self.calls += 1;
        Ok(SessionOutput {
            data,
            state: vec![self.calls as f32; self.state_len],
        })
    }
}
