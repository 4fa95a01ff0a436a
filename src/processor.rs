//! Per-hop enhancement cycle: sliding window, spectral transform, two-stage
//! inference, overlap-add reconstruction.
//!
//! `process_chunk` never fails. Until an engine is attached the input is
//! echoed untouched, and a failed inference step falls back to the raw
//! analysis block for that hop, so the stream keeps flowing through model
//! load and transient runtime errors.

use crate::defaults::BLOCK_LEN;
use crate::dsp::{FrameAccumulator, SpectralEngine, SpectralFrame};
use crate::error::{DenoiseError, Result};
use crate::inference::{DualStageInferenceEngine, InferenceSession};
use std::time::Instant;

/// Durations of the most recent full processing cycle, milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleTimings {
    pub mask_ms: f64,
    pub postfilter_ms: f64,
    pub cycle_ms: f64,
}

/// Stateful single-channel enhancement processor.
///
/// Holds the sliding windows and the recurrent model state, so one
/// instance serves exactly one audio stream.
pub struct EnhancementProcessor<M, P> {
    accumulator: FrameAccumulator,
    spectral: SpectralEngine,
    engine: Option<DualStageInferenceEngine<M, P>>,
    frame_skip_interval: u32,
    skip_count: u32,
    cached_output: Option<Vec<f32>>,
    timings: CycleTimings,
    error_count: u64,
    last_error_recovery: bool,
    last_raw_block: [f32; BLOCK_LEN],
    last_processed_block: [f32; BLOCK_LEN],
    has_processed: bool,
}

impl<M: InferenceSession, P: InferenceSession> EnhancementProcessor<M, P> {
    pub fn new() -> Self {
        Self {
            accumulator: FrameAccumulator::new(),
            spectral: SpectralEngine::new(),
            engine: None,
            frame_skip_interval: 1,
            skip_count: 0,
            cached_output: None,
            timings: CycleTimings::default(),
            error_count: 0,
            last_error_recovery: false,
            last_raw_block: [0.0; BLOCK_LEN],
            last_processed_block: [0.0; BLOCK_LEN],
            has_processed: false,
        }
    }

    pub fn with_engine(engine: DualStageInferenceEngine<M, P>) -> Self {
        let mut processor = Self::new();
        processor.engine = Some(engine);
        processor
    }

    /// Attaches a loaded engine; subsequent chunks are enhanced instead of
    /// passed through.
    pub fn set_engine(&mut self, engine: DualStageInferenceEngine<M, P>) {
        self.engine = Some(engine);
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Sets how many hops share one inference result. `1` processes every
    /// hop.
    pub fn set_frame_skip_interval(&mut self, interval: u32) {
        self.frame_skip_interval = interval.max(1);
    }

    pub fn frame_skip_interval(&self) -> u32 {
        self.frame_skip_interval
    }

    pub fn timings(&self) -> CycleTimings {
        self.timings
    }

    /// Inference failures recovered by echoing the raw block.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// True when the most recent cycle fell back to the raw block.
    pub fn last_error_recovery(&self) -> bool {
        self.last_error_recovery
    }

    /// Processes one hop of audio and returns a chunk of the same length.
    pub fn process_chunk(&mut self, chunk: &[f32]) -> Vec<f32> {
        if chunk.is_empty() {
            return Vec::new();
        }

        // Pass-through until the models are attached. The sliding windows
        // stay untouched so enhancement starts from clean state.
        if self.engine.is_none() {
            return chunk.to_vec();
        }

        // Skipped hops replay the previous output instead of running the
        // models. The raw chunk stands in while no output exists yet.
        if self.frame_skip_interval > 1 {
            self.skip_count += 1;
            if self.skip_count < self.frame_skip_interval {
                return match &self.cached_output {
                    Some(cached) if cached.len() == chunk.len() => cached.clone(),
                    _ => chunk.to_vec(),
                };
            }
            self.skip_count = 0;
        }

        let started = Instant::now();
        let block = self.accumulator.push_input(chunk);
        self.last_raw_block = block;

        let frame = self.spectral.analyze(&block);
        let processed = match self.enhance(&frame) {
            Ok(enhanced) => {
                self.last_error_recovery = false;
                enhanced
            }
            Err(_) => {
                // Echo the raw analysis block for this hop and keep going.
                self.error_count += 1;
                self.last_error_recovery = true;
                block
            }
        };

        self.last_processed_block = processed;
        self.has_processed = true;
        self.accumulator.accumulate_output(&processed);
        let output = self.accumulator.extract_output(chunk.len());

        self.timings.cycle_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.cached_output = Some(output.clone());
        output
    }

    fn enhance(&mut self, frame: &SpectralFrame) -> Result<[f32; BLOCK_LEN]> {
        let engine = self
            .engine
            .as_mut()
            .ok_or(DenoiseError::NotInitialized)?;

        let (mask, mask_ms) = engine.infer_mask(&frame.magnitude)?;
        self.timings.mask_ms = mask_ms;

        let masked = self.spectral.synthesize(frame, &mask);
        let (filtered, postfilter_ms) = engine.infer_postfilter(&masked)?;
        self.timings.postfilter_ms = postfilter_ms;

        if filtered.len() != BLOCK_LEN {
            return Err(DenoiseError::InferenceFailed {
                message: format!(
                    "post-filter returned {} samples, expected {}",
                    filtered.len(),
                    BLOCK_LEN
                ),
            });
        }

        let mut block = [0.0f32; BLOCK_LEN];
        block.copy_from_slice(&filtered);
        Ok(block)
    }

    /// Magnitude spectra of the last raw and processed blocks, for
    /// visualization. `None` until the first full cycle has run.
    pub fn spectral_sample(&mut self) -> Option<(Vec<f32>, Vec<f32>)> {
        if !self.has_processed {
            return None;
        }
        let raw = self.spectral.analyze(&self.last_raw_block);
        let processed = self.spectral.analyze(&self.last_processed_block);
        Some((raw.magnitude.to_vec(), processed.magnitude.to_vec()))
    }

    /// Clears windows, recurrent state, caches, and counters. The engine
    /// itself stays loaded.
    pub fn reset(&mut self) {
        self.accumulator.reset();
        if let Some(engine) = self.engine.as_mut() {
            engine.reset_states();
        }
        self.skip_count = 0;
        self.cached_output = None;
        self.timings = CycleTimings::default();
        self.error_count = 0;
        self.last_error_recovery = false;
        self.last_raw_block = [0.0; BLOCK_LEN];
        self.last_processed_block = [0.0; BLOCK_LEN];
        self.has_processed = false;
    }
}

impl<M: InferenceSession, P: InferenceSession> Default for EnhancementProcessor<M, P> {
    fn default() -> Self {
        Self::new()
    }
}
