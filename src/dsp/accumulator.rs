//! Sliding input/output windows for hop-based overlap-add processing.
//!
//! The model consumes 512-sample analysis blocks advanced 128 samples at a
//! time (75% overlap). The input side maintains the sliding analysis window;
//! the output side overlap-adds enhanced blocks and yields the settled
//! leading region.

use crate::defaults::{BLOCK_LEN, BLOCK_SHIFT};

/// Per-channel sliding windows. One instance per processing context; state
/// carries across hops and is only cleared by an explicit reset.
#[derive(Debug)]
pub struct FrameAccumulator {
    input_history: [f32; BLOCK_LEN],
    output_history: [f32; BLOCK_LEN],
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self {
            input_history: [0.0; BLOCK_LEN],
            output_history: [0.0; BLOCK_LEN],
        }
    }

    /// Shifts the analysis window left by one hop and appends the chunk.
    ///
    /// Chunks shorter than the hop are zero-padded; samples past the hop
    /// are dropped. Returns a copy of the full window for analysis.
    pub fn push_input(&mut self, chunk: &[f32]) -> [f32; BLOCK_LEN] {
        let tail = BLOCK_LEN - BLOCK_SHIFT;
        self.input_history.copy_within(BLOCK_SHIFT.., 0);

        let take = chunk.len().min(BLOCK_SHIFT);
        self.input_history[tail..tail + take].copy_from_slice(&chunk[..take]);
        if take < BLOCK_SHIFT {
            self.input_history[tail + take..].fill(0.0);
        }
        self.input_history
    }

    /// Shifts the synthesis window left by one hop, zeroes the vacated
    /// tail, and overlap-adds the enhanced block.
    pub fn accumulate_output(&mut self, block: &[f32; BLOCK_LEN]) {
        self.output_history.copy_within(BLOCK_SHIFT.., 0);
        self.output_history[BLOCK_LEN - BLOCK_SHIFT..].fill(0.0);
        for (acc, &sample) in self.output_history.iter_mut().zip(block.iter()) {
            *acc += sample;
        }
    }

    /// Copies the first `len` samples of the synthesis window.
    ///
    /// Only the leading hop has received all of its overlapping
    /// contributions; requests longer than the window are zero-padded.
    pub fn extract_output(&self, len: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; len];
        let take = len.min(BLOCK_LEN);
        out[..take].copy_from_slice(&self.output_history[..take]);
        out
    }

    /// Clears both windows to silence.
    pub fn reset(&mut self) {
        self.input_history.fill(0.0);
        self.output_history.fill(0.0);
    }
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_window_slides_by_one_hop() {
        let mut acc = FrameAccumulator::new();

        let first: Vec<f32> = (0..BLOCK_SHIFT).map(|i| i as f32).collect();
        let window = acc.push_input(&first);
        assert!(window[..BLOCK_LEN - BLOCK_SHIFT].iter().all(|&s| s == 0.0));
        assert_eq!(&window[BLOCK_LEN - BLOCK_SHIFT..], first.as_slice());

        let second: Vec<f32> = (0..BLOCK_SHIFT).map(|i| 1000.0 + i as f32).collect();
        let window = acc.push_input(&second);
        // First chunk moved one hop left, second chunk fills the tail
        assert_eq!(
            &window[BLOCK_LEN - 2 * BLOCK_SHIFT..BLOCK_LEN - BLOCK_SHIFT],
            first.as_slice()
        );
        assert_eq!(&window[BLOCK_LEN - BLOCK_SHIFT..], second.as_slice());
    }

    #[test]
    fn short_chunk_is_zero_padded() {
        let mut acc = FrameAccumulator::new();
        let window = acc.push_input(&[1.0; 64]);

        let tail = BLOCK_LEN - BLOCK_SHIFT;
        assert!(window[tail..tail + 64].iter().all(|&s| s == 1.0));
        assert!(window[tail + 64..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn extract_output_always_returns_requested_length() {
        let acc = FrameAccumulator::new();
        assert_eq!(acc.extract_output(0).len(), 0);
        assert_eq!(acc.extract_output(64).len(), 64);
        assert_eq!(acc.extract_output(BLOCK_SHIFT).len(), BLOCK_SHIFT);
        assert_eq!(acc.extract_output(1000).len(), 1000);
    }

    #[test]
    fn overlap_add_reaches_steady_state_gain() {
        let mut acc = FrameAccumulator::new();
        let ones = [1.0f32; BLOCK_LEN];

        // After BLOCK_LEN / BLOCK_SHIFT accumulations every leading-hop
        // sample has received one contribution per overlapping block.
        let overlap = BLOCK_LEN / BLOCK_SHIFT;
        for _ in 0..overlap {
            acc.accumulate_output(&ones);
        }
        let out = acc.extract_output(BLOCK_SHIFT);
        for &sample in &out {
            assert!((sample - overlap as f32).abs() < 1e-6);
        }
    }

    #[test]
    fn extract_longer_than_hop_is_lossy() {
        let mut acc = FrameAccumulator::new();
        acc.accumulate_output(&[1.0; BLOCK_LEN]);

        // Samples past the first hop have not yet settled: they still
        // await later overlapping contributions.
        let out = acc.extract_output(BLOCK_LEN);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[BLOCK_LEN - 1] - 1.0).abs() < 1e-6);

        // And requests past the window are zero-padded.
        let long = acc.extract_output(BLOCK_LEN + 10);
        assert!(long[BLOCK_LEN..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn reset_clears_both_windows() {
        let mut acc = FrameAccumulator::new();
        acc.push_input(&[1.0; BLOCK_SHIFT]);
        acc.accumulate_output(&[1.0; BLOCK_LEN]);
        acc.reset();

        let window = acc.push_input(&[0.0; BLOCK_SHIFT]);
        assert!(window.iter().all(|&s| s == 0.0));
        assert!(acc.extract_output(BLOCK_SHIFT).iter().all(|&s| s == 0.0));
    }
}
