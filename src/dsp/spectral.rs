//! Forward/inverse spectral transform for one analysis block.
//!
//! No analysis window is applied: the mask estimator is trained on raw
//! 512-sample frames, so windowing here would break the model contract.
//! Reconstruction multiplies the magnitude by the estimated mask, keeps the
//! original phase, and inverts through a real-valued iFFT (which supplies
//! the conjugate-symmetric upper half implicitly).

use crate::defaults::{BLOCK_LEN, NUM_BINS};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Magnitude and phase of one analysis block. Created and discarded within
/// a single processing cycle.
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    pub magnitude: [f32; NUM_BINS],
    pub phase: [f32; NUM_BINS],
}

impl SpectralFrame {
    fn silent() -> Self {
        Self {
            magnitude: [0.0; NUM_BINS],
            phase: [0.0; NUM_BINS],
        }
    }
}

/// FFT-backed analysis/synthesis engine.
///
/// Reuses internal scratch buffers; one instance serves one processing
/// context.
pub struct SpectralEngine {
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    time_scratch: Vec<f32>,
    spectrum_scratch: Vec<Complex<f32>>,
}

impl SpectralEngine {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(BLOCK_LEN);
        let ifft = planner.plan_fft_inverse(BLOCK_LEN);
        Self {
            fft,
            ifft,
            time_scratch: vec![0.0; BLOCK_LEN],
            spectrum_scratch: vec![Complex::new(0.0, 0.0); NUM_BINS],
        }
    }

    /// Runs the forward transform and extracts per-bin magnitude and phase.
    pub fn analyze(&mut self, block: &[f32; BLOCK_LEN]) -> SpectralFrame {
        self.time_scratch.copy_from_slice(block);
        if self
            .fft
            .process(&mut self.time_scratch, &mut self.spectrum_scratch)
            .is_err()
        {
            return SpectralFrame::silent();
        }

        let mut frame = SpectralFrame::silent();
        for (i, bin) in self.spectrum_scratch.iter().enumerate() {
            frame.magnitude[i] = (bin.re * bin.re + bin.im * bin.im).sqrt();
            frame.phase[i] = bin.im.atan2(bin.re);
        }
        frame
    }

    /// Applies the mask to the magnitude spectrum and inverts back to a
    /// time block.
    ///
    /// Mask values are expected in [0, 1] but are intentionally not
    /// clamped; the model contract owns that range. Bins past the end of a
    /// short mask are left at unit gain.
    pub fn synthesize(&mut self, frame: &SpectralFrame, mask: &[f32]) -> [f32; BLOCK_LEN] {
        for i in 0..NUM_BINS {
            let gain = mask.get(i).copied().unwrap_or(1.0);
            let masked = frame.magnitude[i] * gain;
            let (sin, cos) = frame.phase[i].sin_cos();
            self.spectrum_scratch[i] = Complex::new(masked * cos, masked * sin);
        }

        // DC and Nyquist bins of a real spectrum must have zero imaginary
        // part; atan2/sin round-off can leave a residue there.
        self.spectrum_scratch[0].im = 0.0;
        self.spectrum_scratch[NUM_BINS - 1].im = 0.0;

        let mut output = [0.0f32; BLOCK_LEN];
        if self
            .ifft
            .process(&mut self.spectrum_scratch, &mut self.time_scratch)
            .is_err()
        {
            return output;
        }

        let scale = 1.0 / BLOCK_LEN as f32;
        for (out, &sample) in output.iter_mut().zip(self.time_scratch.iter()) {
            *out = sample * scale;
        }
        output
    }
}

impl Default for SpectralEngine {
    fn default() -> Self {
        Self::new()
    }
}
