//! Spectral transform and block accumulation for the enhancement cycle.

pub mod accumulator;
pub mod spectral;

pub use accumulator::FrameAccumulator;
pub use spectral::{SpectralEngine, SpectralFrame};
