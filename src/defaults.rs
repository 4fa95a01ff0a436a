//! Default constants shared across the pipeline.
//!
//! This module provides the fixed DTLN frame geometry and the tuning
//! constants used by the queueing, telemetry and adaptive-throughput layers,
//! so that configuration types and components agree on one set of values.

/// Length of one analysis block in samples.
///
/// The DTLN model is trained on unwindowed 512-sample frames; this value is
/// part of the model contract and must not be changed independently of the
/// weight files.
pub const BLOCK_LEN: usize = 512;

/// Hop between consecutive analysis blocks in samples (75% overlap).
pub const BLOCK_SHIFT: usize = 128;

/// Number of frequency bins produced by the forward transform.
pub const NUM_BINS: usize = BLOCK_LEN / 2 + 1;

/// Sample rate the model expects, in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Default capacity of the inbound raw-frame queue.
pub const INPUT_QUEUE_CAPACITY: usize = 50;

/// Default capacity of the outbound processed-frame queue.
pub const OUTPUT_QUEUE_CAPACITY: usize = 50;

/// Default capacity of the processing-in-flight accounting queue.
pub const PROCESSING_QUEUE_CAPACITY: usize = 30;

/// Frames drained per batch by the async controller.
pub const BATCH_SIZE: usize = 3;

/// Frames drained per batch on constrained devices.
pub const CONSTRAINED_BATCH_SIZE: usize = 2;

/// Initial frame-skip interval on constrained devices (process every Nth hop).
pub const CONSTRAINED_FRAME_SKIP: u32 = 2;

/// Upper bound for the adaptive frame-skip interval.
pub const MAX_FRAME_SKIP: u32 = 4;

/// Lower bound for the adaptive frame-skip interval (1 = process every hop).
pub const MIN_FRAME_SKIP: u32 = 1;

/// Number of processed frames between adaptive throughput checks.
pub const ADAPTIVE_CHECK_FRAMES: u64 = 100;

/// Throughput below which the frame-skip interval is increased, frames/sec.
pub const LOW_FPS_THRESHOLD: f64 = 20.0;

/// Throughput above which the frame-skip interval is decreased, frames/sec.
pub const HIGH_FPS_THRESHOLD: f64 = 40.0;

/// Probability of emitting a spectrogram sample per processed frame.
pub const SPECTROGRAM_RATE: f64 = 0.8;

/// Spectrogram sampling probability on constrained devices.
pub const CONSTRAINED_SPECTROGRAM_RATE: f64 = 0.3;

/// Cumulative eviction count above which queue health reports "warning".
pub const EVICTION_WARNING_THRESHOLD: u64 = 10;

/// Peak-amplitude threshold for the voice-activity heuristic.
pub const ACTIVITY_THRESHOLD: f32 = 1e-5;

/// Maximum number of per-tick processing durations kept for telemetry.
pub const TICK_WINDOW_LEN: usize = 200;

/// Minimum interval between health snapshots, in milliseconds.
pub const SNAPSHOT_INTERVAL_MS: u64 = 1_000;
