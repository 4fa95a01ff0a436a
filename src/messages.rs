//! Message types that cross the pipeline's domain boundaries.
//!
//! Control and data travel the same channels, tagged by message kind, so
//! every kind lives in one closed enum and dispatch is an exhaustive match.
//! Frames transfer ownership across the boundary: once sent, the sender
//! never touches the payload again.

use crate::config::PerformanceProfile;
use crate::error::{DenoiseError, Result};
use crate::stats::{QueueHealth, StatsSnapshot};
use serde::Serialize;
use std::time::Instant;

/// Lightweight annotations attached to a raw frame at capture time.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameDebug {
    /// True when any sample exceeded the voice-activity threshold.
    pub has_audio: bool,
    /// Peak absolute amplitude across all channels.
    pub peak_level: f32,
}

/// One quantum of raw audio captured on the hard-deadline tick.
///
/// Immutable after creation; ownership moves to the async domain.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// One sample array per channel.
    pub channels: Vec<Vec<f32>>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
    pub debug: FrameDebug,
}

impl AudioFrame {
    pub fn new(channels: Vec<Vec<f32>>, debug: FrameDebug) -> Self {
        Self {
            channels,
            timestamp: Instant::now(),
            debug,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// A frame is well formed when it has at least one channel and every
    /// channel carries the same number of samples.
    pub fn is_well_formed(&self) -> bool {
        match self.channels.first() {
            None => false,
            Some(first) => self.channels.iter().all(|ch| ch.len() == first.len()),
        }
    }

    /// Boundary check with a descriptive error for rejected frames.
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.channels.first() else {
            return Err(DenoiseError::MalformedFrame {
                message: "frame has no channels".into(),
            });
        };
        for (i, channel) in self.channels.iter().enumerate() {
            if channel.len() != first.len() {
                return Err(DenoiseError::MalformedFrame {
                    message: format!(
                        "channel {} has {} samples, channel 0 has {}",
                        i,
                        channel.len(),
                        first.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Debug block attached to every processed frame.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDebug {
    /// Whether the inference engine was initialized when this frame was
    /// produced (false means pass-through).
    pub initialized: bool,
    /// Async-stage processing duration for this frame, milliseconds.
    pub controller_ms: f64,
    /// Stage-1 (mask estimator) inference duration, milliseconds.
    pub mask_ms: f64,
    /// Stage-2 (post-filter) inference duration, milliseconds.
    pub postfilter_ms: f64,
    pub input_queue_len: usize,
    pub output_queue_len: usize,
    /// Cumulative evictions across the controller's queues.
    pub evictions: u64,
    pub health: QueueHealth,
    /// True when this frame is an echo of its input after a recovered
    /// inference failure.
    pub error_recovery: bool,
    /// Capture-time annotations round-tripped from the original frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<FrameDebug>,
}

/// One quantum of enhanced audio, or the terminal end-of-stream marker
/// (empty channels).
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub channels: Vec<Vec<f32>>,
    /// Reset generation this frame belongs to; consumers discard frames
    /// from an older epoch.
    pub epoch: u64,
    pub is_end_of_stream: bool,
    pub debug: ProcessedDebug,
}

/// Paired raw/processed magnitude spectra for visualization. Best-effort:
/// may be dropped under load without affecting correctness.
#[derive(Debug, Clone)]
pub struct SpectrogramSample {
    pub raw_magnitude: Vec<f32>,
    pub processed_magnitude: Vec<f32>,
    pub timestamp: Instant,
}

/// Initialization request from the host.
#[derive(Debug, Clone, Default)]
pub struct InitRequest {
    /// Optional performance-profile override applied before streaming.
    pub performance: Option<PerformanceProfile>,
}

/// Messages flowing host/producer → controller.
#[derive(Debug)]
pub enum InboundMessage {
    Init(InitRequest),
    Audio(AudioFrame),
    EndOfStream,
    ResetMetrics,
}

impl InboundMessage {
    pub fn is_audio(&self) -> bool {
        matches!(self, InboundMessage::Audio(_))
    }

    pub fn into_audio(self) -> Option<AudioFrame> {
        match self {
            InboundMessage::Audio(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Messages flowing controller → host.
#[derive(Debug)]
pub enum OutboundMessage {
    /// Readiness response to an init request.
    Ready { initialized: bool, sample_rate: u32 },
    Processed(ProcessedFrame),
    Spectrogram(SpectrogramSample),
    Stats(StatsSnapshot),
}

impl OutboundMessage {
    pub fn is_processed(&self) -> bool {
        matches!(self, OutboundMessage::Processed(_))
    }

    pub fn into_processed(self) -> Option<ProcessedFrame> {
        match self {
            OutboundMessage::Processed(frame) => Some(frame),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug() -> FrameDebug {
        FrameDebug {
            has_audio: false,
            peak_level: 0.0,
        }
    }

    #[test]
    fn well_formed_requires_equal_channel_lengths() {
        let good = AudioFrame::new(vec![vec![0.0; 128], vec![0.0; 128]], debug());
        assert!(good.is_well_formed());
        assert_eq!(good.channel_count(), 2);

        let ragged = AudioFrame::new(vec![vec![0.0; 128], vec![0.0; 64]], debug());
        assert!(!ragged.is_well_formed());

        let empty = AudioFrame::new(vec![], debug());
        assert!(!empty.is_well_formed());
    }

    #[test]
    fn validate_names_the_offending_channel() {
        let ragged = AudioFrame::new(vec![vec![0.0; 128], vec![0.0; 64]], debug());
        let err = ragged.validate().unwrap_err();
        assert!(err.to_string().contains("channel 1"));

        let empty = AudioFrame::new(vec![], debug());
        assert!(empty.validate().is_err());

        let good = AudioFrame::new(vec![vec![0.0; 8]], debug());
        assert!(good.validate().is_ok());
    }

    #[test]
    fn inbound_message_helpers() {
        let frame = AudioFrame::new(vec![vec![0.0; 4]], debug());
        let msg = InboundMessage::Audio(frame);
        assert!(msg.is_audio());
        assert!(msg.into_audio().is_some());

        assert!(!InboundMessage::EndOfStream.is_audio());
        assert!(InboundMessage::ResetMetrics.into_audio().is_none());
    }

    #[test]
    fn processed_debug_serializes_without_original() {
        let dbg = ProcessedDebug {
            initialized: false,
            controller_ms: 0.0,
            mask_ms: 0.0,
            postfilter_ms: 0.0,
            input_queue_len: 0,
            output_queue_len: 0,
            evictions: 0,
            health: QueueHealth::default(),
            error_recovery: false,
            original: None,
        };
        let json = serde_json::to_value(&dbg).unwrap();
        assert!(json.get("original").is_none());
        assert_eq!(json["initialized"], false);
    }
}
