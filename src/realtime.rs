//! Hard-deadline producer side of the pipeline.
//!
//! `process_tick` runs on the audio callback cadence and must return within
//! the tick budget, so it only ever uses non-blocking channel operations
//! and bounded queues. All model work happens on the async side; this side
//! forwards raw quanta, drains finished frames, and picks what to play.

use crate::config::PerformanceProfile;
use crate::defaults::{self, ACTIVITY_THRESHOLD};
use crate::error::{DenoiseError, Result};
use crate::messages::{AudioFrame, FrameDebug, InboundMessage, InitRequest, ProcessedDebug, ProcessedFrame};
use crate::queue::BoundedQueue;
use crate::stats::{ConstrainedStats, QueueHealth, StatsSnapshot, TickWindow};
use crossbeam_channel::{Receiver, Sender};
use std::time::{Duration, Instant};

/// Real-time endpoint of a running pipeline.
///
/// Owned by the audio callback context. Never blocks: a full outbound
/// channel drops the quantum, an empty processed queue falls back to
/// pass-through or silence.
pub struct RealtimeProducer {
    input_tx: Sender<InboundMessage>,
    processed_rx: Receiver<ProcessedFrame>,
    queue: BoundedQueue<ProcessedFrame>,
    profile: PerformanceProfile,
    epoch: u64,
    input_ended: bool,
    stream_complete: bool,
    processed_frames: u64,
    inference_errors: u64,
    tick_window: TickWindow,
    last_snapshot: Instant,
    last_debug: Option<ProcessedDebug>,
}

impl RealtimeProducer {
    pub fn new(
        input_tx: Sender<InboundMessage>,
        processed_rx: Receiver<ProcessedFrame>,
        queue_capacity: usize,
        profile: PerformanceProfile,
    ) -> Self {
        Self {
            input_tx,
            processed_rx,
            queue: BoundedQueue::new(queue_capacity),
            profile,
            epoch: 0,
            input_ended: false,
            stream_complete: false,
            processed_frames: 0,
            inference_errors: 0,
            tick_window: TickWindow::new(),
            last_snapshot: Instant::now(),
            last_debug: None,
        }
    }

    /// Requests engine initialization on the async side.
    pub fn initialize(&self, request: InitRequest) -> Result<()> {
        self.input_tx
            .send(InboundMessage::Init(request))
            .map_err(|_| DenoiseError::ChannelClosed {
                message: "controller inbound channel disconnected".into(),
            })
    }

    /// Runs one audio tick: drain finished frames, forward the raw
    /// quantum, fill the output buffers. Returns a telemetry snapshot at
    /// most once per second.
    pub fn process_tick(
        &mut self,
        input: &[&[f32]],
        output: &mut [&mut [f32]],
    ) -> Option<StatsSnapshot> {
        let tick_start = Instant::now();

        self.drain_processed();
        self.forward_input(input);
        self.fill_output(input, output);

        self.tick_window
            .push(tick_start.elapsed().as_secs_f64() * 1000.0);

        if self.last_snapshot.elapsed() >= Duration::from_millis(defaults::SNAPSHOT_INTERVAL_MS) {
            self.last_snapshot = Instant::now();
            return Some(self.snapshot());
        }
        None
    }

    /// Moves every finished frame from the channel into the playback
    /// queue, discarding frames stamped with an older reset generation.
    fn drain_processed(&mut self) {
        while let Ok(frame) = self.processed_rx.try_recv() {
            if frame.epoch != self.epoch {
                continue;
            }
            if frame.is_end_of_stream {
                self.stream_complete = true;
                continue;
            }
            if frame.debug.error_recovery {
                self.inference_errors += 1;
            }
            self.last_debug = Some(frame.debug.clone());
            self.queue.push(frame);
        }
    }

    fn forward_input(&mut self, input: &[&[f32]]) {
        if self.input_ended || input.is_empty() {
            return;
        }

        let mut peak = 0.0f32;
        for channel in input {
            for &sample in *channel {
                let level = sample.abs();
                if level > peak {
                    peak = level;
                }
            }
        }

        let frame = AudioFrame::new(
            input.iter().map(|ch| ch.to_vec()).collect(),
            FrameDebug {
                has_audio: peak > ACTIVITY_THRESHOLD,
                peak_level: peak,
            },
        );
        // Disconnect means the async side is gone; the tick still has to
        // meet its deadline, so the quantum is simply dropped.
        let _ = self.input_tx.send(InboundMessage::Audio(frame));
    }

    fn fill_output(&mut self, input: &[&[f32]], output: &mut [&mut [f32]]) {
        match self.queue.pop() {
            Ok(frame) => {
                self.processed_frames += 1;
                for (i, out) in output.iter_mut().enumerate() {
                    // A mono frame feeds every output channel.
                    let source = frame.channels.get(i).or_else(|| frame.channels.first());
                    copy_or_silence(source.map(Vec::as_slice), out);
                }
            }
            Err(_) if !self.input_ended => {
                // Nothing enhanced yet: play the raw input rather than
                // stuttering.
                for (i, out) in output.iter_mut().enumerate() {
                    let source = input.get(i).copied().or_else(|| input.first().copied());
                    copy_or_silence(source, out);
                }
            }
            Err(_) => {
                for out in output.iter_mut() {
                    out.fill(0.0);
                }
            }
        }
    }

    /// Builds a telemetry snapshot from the latest known state.
    pub fn snapshot(&self) -> StatsSnapshot {
        let (initialized, controller_ms, mask_ms, postfilter_ms, health) = match &self.last_debug {
            Some(debug) => (
                debug.initialized,
                debug.controller_ms,
                debug.mask_ms,
                debug.postfilter_ms,
                debug.health.clone(),
            ),
            None => (false, 0.0, 0.0, 0.0, QueueHealth::default()),
        };

        let constrained = self.profile.constrained.then(|| ConstrainedStats {
            frame_skip_interval: self.profile.frame_skip_interval,
            spectrogram_rate: self.profile.spectrogram_rate,
            processed_frames: self.processed_frames,
        });

        StatsSnapshot {
            initialized,
            tick_ms_avg: self.tick_window.average(),
            tick_ms_max: self.tick_window.max(),
            controller_ms,
            mask_ms,
            postfilter_ms,
            queue_len: self.queue.len(),
            evictions: self.queue.evicted(),
            inference_errors: self.inference_errors,
            health,
            constrained,
        }
    }

    /// Signals that no further input will arrive. Remaining frames still
    /// drain through `process_tick` until the terminal marker lands.
    pub fn end_stream(&mut self) {
        self.input_ended = true;
        let _ = self.input_tx.send(InboundMessage::EndOfStream);
    }

    /// True once the terminal end-of-stream frame has been observed.
    pub fn is_complete(&self) -> bool {
        self.stream_complete
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Discards all pending frames and counters and starts a new reset
    /// generation. Frames already in flight from the old generation are
    /// discarded as they arrive.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.queue.clear();
        self.queue.reset_evictions();
        self.tick_window.clear();
        self.processed_frames = 0;
        self.inference_errors = 0;
        self.input_ended = false;
        self.stream_complete = false;
        self.last_debug = None;
        let _ = self.input_tx.send(InboundMessage::ResetMetrics);
    }
}

fn copy_or_silence(source: Option<&[f32]>, out: &mut [f32]) {
    match source {
        Some(data) => {
            let take = data.len().min(out.len());
            out[..take].copy_from_slice(&data[..take]);
            out[take..].fill(0.0);
        }
        None => out.fill(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn debug_frame(epoch: u64, value: f32) -> ProcessedFrame {
        ProcessedFrame {
            channels: vec![vec![value; 4]],
            epoch,
            is_end_of_stream: false,
            debug: ProcessedDebug {
                initialized: true,
                controller_ms: 1.0,
                mask_ms: 0.5,
                postfilter_ms: 0.5,
                input_queue_len: 0,
                output_queue_len: 0,
                evictions: 0,
                health: QueueHealth::default(),
                error_recovery: false,
                original: None,
            },
        }
    }

    fn producer() -> (
        RealtimeProducer,
        Receiver<InboundMessage>,
        Sender<ProcessedFrame>,
    ) {
        let (input_tx, input_rx) = unbounded();
        let (processed_tx, processed_rx) = unbounded();
        let producer =
            RealtimeProducer::new(input_tx, processed_rx, 3, PerformanceProfile::default());
        (producer, input_rx, processed_tx)
    }

    #[test]
    fn tick_forwards_input_and_plays_processed() {
        let (mut producer, input_rx, processed_tx) = producer();
        processed_tx.send(debug_frame(0, 0.7)).unwrap();

        let input = [0.1f32, 0.2, 0.3, 0.4];
        let mut out = [0.0f32; 4];
        producer.process_tick(&[&input], &mut [&mut out]);

        assert_eq!(out, [0.7; 4]);
        let forwarded = input_rx.try_recv().unwrap().into_audio().unwrap();
        assert_eq!(forwarded.channels[0], input.to_vec());
        assert!(forwarded.debug.has_audio);
    }

    #[test]
    fn passthrough_while_queue_is_empty() {
        let (mut producer, _input_rx, _processed_tx) = producer();

        let input = [0.5f32; 4];
        let mut out = [0.0f32; 4];
        producer.process_tick(&[&input], &mut [&mut out]);
        assert_eq!(out, input);
    }

    #[test]
    fn silence_after_end_of_stream_with_empty_queue() {
        let (mut producer, _input_rx, _processed_tx) = producer();
        producer.end_stream();

        let input = [0.5f32; 4];
        let mut out = [0.9f32; 4];
        producer.process_tick(&[&input], &mut [&mut out]);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn mono_frame_feeds_both_output_channels() {
        let (mut producer, _input_rx, processed_tx) = producer();
        processed_tx.send(debug_frame(0, 0.3)).unwrap();

        let input = [0.0f32; 4];
        let mut left = [0.0f32; 4];
        let mut right = [0.0f32; 4];
        producer.process_tick(&[&input], &mut [&mut left, &mut right]);
        assert_eq!(left, [0.3; 4]);
        assert_eq!(right, [0.3; 4]);
    }

    #[test]
    fn burst_overflow_keeps_most_recent_frames() {
        let (mut producer, _input_rx, processed_tx) = producer();
        for i in 0..5 {
            processed_tx.send(debug_frame(0, i as f32)).unwrap();
        }

        let input = [0.0f32; 4];
        let mut out = [0.0f32; 4];
        producer.process_tick(&[&input], &mut [&mut out]);

        // Capacity 3: frames 0 and 1 were evicted, frame 2 played.
        assert_eq!(out, [2.0; 4]);
        assert_eq!(producer.queue_len(), 2);
        assert_eq!(producer.snapshot().evictions, 2);
    }

    #[test]
    fn stale_epoch_frames_are_discarded_after_reset() {
        let (mut producer, input_rx, processed_tx) = producer();
        producer.reset();
        assert_eq!(producer.epoch(), 1);
        assert!(matches!(
            input_rx.try_recv().unwrap(),
            InboundMessage::ResetMetrics
        ));

        // Frame from the old generation arrives late.
        processed_tx.send(debug_frame(0, 0.9)).unwrap();
        processed_tx.send(debug_frame(1, 0.4)).unwrap();

        let input = [0.0f32; 4];
        let mut out = [0.0f32; 4];
        producer.process_tick(&[&input], &mut [&mut out]);
        assert_eq!(out, [0.4; 4]);
        assert_eq!(producer.queue_len(), 0);
    }

    #[test]
    fn end_of_stream_marker_completes_the_stream() {
        let (mut producer, _input_rx, processed_tx) = producer();
        producer.end_stream();

        let mut terminal = debug_frame(0, 0.0);
        terminal.channels = vec![];
        terminal.is_end_of_stream = true;
        processed_tx.send(terminal).unwrap();

        let mut out = [0.0f32; 4];
        producer.process_tick(&[], &mut [&mut out]);
        assert!(producer.is_complete());
    }

    #[test]
    fn reset_clears_counters() {
        let (mut producer, _input_rx, processed_tx) = producer();
        for i in 0..5 {
            processed_tx.send(debug_frame(0, i as f32)).unwrap();
        }
        let mut out = [0.0f32; 4];
        producer.process_tick(&[], &mut [&mut out]);

        producer.reset();
        let snapshot = producer.snapshot();
        assert_eq!(snapshot.evictions, 0);
        assert_eq!(snapshot.queue_len, 0);
        assert_eq!(snapshot.tick_ms_avg, 0.0);
    }
}
