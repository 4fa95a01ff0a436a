//! Async-domain pipeline controller.
//!
//! Owns the enhancement processor and the three stage-boundary queues,
//! consumes inbound messages, and emits processed frames and telemetry.
//! All processing here is synchronous per message; suspension happens only
//! at the channel boundaries in [`PipelineController::run`].

use crate::config::{PerformanceProfile, PipelineConfig};
use crate::defaults;
use crate::inference::InferenceSession;
use crate::messages::{
    AudioFrame, InboundMessage, OutboundMessage, ProcessedDebug, ProcessedFrame,
    SpectrogramSample,
};
use crate::processor::EnhancementProcessor;
use crate::queue::BoundedQueue;
use crate::stats::{ConstrainedStats, QueueHealth, StatsSnapshot, TickWindow};
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Lifecycle of one controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No engine attached; audio passes through untouched.
    Uninitialized,
    /// Init request being applied.
    Initializing,
    /// Engine attached, waiting for audio.
    Ready,
    /// Actively enhancing frames.
    Streaming,
    /// End-of-stream received, flushing the backlog.
    Draining,
    /// Terminal marker emitted; new audio is refused until a reset.
    Ended,
}

/// xorshift64* generator for the probabilistic spectrogram sampling.
/// Deterministic seeding keeps tests reproducible; no crypto use.
#[derive(Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_f64(&mut self) -> f64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        let x = self.state.wrapping_mul(0x2545_F491_4F6C_DD1D);
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Message-driven pipeline controller.
///
/// Generic over the two inference session types so tests run with mocks,
/// and over the clock so the adaptive throughput loop is testable with
/// mock time.
pub struct PipelineController<M, P, C: Clock = SystemClock> {
    processor: EnhancementProcessor<M, P>,
    config: PipelineConfig,
    profile: PerformanceProfile,
    state: PipelineState,
    epoch: u64,
    input_queue: BoundedQueue<AudioFrame>,
    output_queue: BoundedQueue<ProcessedFrame>,
    in_flight: BoundedQueue<()>,
    processed_frames: u64,
    frames_since_check: u64,
    interval_start: Instant,
    last_stats_emit: Instant,
    cycle_window: TickWindow,
    channel_count: Option<usize>,
    rng: XorShift64,
    clock: C,
}

impl<M: InferenceSession, P: InferenceSession> PipelineController<M, P, SystemClock> {
    pub fn new(config: PipelineConfig, processor: EnhancementProcessor<M, P>) -> Self {
        Self::with_clock(config, processor, SystemClock)
    }
}

impl<M: InferenceSession, P: InferenceSession, C: Clock> PipelineController<M, P, C> {
    pub fn with_clock(
        config: PipelineConfig,
        mut processor: EnhancementProcessor<M, P>,
        clock: C,
    ) -> Self {
        let profile = config.performance.clone();
        processor.set_frame_skip_interval(profile.frame_skip_interval);
        let state = if processor.is_initialized() {
            PipelineState::Ready
        } else {
            PipelineState::Uninitialized
        };
        let now = clock.now();
        Self {
            input_queue: BoundedQueue::new(config.queues.input_capacity),
            output_queue: BoundedQueue::new(config.queues.output_capacity),
            in_flight: BoundedQueue::new(config.queues.processing_capacity),
            processor,
            profile,
            config,
            state,
            epoch: 0,
            processed_frames: 0,
            frames_since_check: 0,
            interval_start: now,
            last_stats_emit: now,
            cycle_window: TickWindow::new(),
            channel_count: None,
            rng: XorShift64::new(0x9E37_79B9_7F4A_7C15),
            clock,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn frame_skip_interval(&self) -> u32 {
        self.profile.frame_skip_interval
    }

    /// Handles one inbound message and returns the outbound messages it
    /// produced, in emission order.
    pub fn handle(&mut self, message: InboundMessage) -> Vec<OutboundMessage> {
        match message {
            InboundMessage::Init(request) => self.handle_init(request.performance),
            InboundMessage::Audio(frame) => self.handle_audio(frame),
            InboundMessage::EndOfStream => self.handle_end_of_stream(),
            InboundMessage::ResetMetrics => self.handle_reset(),
        }
    }

    fn handle_init(&mut self, performance: Option<PerformanceProfile>) -> Vec<OutboundMessage> {
        self.state = PipelineState::Initializing;
        if let Some(profile) = performance {
            self.profile = profile;
        }
        self.processor
            .set_frame_skip_interval(self.profile.frame_skip_interval);

        let initialized = self.processor.is_initialized();
        self.state = if initialized {
            PipelineState::Ready
        } else {
            PipelineState::Uninitialized
        };
        self.interval_start = self.clock.now();

        vec![OutboundMessage::Ready {
            initialized,
            sample_rate: self.config.models.sample_rate,
        }]
    }

    fn handle_audio(&mut self, frame: AudioFrame) -> Vec<OutboundMessage> {
        if matches!(self.state, PipelineState::Draining | PipelineState::Ended) {
            return Vec::new();
        }
        if !self.accept_frame(&frame) {
            return Vec::new();
        }
        if self.state == PipelineState::Ready {
            self.state = PipelineState::Streaming;
        }

        self.input_queue.push(frame);

        let mut messages = Vec::new();
        self.drain_batch(self.profile.batch_size(), &mut messages);
        self.flush_output(&mut messages);
        self.maybe_adapt_frame_skip();
        self.maybe_emit_stats(&mut messages);
        messages
    }

    /// Frame admission: well-formed, and the channel count never changes
    /// mid-stream.
    fn accept_frame(&mut self, frame: &AudioFrame) -> bool {
        if frame.validate().is_err() {
            return false;
        }
        match self.channel_count {
            Some(count) => frame.channel_count() == count,
            None => {
                self.channel_count = Some(frame.channel_count());
                true
            }
        }
    }

    fn drain_batch(&mut self, batch: usize, messages: &mut Vec<OutboundMessage>) {
        for _ in 0..batch {
            let Ok(frame) = self.input_queue.pop() else {
                break;
            };
            self.in_flight.push(());
            let processed = self.process_frame(frame);
            let _ = self.in_flight.pop();
            self.output_queue.push(processed);

            if self.rng.next_f64() < self.profile.spectrogram_rate
                && let Some((raw, processed)) = self.processor.spectral_sample()
            {
                messages.push(OutboundMessage::Spectrogram(SpectrogramSample {
                    raw_magnitude: raw,
                    processed_magnitude: processed,
                    timestamp: Instant::now(),
                }));
            }
        }
    }

    fn flush_output(&mut self, messages: &mut Vec<OutboundMessage>) {
        while let Ok(frame) = self.output_queue.pop() {
            messages.push(OutboundMessage::Processed(frame));
        }
    }

    fn process_frame(&mut self, frame: AudioFrame) -> ProcessedFrame {
        let started = Instant::now();
        let channels: Vec<Vec<f32>> = frame
            .channels
            .iter()
            .map(|channel| self.processor.process_chunk(channel))
            .collect();
        let controller_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.processed_frames += 1;
        self.frames_since_check += 1;
        self.cycle_window.push(controller_ms);

        let timings = self.processor.timings();
        ProcessedFrame {
            channels,
            epoch: self.epoch,
            is_end_of_stream: false,
            debug: ProcessedDebug {
                initialized: self.processor.is_initialized(),
                controller_ms,
                mask_ms: timings.mask_ms,
                postfilter_ms: timings.postfilter_ms,
                input_queue_len: self.input_queue.len(),
                output_queue_len: self.output_queue.len(),
                evictions: self.total_evictions(),
                health: self.queue_health(),
                error_recovery: self.processor.last_error_recovery(),
                original: Some(frame.debug),
            },
        }
    }

    fn total_evictions(&self) -> u64 {
        self.input_queue.evicted() + self.output_queue.evicted() + self.in_flight.evicted()
    }

    fn queue_health(&self) -> QueueHealth {
        QueueHealth::compute(
            (self.input_queue.len(), self.input_queue.capacity()),
            (self.output_queue.len(), self.output_queue.capacity()),
            (self.in_flight.len(), self.in_flight.capacity()),
            self.total_evictions(),
        )
    }

    /// Adjusts the frame-skip interval from measured throughput, every
    /// [`defaults::ADAPTIVE_CHECK_FRAMES`] processed frames. Constrained
    /// profiles only.
    fn maybe_adapt_frame_skip(&mut self) {
        if !self.profile.constrained || self.frames_since_check < defaults::ADAPTIVE_CHECK_FRAMES {
            return;
        }

        let elapsed = self
            .clock
            .now()
            .duration_since(self.interval_start)
            .as_secs_f64();
        if elapsed > 0.0 {
            let fps = self.frames_since_check as f64 / elapsed;
            let interval = self.profile.frame_skip_interval;
            let adjusted = if fps < defaults::LOW_FPS_THRESHOLD {
                (interval + 1).min(defaults::MAX_FRAME_SKIP)
            } else if fps > defaults::HIGH_FPS_THRESHOLD {
                interval.saturating_sub(1).max(defaults::MIN_FRAME_SKIP)
            } else {
                interval
            };
            if adjusted != interval {
                self.profile.frame_skip_interval = adjusted;
                self.processor.set_frame_skip_interval(adjusted);
            }
        }

        self.frames_since_check = 0;
        self.interval_start = self.clock.now();
    }

    fn maybe_emit_stats(&mut self, messages: &mut Vec<OutboundMessage>) {
        let now = self.clock.now();
        if now.duration_since(self.last_stats_emit)
            < Duration::from_millis(defaults::SNAPSHOT_INTERVAL_MS)
        {
            return;
        }
        self.last_stats_emit = now;

        let timings = self.processor.timings();
        let constrained = self.profile.constrained.then(|| ConstrainedStats {
            frame_skip_interval: self.profile.frame_skip_interval,
            spectrogram_rate: self.profile.spectrogram_rate,
            processed_frames: self.processed_frames,
        });
        messages.push(OutboundMessage::Stats(StatsSnapshot {
            initialized: self.processor.is_initialized(),
            tick_ms_avg: self.cycle_window.average(),
            tick_ms_max: self.cycle_window.max(),
            controller_ms: timings.cycle_ms,
            mask_ms: timings.mask_ms,
            postfilter_ms: timings.postfilter_ms,
            queue_len: self.output_queue.len(),
            evictions: self.total_evictions(),
            inference_errors: self.processor.error_count(),
            health: self.queue_health(),
            constrained,
        }));
    }

    /// End of stream is synchronous: the whole backlog is processed before
    /// the terminal marker goes out, so no enhanced audio is lost.
    fn handle_end_of_stream(&mut self) -> Vec<OutboundMessage> {
        if self.state == PipelineState::Ended {
            return Vec::new();
        }
        self.state = PipelineState::Draining;

        let mut messages = Vec::new();
        while let Ok(frame) = self.input_queue.pop() {
            let processed = self.process_frame(frame);
            self.output_queue.push(processed);
        }
        self.flush_output(&mut messages);

        let timings = self.processor.timings();
        messages.push(OutboundMessage::Processed(ProcessedFrame {
            channels: Vec::new(),
            epoch: self.epoch,
            is_end_of_stream: true,
            debug: ProcessedDebug {
                initialized: self.processor.is_initialized(),
                controller_ms: 0.0,
                mask_ms: timings.mask_ms,
                postfilter_ms: timings.postfilter_ms,
                input_queue_len: 0,
                output_queue_len: 0,
                evictions: self.total_evictions(),
                health: self.queue_health(),
                error_recovery: false,
                original: None,
            },
        }));

        self.state = PipelineState::Ended;
        messages
    }

    /// Starts a new reset generation: queues, counters, recurrent state
    /// and caches are cleared; the loaded engine survives. Results from
    /// the previous generation still in flight carry the old epoch and
    /// are discarded downstream.
    fn handle_reset(&mut self) -> Vec<OutboundMessage> {
        self.epoch += 1;
        self.input_queue.clear();
        self.input_queue.reset_evictions();
        self.output_queue.clear();
        self.output_queue.reset_evictions();
        self.in_flight.clear();
        self.in_flight.reset_evictions();
        self.processed_frames = 0;
        self.frames_since_check = 0;
        self.cycle_window.clear();
        self.channel_count = None;
        self.processor.reset();
        self.processor
            .set_frame_skip_interval(self.profile.frame_skip_interval);
        let now = self.clock.now();
        self.interval_start = now;
        self.last_stats_emit = now;
        self.state = if self.processor.is_initialized() {
            PipelineState::Ready
        } else {
            PipelineState::Uninitialized
        };
        Vec::new()
    }
}

impl<M, P, C> PipelineController<M, P, C>
where
    M: InferenceSession + Send + 'static,
    P: InferenceSession + Send + 'static,
    C: Clock + 'static,
{
    /// Drives the controller from an inbound channel until it closes.
    ///
    /// Processed frames go to the real-time side over a non-blocking
    /// channel; everything else is awaited onto the events channel.
    pub async fn run(
        mut self,
        mut inbound: tokio::sync::mpsc::Receiver<InboundMessage>,
        frames: crossbeam_channel::Sender<ProcessedFrame>,
        events: tokio::sync::mpsc::Sender<OutboundMessage>,
    ) {
        while let Some(message) = inbound.recv().await {
            for outbound in self.handle(message) {
                match outbound {
                    OutboundMessage::Processed(frame) => {
                        if frames.send(frame).is_err() {
                            return;
                        }
                    }
                    other => {
                        if events.send(other).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}
