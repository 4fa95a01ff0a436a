//! Pipeline assembly: wires the real-time producer to the async controller.
//!
//! The two domains meet at channel boundaries only. The producer writes
//! into a lock-free channel; a bridge thread moves messages into the
//! controller's async channel so the hard-deadline side never touches an
//! async primitive.

use crate::config::PipelineConfig;
use crate::controller::PipelineController;
use crate::error::Result;
use crate::inference::InferenceSession;
use crate::messages::{InboundMessage, OutboundMessage, ProcessedFrame};
use crate::processor::EnhancementProcessor;
use crate::realtime::RealtimeProducer;
use std::thread;

/// Capacity of the bridge and event channels. Backpressure beyond this is
/// handled by the bounded queues on either side.
const CHANNEL_BUFFER: usize = 64;

/// A launched pipeline: the real-time endpoint plus the event stream.
pub struct PipelineLaunch {
    /// Hand this to the audio callback context.
    pub producer: RealtimeProducer,
    /// Readiness, telemetry and spectrogram events from the async side.
    pub events: tokio::sync::mpsc::Receiver<OutboundMessage>,
}

/// Spawns the controller task and the bridge thread and returns the
/// connected endpoints. Must be called from within a tokio runtime.
pub fn launch<M, P>(
    config: PipelineConfig,
    processor: EnhancementProcessor<M, P>,
) -> Result<PipelineLaunch>
where
    M: InferenceSession + Send + 'static,
    P: InferenceSession + Send + 'static,
{
    let (input_tx, input_rx) = crossbeam_channel::unbounded::<InboundMessage>();
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<ProcessedFrame>();
    let (bridge_tx, bridge_rx) = tokio::sync::mpsc::channel::<InboundMessage>(CHANNEL_BUFFER);
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<OutboundMessage>(CHANNEL_BUFFER);

    let queue_capacity = config.queues.output_capacity;
    let profile = config.performance.clone();
    let controller = PipelineController::new(config, processor);

    // Bridge thread: lock-free channel in, async channel out. Exits when
    // either end disconnects.
    thread::Builder::new()
        .name("dtln-bridge".into())
        .spawn(move || {
            while let Ok(message) = input_rx.recv() {
                if bridge_tx.blocking_send(message).is_err() {
                    break;
                }
            }
        })?;

    tokio::spawn(controller.run(bridge_rx, frame_tx, event_tx));

    Ok(PipelineLaunch {
        producer: RealtimeProducer::new(input_tx, frame_rx, queue_capacity, profile),
        events: event_rx,
    })
}
