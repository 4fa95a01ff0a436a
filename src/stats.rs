//! Telemetry types: queue health, stats snapshots, rolling tick timings.
//!
//! `ProcessingStats`-style records here are continuously overwritten by the
//! pipeline and exposed to external collaborators as read-only snapshots on
//! a fixed cadence or on demand. Nothing in this module is required for
//! audio correctness.

use crate::defaults;
use serde::Serialize;
use std::collections::VecDeque;

/// Overall queue health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Good,
    Warning,
}

/// Derived health object describing queue pressure.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Inbound queue utilization, percent.
    pub input_utilization: u8,
    /// Outbound queue utilization, percent.
    pub output_utilization: u8,
    /// In-flight accounting queue utilization, percent.
    pub processing_utilization: u8,
    /// Cumulative evictions across all queues.
    pub total_evictions: u64,
    pub status: HealthStatus,
}

impl QueueHealth {
    /// Builds a health record from queue occupancy and eviction counts.
    pub fn compute(
        input: (usize, usize),
        output: (usize, usize),
        processing: (usize, usize),
        total_evictions: u64,
    ) -> Self {
        let status = if total_evictions > defaults::EVICTION_WARNING_THRESHOLD {
            HealthStatus::Warning
        } else {
            HealthStatus::Good
        };
        Self {
            input_utilization: utilization_pct(input.0, input.1),
            output_utilization: utilization_pct(output.0, output.1),
            processing_utilization: utilization_pct(processing.0, processing.1),
            total_evictions,
            status,
        }
    }
}

impl Default for QueueHealth {
    fn default() -> Self {
        Self::compute((0, 1), (0, 1), (0, 1), 0)
    }
}

/// Queue occupancy as a rounded percentage.
pub fn utilization_pct(len: usize, capacity: usize) -> u8 {
    if capacity == 0 {
        return 0;
    }
    let pct = (len as f64 / capacity as f64) * 100.0;
    pct.round().min(100.0) as u8
}

/// Constrained-mode extras attached to a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ConstrainedStats {
    pub frame_skip_interval: u32,
    pub spectrogram_rate: f64,
    pub processed_frames: u64,
}

/// Read-only telemetry snapshot published at most once per second.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Whether the inference engine finished initialization.
    pub initialized: bool,
    /// Mean per-tick duration over the rolling window, milliseconds.
    pub tick_ms_avg: f64,
    /// Worst per-tick duration observed, milliseconds.
    pub tick_ms_max: f64,
    /// Duration of the last async processing cycle, milliseconds.
    pub controller_ms: f64,
    /// Last stage-1 (mask estimator) inference duration, milliseconds.
    pub mask_ms: f64,
    /// Last stage-2 (post-filter) inference duration, milliseconds.
    pub postfilter_ms: f64,
    /// Occupancy of the producer-side processed queue.
    pub queue_len: usize,
    /// Cumulative evictions observed by the producer.
    pub evictions: u64,
    /// Per-frame inference failures recovered by pass-through.
    pub inference_errors: u64,
    pub health: QueueHealth,
    /// Present only when running a constrained profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constrained: Option<ConstrainedStats>,
}

/// Rolling window of per-tick processing durations.
///
/// Bounded so the hard-deadline context never grows it past
/// [`defaults::TICK_WINDOW_LEN`] entries.
#[derive(Debug)]
pub struct TickWindow {
    times: VecDeque<f64>,
    capacity: usize,
    max: f64,
}

impl TickWindow {
    pub fn new() -> Self {
        Self::with_capacity(defaults::TICK_WINDOW_LEN)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            max: 0.0,
        }
    }

    /// Records one tick duration, discarding the oldest past capacity.
    pub fn push(&mut self, ms: f64) {
        if self.times.len() >= self.capacity {
            self.times.pop_front();
        }
        self.times.push_back(ms);
        if ms > self.max {
            self.max = ms;
        }
    }

    /// Mean duration over the window, or 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.times.is_empty() {
            return 0.0;
        }
        self.times.iter().sum::<f64>() / self.times.len() as f64
    }

    /// Worst duration ever recorded (survives window rotation).
    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn clear(&mut self) {
        self.times.clear();
        self.max = 0.0;
    }
}

impl Default for TickWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_rounds_and_clamps() {
        assert_eq!(utilization_pct(0, 50), 0);
        assert_eq!(utilization_pct(25, 50), 50);
        assert_eq!(utilization_pct(1, 3), 33);
        assert_eq!(utilization_pct(50, 50), 100);
        assert_eq!(utilization_pct(5, 0), 0);
    }

    #[test]
    fn health_status_flips_to_warning_above_threshold() {
        let good = QueueHealth::compute((0, 50), (0, 50), (0, 30), 10);
        assert_eq!(good.status, HealthStatus::Good);

        let warning = QueueHealth::compute((0, 50), (0, 50), (0, 30), 11);
        assert_eq!(warning.status, HealthStatus::Warning);
    }

    #[test]
    fn tick_window_is_bounded() {
        let mut window = TickWindow::with_capacity(3);
        for i in 0..10 {
            window.push(f64::from(i));
        }
        assert_eq!(window.len(), 3);
        // Survivors are 7, 8, 9
        assert!((window.average() - 8.0).abs() < 1e-9);
        // Max tracks the all-time worst tick, not just the window
        assert!((window.max() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn tick_window_empty_average() {
        let window = TickWindow::new();
        assert_eq!(window.average(), 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let snapshot = StatsSnapshot {
            initialized: true,
            tick_ms_avg: 0.4,
            tick_ms_max: 2.0,
            controller_ms: 3.5,
            mask_ms: 1.2,
            postfilter_ms: 1.1,
            queue_len: 4,
            evictions: 0,
            inference_errors: 0,
            health: QueueHealth::default(),
            constrained: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["health"]["status"], "good");
        assert_eq!(json["queue_len"], 4);
        // Constrained extras are omitted on the full profile
        assert!(json.get("constrained").is_none());
    }
}
