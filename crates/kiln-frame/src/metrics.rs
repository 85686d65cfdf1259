//! Frame timing, per-frame metrics, and pipeline diagnostics.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use kiln_core::{CompletionValue, FrameIndex};

use crate::deferred::DrainStats;
use crate::slot::SlotDiagnostics;

/// What happened during the most recent frame.
///
/// Wait and drain figures describe the slot recycle performed by `begin`;
/// usage figures are sampled at `end`, before the slot is submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameMetrics {
    /// Frames begun before this one.
    pub frame_number: u64,
    /// Slot used.
    pub slot: FrameIndex,
    /// Completion value signalled at `end`.
    pub target: CompletionValue,
    /// Whether `begin` had to block on the device.
    pub waited: bool,
    /// Time spent blocked in `begin`.
    pub wait_time: Duration,
    /// Deferred releases executed by `begin`.
    pub drained: DrainStats,
    /// Releases queued during the frame.
    pub queued_releases: usize,
    /// Host scratch bytes used.
    pub host_bytes: u64,
    /// Scratch buffer bytes used.
    pub scratch_buffer_bytes: u64,
    /// Scratch descriptor slots used.
    pub scratch_descriptors: u64,
    /// Host time from `begin` to `end`, pacing included.
    pub cpu_time: Duration,
    /// Time `end` spent holding the frame to `min_frame_time`.
    pub paced: Duration,
}

/// Rolling window of frame-to-frame intervals.
#[derive(Clone, Debug)]
pub struct FrameTimer {
    samples: VecDeque<Duration>,
    window: usize,
    total: Duration,
    first_tick: Option<Instant>,
    last_tick: Option<Instant>,
}

impl FrameTimer {
    /// A timer averaging the last `window` intervals.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            total: Duration::ZERO,
            first_tick: None,
            last_tick: None,
        }
    }

    /// Mark a frame boundary at `now`. The first tick only starts timing.
    pub fn tick(&mut self, now: Instant) {
        if let Some(previous) = self.last_tick {
            self.record(now.saturating_duration_since(previous));
        }
        self.first_tick.get_or_insert(now);
        self.last_tick = Some(now);
    }

    /// Add one interval directly.
    pub fn record(&mut self, interval: Duration) {
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.total -= oldest;
            }
        }
        self.samples.push_back(interval);
        self.total += interval;
    }

    /// Most recent interval.
    pub fn last(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    /// Mean interval over the window.
    pub fn average(&self) -> Option<Duration> {
        let count = u32::try_from(self.samples.len()).ok().filter(|&n| n > 0)?;
        Some(self.total / count)
    }

    /// Frames per second implied by [`average`](Self::average).
    pub fn frames_per_second(&self) -> Option<f64> {
        self.average()
            .filter(|avg| !avg.is_zero())
            .map(|avg| 1.0 / avg.as_secs_f64())
    }

    /// Time from the first tick to the most recent one.
    pub fn elapsed(&self) -> Duration {
        match (self.first_tick, self.last_tick) {
            (Some(first), Some(last)) => last.saturating_duration_since(first),
            _ => Duration::ZERO,
        }
    }

    /// Number of intervals held.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Snapshot of the pipeline's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDiagnostics {
    /// Highest value signalled by the host.
    pub submitted: CompletionValue,
    /// Highest value the device has retired.
    pub completed: CompletionValue,
    /// Slot the next (or current) frame uses.
    pub current: FrameIndex,
    /// Whether a frame is being recorded.
    pub in_frame: bool,
    /// Frames begun since creation.
    pub frames_begun: u64,
    /// Per-slot usage, in ring order.
    pub slots: Vec<SlotDiagnostics>,
}

impl FrameDiagnostics {
    /// Frames signalled but not yet retired.
    pub fn frames_in_flight(&self) -> u64 {
        self.submitted.0.saturating_sub(self.completed.0)
    }

    /// Releases queued across all slots.
    pub fn pending_releases(&self) -> usize {
        self.slots.iter().map(|s| s.pending_releases).sum()
    }
}
