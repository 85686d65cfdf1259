//! The frame pipeline: slot rotation, bounded waits, and deferred
//! reclamation.
//!
//! [`FramePipeline`] owns a fixed ring of [`FrameSlot`]s and the device
//! timeline. Each frame:
//!
//! 1. [`begin`](FramePipeline::begin) picks the next slot, waits (bounded)
//!    until the device has retired the slot's previous frame, drains the
//!    slot's deferred releases, and resets its scratch memory.
//! 2. The caller records through the returned [`FrameContext`].
//! 3. [`end`](FramePipeline::end) signals the next completion value and
//!    moves to the next slot.
//!
//! A slot is only reused after `frames_in_flight` later frames have been
//! signalled and its own value observed as completed, so nothing released
//! during a frame is freed while the device can still read it.

use std::time::{Duration, Instant};

use kiln_arena::{ArenaConfig, StackAllocator};
use kiln_core::{CompletionValue, Device, FrameIndex};

use crate::config::FrameConfig;
use crate::context::FrameContext;
use crate::error::FrameError;
use crate::heaps::RenderHeaps;
use crate::metrics::{FrameDiagnostics, FrameMetrics, FrameTimer};
use crate::slot::FrameSlot;

/// Ring of frame slots driven against a [`Device`].
pub struct FramePipeline<D> {
    config: FrameConfig,
    device: D,
    slots: Vec<FrameSlot>,
    current: FrameIndex,
    submitted: CompletionValue,
    in_frame: bool,
    frame_started: Instant,
    frames_begun: u64,
    stack: StackAllocator,
    timer: FrameTimer,
    metrics: FrameMetrics,
}

impl<D: Device> FramePipeline<D> {
    /// Create the slot ring, reserving each slot's scratch chunks from
    /// `heaps`.
    ///
    /// On failure every chunk already reserved is returned to `heaps` and
    /// the error that stopped construction is returned.
    pub fn new(config: FrameConfig, device: D, heaps: &mut RenderHeaps) -> Result<Self, FrameError> {
        config.validate()?;

        let mut slots = Vec::with_capacity(config.frames_in_flight as usize);
        for i in 0..config.frames_in_flight {
            match FrameSlot::new(FrameIndex(i), &config, heaps) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    let _ = release_slots(slots, heaps);
                    return Err(e);
                }
            }
        }

        let stack = match StackAllocator::new(&ArenaConfig {
            chunk_size: config.stack_chunk_size,
            initial_chunk_count: 1,
        }) {
            Ok(stack) => stack,
            Err(e) => {
                let _ = release_slots(slots, heaps);
                return Err(e.into());
            }
        };

        tracing::info!(
            frames_in_flight = config.frames_in_flight,
            scratch_buffer_chunk = config.scratch_buffer_chunk_size,
            scratch_descriptor_chunk = config.scratch_descriptor_chunk_size,
            "frame pipeline created"
        );

        Ok(Self {
            timer: FrameTimer::new(config.timing_window),
            config,
            device,
            slots,
            current: FrameIndex(0),
            submitted: CompletionValue::ZERO,
            in_frame: false,
            frame_started: Instant::now(),
            frames_begun: 0,
            stack,
            metrics: FrameMetrics::default(),
        })
    }

    /// Start recording a frame into the next slot.
    ///
    /// Blocks until the device has completed the slot's previous frame,
    /// at most `wait_timeout`. Returns without blocking if it already has.
    ///
    /// # Errors
    ///
    /// [`FrameError::FrameInProgress`] if the previous frame was not
    /// ended; [`FrameError::WaitTimedOut`] or [`FrameError::DeviceLost`]
    /// if the wait fails; any error from a deferred release.
    pub fn begin<'a>(&'a mut self, heaps: &'a mut RenderHeaps) -> Result<FrameContext<'a>, FrameError> {
        if self.in_frame {
            return Err(FrameError::FrameInProgress);
        }
        let index = self.current;
        let slot = index.as_usize();
        let target = self.slots[slot].target();

        let (waited, wait_time) = self.wait_until(target)?;
        let drained = self.slots[slot].recycle(heaps, &mut self.device)?;

        let now = Instant::now();
        self.timer.tick(now);
        self.frame_started = now;
        let frame_number = self.frames_begun;
        self.frames_begun += 1;
        self.in_frame = true;
        self.metrics = FrameMetrics {
            frame_number,
            slot: index,
            waited,
            wait_time,
            drained,
            ..FrameMetrics::default()
        };

        tracing::debug!(
            frame = frame_number,
            slot = %index,
            target = %target,
            waited,
            drained = drained.total(),
            "frame begin"
        );

        Ok(FrameContext::new(
            frame_number,
            &mut self.slots[slot],
            heaps,
            &mut self.stack,
        ))
    }

    /// Submit the current frame: signal the next completion value and
    /// advance to the next slot.
    ///
    /// Frames shorter than `min_frame_time` are held here until it has
    /// passed.
    ///
    /// # Errors
    ///
    /// [`FrameError::NoFrameInProgress`] without a matching `begin`;
    /// [`FrameError::DeviceLost`] if the signal cannot be enqueued. The
    /// pipeline still advances in the latter case.
    pub fn end(&mut self) -> Result<CompletionValue, FrameError> {
        if !self.in_frame {
            return Err(FrameError::NoFrameInProgress);
        }
        self.in_frame = false;
        let (cpu_time, paced) = self.pace();

        let index = self.current;
        let target = self.submitted.next();
        self.submitted = target;

        let slot = &mut self.slots[index.as_usize()];
        let usage = slot.diagnostics();
        self.metrics.target = target;
        self.metrics.queued_releases = usage.pending_releases;
        self.metrics.host_bytes = usage.host_used_bytes;
        self.metrics.scratch_buffer_bytes = usage.scratch_buffer_used_bytes;
        self.metrics.scratch_descriptors = usage.scratch_descriptors_used;
        self.metrics.cpu_time = cpu_time;
        self.metrics.paced = paced;
        slot.submit(target);

        self.current = FrameIndex((index.0 + 1) % self.config.frames_in_flight);

        if let Err(e) = self.device.signal(target) {
            let e = FrameError::from(e);
            tracing::error!(slot = %index, target = %target, error = %e, "signal failed");
            return Err(e);
        }
        tracing::debug!(
            slot = %index,
            target = %target,
            queued = usage.pending_releases,
            "frame end"
        );
        Ok(target)
    }

    /// Wait for every submitted frame and drain every slot.
    ///
    /// All slots are recycled even if a release fails; the first failure
    /// is returned.
    pub fn flush(&mut self, heaps: &mut RenderHeaps) -> Result<(), FrameError> {
        if self.in_frame {
            return Err(FrameError::FrameInProgress);
        }
        let target = self.submitted;
        self.wait_until(target)?;

        let mut first_error = None;
        let mut drained = 0;
        for slot in &mut self.slots {
            match slot.recycle(heaps, &mut self.device) {
                Ok(stats) => drained += stats.total(),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        tracing::info!(target = %target, drained, "frame pipeline flushed");
        first_error.map_or(Ok(()), Err)
    }

    /// Flush, return every slot's scratch chunks to `heaps`, and hand back
    /// the device.
    ///
    /// The chunks are returned even when the flush fails, since the
    /// pipeline is consumed either way; the flush error is then reported
    /// and the device dropped. After a failed shutdown the caller must
    /// treat the device as idle or lost before reusing that heap memory.
    pub fn shutdown(mut self, heaps: &mut RenderHeaps) -> Result<D, FrameError> {
        let flushed = self.flush(heaps);
        let released = release_slots(self.slots, heaps);
        match flushed.and(released) {
            Ok(()) => {
                tracing::info!(frames = self.frames_begun, "frame pipeline shut down");
                Ok(self.device)
            }
            Err(e) => {
                tracing::error!(frames = self.frames_begun, error = %e, "frame pipeline shut down with errors");
                Err(e)
            }
        }
    }

    fn pace(&self) -> (Duration, Duration) {
        let busy = self.frame_started.elapsed();
        let floor = self.config.min_frame_time;
        if busy >= floor {
            return (busy, Duration::ZERO);
        }
        let remaining = floor - busy;
        std::thread::sleep(remaining);
        (self.frame_started.elapsed(), remaining)
    }

    fn wait_until(&mut self, target: CompletionValue) -> Result<(bool, Duration), FrameError> {
        let completed = self.device.completed_value();
        if completed.has_reached(target) {
            return Ok((false, Duration::ZERO));
        }

        tracing::trace!(target = %target, completed = %completed, "waiting for device");
        let start = Instant::now();
        if let Err(e) = self.device.wait_for(target, self.config.wait_timeout) {
            let e = FrameError::from(e);
            tracing::error!(target = %target, error = %e, "device wait failed");
            return Err(e);
        }
        let completed = self.device.completed_value();
        if !completed.has_reached(target) {
            tracing::error!(target = %target, completed = %completed, "device wait returned early");
            return Err(FrameError::WaitTimedOut { target, completed });
        }

        let elapsed = start.elapsed();
        if elapsed > self.config.slow_wait_threshold {
            tracing::warn!(
                target = %target,
                wait_ms = elapsed.as_secs_f64() * 1000.0,
                "slow device wait"
            );
        }
        Ok((true, elapsed))
    }

    /// Snapshot of counters and per-slot usage.
    pub fn diagnostics(&self) -> FrameDiagnostics {
        FrameDiagnostics {
            submitted: self.submitted,
            completed: self.device.completed_value(),
            current: self.current,
            in_frame: self.in_frame,
            frames_begun: self.frames_begun,
            slots: self.slots.iter().map(FrameSlot::diagnostics).collect(),
        }
    }

    /// Metrics for the current or most recent frame.
    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    /// Frame interval statistics.
    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    /// The configuration in use.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// The device timeline.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the device timeline.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Slot the next (or current) frame uses.
    pub fn current_index(&self) -> FrameIndex {
        self.current
    }

    /// Ring depth.
    pub fn frames_in_flight(&self) -> u32 {
        self.config.frames_in_flight
    }

    /// Highest completion value signalled.
    pub fn submitted(&self) -> CompletionValue {
        self.submitted
    }

    /// Whether a frame is being recorded.
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Slot at `index`, if in range.
    pub fn slot(&self, index: FrameIndex) -> Option<&FrameSlot> {
        self.slots.get(index.as_usize())
    }
}

/// Return every slot's scratch chunks to `heaps`, continuing past
/// failures. Each failure is logged; the first is returned.
fn release_slots(slots: Vec<FrameSlot>, heaps: &mut RenderHeaps) -> Result<(), FrameError> {
    let mut first_error = None;
    for slot in slots {
        let index = slot.index();
        if let Err(e) = slot.release_scratch(heaps) {
            tracing::error!(slot = %index, error = %e, "scratch release failed");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotState;
    use kiln_core::{DeviceError, PipelineId, ResourceId};
    use kiln_arena::ArenaError;
    use kiln_heap::{DescriptorHeapKind, HeapError};
    use kiln_test_utils::ManualTimeline;

    fn small_config() -> FrameConfig {
        FrameConfig {
            host_chunk_size: 1024,
            scratch_buffer_chunk_size: 256,
            scratch_descriptor_chunk_size: 16,
            stack_chunk_size: 1024,
            ..FrameConfig::default()
        }
    }

    fn setup() -> (FramePipeline<ManualTimeline>, RenderHeaps) {
        let mut heaps = RenderHeaps::with_buffer_size(4096).unwrap();
        let pipeline = FramePipeline::new(small_config(), ManualTimeline::new(), &mut heaps).unwrap();
        (pipeline, heaps)
    }

    #[test]
    fn first_frames_do_not_wait() {
        let (mut pipeline, mut heaps) = setup();
        for expected in 1..=2 {
            let ctx = pipeline.begin(&mut heaps).unwrap();
            drop(ctx);
            assert_eq!(pipeline.end().unwrap(), CompletionValue(expected));
        }
        assert!(pipeline.device().waits().is_empty());
        assert_eq!(pipeline.current_index(), FrameIndex(0));
    }

    #[test]
    fn reused_slot_waits_for_its_target() {
        let (mut pipeline, mut heaps) = setup();
        for _ in 0..2 {
            pipeline.begin(&mut heaps).unwrap();
            pipeline.end().unwrap();
        }
        pipeline.begin(&mut heaps).unwrap();
        let waits = pipeline.device().waits();
        assert_eq!(waits.len(), 1);
        assert_eq!(waits[0].target, CompletionValue(1));
        assert!(pipeline.device().completed_value().has_reached(CompletionValue(1)));
        assert!(pipeline.metrics().waited);
    }

    #[test]
    fn completed_target_skips_wait() {
        let (mut pipeline, mut heaps) = setup();
        for _ in 0..2 {
            pipeline.begin(&mut heaps).unwrap();
            pipeline.end().unwrap();
        }
        pipeline.device_mut().complete(CompletionValue(2));
        pipeline.begin(&mut heaps).unwrap();
        assert!(pipeline.device().waits().is_empty());
        assert!(!pipeline.metrics().waited);
    }

    #[test]
    fn begin_twice_is_rejected() {
        let (mut pipeline, mut heaps) = setup();
        pipeline.begin(&mut heaps).unwrap();
        assert!(matches!(
            pipeline.begin(&mut heaps),
            Err(FrameError::FrameInProgress)
        ));
        pipeline.end().unwrap();
        assert_eq!(pipeline.end(), Err(FrameError::NoFrameInProgress));
    }

    #[test]
    fn stalled_device_times_out() {
        let (mut pipeline, mut heaps) = setup();
        for _ in 0..2 {
            pipeline.begin(&mut heaps).unwrap();
            pipeline.end().unwrap();
        }
        pipeline.device_mut().stall();
        let err = pipeline.begin(&mut heaps).err().unwrap();
        assert_eq!(
            err,
            FrameError::WaitTimedOut {
                target: CompletionValue(1),
                completed: CompletionValue::ZERO,
            }
        );
        assert!(!pipeline.in_frame());

        pipeline.device_mut().resume();
        assert!(pipeline.begin(&mut heaps).is_ok());
    }

    #[test]
    fn lost_device_is_reported() {
        let (mut pipeline, mut heaps) = setup();
        for _ in 0..2 {
            pipeline.begin(&mut heaps).unwrap();
            pipeline.end().unwrap();
        }
        pipeline.device_mut().lose("removed");
        assert!(matches!(
            pipeline.begin(&mut heaps),
            Err(FrameError::DeviceLost { .. })
        ));
    }

    #[test]
    fn slot_states_follow_the_cycle() {
        let (mut pipeline, mut heaps) = setup();
        pipeline.begin(&mut heaps).unwrap();
        assert_eq!(pipeline.slot(FrameIndex(0)).unwrap().state(), SlotState::Idle);
        pipeline.end().unwrap();
        let slot = pipeline.slot(FrameIndex(0)).unwrap();
        assert_eq!(slot.state(), SlotState::Submitted);
        assert_eq!(slot.target(), CompletionValue(1));
    }

    #[test]
    fn device_objects_released_after_retirement() {
        let (mut pipeline, mut heaps) = setup();
        {
            let mut ctx = pipeline.begin(&mut heaps).unwrap();
            let mut pipeline_id = Some(PipelineId(7));
            let mut resource = Some(ResourceId(9));
            assert!(ctx.safe_release(&mut pipeline_id));
            assert!(ctx.safe_release(&mut resource));
            assert!(!ctx.safe_release(&mut pipeline_id));
            assert_eq!(ctx.pending_releases(), 2);
        }
        pipeline.end().unwrap();
        pipeline.begin(&mut heaps).unwrap();
        pipeline.end().unwrap();
        assert!(pipeline.device().released_pipelines().is_empty());

        pipeline.begin(&mut heaps).unwrap();
        assert_eq!(pipeline.device().released_pipelines(), &[PipelineId(7)]);
        assert_eq!(pipeline.device().released_resources(), &[ResourceId(9)]);
        assert_eq!(pipeline.metrics().drained.pipelines, 1);
    }

    #[test]
    fn scratch_is_reset_on_reuse() {
        let (mut pipeline, mut heaps) = setup();
        let first = {
            let mut ctx = pipeline.begin(&mut heaps).unwrap();
            let a = ctx.scratch_buffer(64, 16).unwrap();
            let range = ctx.scratch_descriptors(4).unwrap();
            assert_eq!(range.count, 4);
            a.offset
        };
        pipeline.end().unwrap();
        assert_eq!(pipeline.metrics().scratch_buffer_bytes, 80);
        assert_eq!(pipeline.metrics().scratch_descriptors, 4);
        pipeline.begin(&mut heaps).unwrap();
        pipeline.end().unwrap();

        let mut ctx = pipeline.begin(&mut heaps).unwrap();
        let again = ctx.scratch_buffer(64, 16).unwrap();
        assert_eq!(again.offset, first);
    }

    #[test]
    fn flush_drains_every_slot() {
        let (mut pipeline, mut heaps) = setup();
        for _ in 0..2 {
            let mut ctx = pipeline.begin(&mut heaps).unwrap();
            let mut a = ctx.allocate_buffer(32, 4).unwrap();
            let mut d = ctx
                .allocate_descriptors(DescriptorHeapKind::RenderTarget, 2)
                .unwrap();
            ctx.safe_release(&mut a);
            ctx.safe_release(&mut d);
            pipeline.end().unwrap();
        }
        let before = heaps.buffers.diagnostics().live_allocations;
        pipeline.flush(&mut heaps).unwrap();
        assert_eq!(heaps.buffers.diagnostics().live_allocations, before - 2);
        assert_eq!(heaps.render_targets.diagnostics().live_allocations, 0);
        assert_eq!(pipeline.diagnostics().pending_releases(), 0);
    }

    #[test]
    fn shutdown_returns_scratch_chunks() {
        let (mut pipeline, mut heaps) = setup();
        pipeline.begin(&mut heaps).unwrap();
        pipeline.end().unwrap();
        let device = pipeline.shutdown(&mut heaps).unwrap();
        assert_eq!(device.signaled(), &[CompletionValue(1)]);
        assert_eq!(heaps.buffers.diagnostics().used, 0);
        assert_eq!(heaps.shader_resources.diagnostics().used, 0);
    }

    #[test]
    fn oversized_scratch_reservation_fails_cleanly() {
        let mut heaps = RenderHeaps::with_buffer_size(1024).unwrap();
        let config = FrameConfig {
            frames_in_flight: 3,
            scratch_buffer_chunk_size: 400,
            ..small_config()
        };
        let err = FramePipeline::new(config, ManualTimeline::new(), &mut heaps).err();
        assert!(matches!(
            err,
            Some(FrameError::Heap(HeapError::Arena(ArenaError::OutOfSpace { .. })))
        ));
        assert_eq!(heaps.buffers.diagnostics().used, 0);
        assert_eq!(heaps.buffers.diagnostics().live_allocations, 0);
        assert_eq!(heaps.shader_resources.diagnostics().used, 0);
    }

    #[test]
    fn shutdown_after_device_loss_still_returns_scratch_chunks() {
        let (mut pipeline, mut heaps) = setup();
        let mut ctx = pipeline.begin(&mut heaps).unwrap();
        ctx.scratch_buffer(64, 4).unwrap();
        let mut kept = ctx.allocate_buffer(32, 16).unwrap();
        ctx.safe_release(&mut kept);
        pipeline.end().unwrap();
        assert!(heaps.buffers.diagnostics().used > 0);

        pipeline.device_mut().lose("reset");
        assert_eq!(
            pipeline.shutdown(&mut heaps).err(),
            Some(FrameError::DeviceLost {
                reason: "reset".into()
            })
        );
        // Only the persistent range still queued for release remains.
        let buffers = heaps.buffers.diagnostics();
        assert_eq!(buffers.live_allocations, 1);
        assert_eq!(heaps.shader_resources.diagnostics().used, 0);
    }

    #[test]
    fn short_frames_are_held_to_the_minimum_frame_time() {
        let mut heaps = RenderHeaps::with_buffer_size(4096).unwrap();
        let config = FrameConfig {
            min_frame_time: Duration::from_millis(20),
            ..small_config()
        };
        let mut pipeline = FramePipeline::new(config, ManualTimeline::new(), &mut heaps).unwrap();
        for _ in 0..3 {
            pipeline.begin(&mut heaps).unwrap();
            pipeline.end().unwrap();
            let metrics = pipeline.metrics();
            assert!(metrics.cpu_time >= Duration::from_millis(20));
            assert!(metrics.paced > Duration::ZERO);
        }
        assert!(pipeline.timer().elapsed() >= Duration::from_millis(40));
        assert!(pipeline.timer().average().unwrap() >= Duration::from_millis(20));
    }

    #[test]
    fn pacing_is_off_by_default() {
        let (mut pipeline, mut heaps) = setup();
        pipeline.begin(&mut heaps).unwrap();
        pipeline.end().unwrap();
        assert_eq!(pipeline.metrics().paced, Duration::ZERO);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut heaps = RenderHeaps::with_buffer_size(1024).unwrap();
        let config = FrameConfig {
            frames_in_flight: 0,
            ..small_config()
        };
        assert!(matches!(
            FramePipeline::new(config, ManualTimeline::new(), &mut heaps),
            Err(FrameError::Config(_))
        ));
    }

    #[test]
    fn device_error_conversion() {
        let e: FrameError = DeviceError::Lost {
            reason: "x".into(),
        }
        .into();
        assert_eq!(e, FrameError::DeviceLost { reason: "x".into() });
    }
}
