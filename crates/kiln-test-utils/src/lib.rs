//! Test utilities and mock devices for Kiln development.
//!
//! [`ManualTimeline`] is a deterministic [`Device`]: the test decides when
//! submitted work completes. [`fixtures`] builds small heap configurations.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::time::Duration;

use kiln_core::{CompletionValue, Device, DeviceError, PipelineId, ResourceId};

/// One call to [`Device::wait_for`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitRecord {
    /// Value waited for.
    pub target: CompletionValue,
    /// Completed value when the wait started.
    pub completed_before: CompletionValue,
}

impl WaitRecord {
    /// Whether the wait had to block.
    pub fn blocked(&self) -> bool {
        !self.completed_before.has_reached(self.target)
    }
}

/// Host-driven mock device.
///
/// Signals are recorded but do not complete on their own. By default a
/// blocking wait retires everything up to its target, as if the device
/// caught up while the host slept. After [`stall`](Self::stall) a blocking
/// wait times out instead, and after [`lose`](Self::lose) every call fails.
#[derive(Debug, Default)]
pub struct ManualTimeline {
    completed: CompletionValue,
    signaled: Vec<CompletionValue>,
    waits: Vec<WaitRecord>,
    released_pipelines: Vec<PipelineId>,
    released_resources: Vec<ResourceId>,
    stalled: bool,
    lost: Option<String>,
}

impl ManualTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retire work up to `value`.
    pub fn complete(&mut self, value: CompletionValue) {
        self.completed = self.completed.max(value);
    }

    /// Retire everything signalled so far.
    pub fn complete_all(&mut self) {
        if let Some(&last) = self.signaled.last() {
            self.complete(last);
        }
    }

    /// Make blocking waits time out instead of catching up.
    pub fn stall(&mut self) {
        self.stalled = true;
    }

    /// Let blocking waits catch up again.
    pub fn resume(&mut self) {
        self.stalled = false;
    }

    /// Fail every subsequent signal and wait.
    pub fn lose(&mut self, reason: &str) {
        self.lost = Some(reason.to_string());
    }

    pub fn signaled(&self) -> &[CompletionValue] {
        &self.signaled
    }

    pub fn waits(&self) -> &[WaitRecord] {
        &self.waits
    }

    /// Waits that found the target not yet reached.
    pub fn blocking_waits(&self) -> usize {
        self.waits.iter().filter(|w| w.blocked()).count()
    }

    pub fn released_pipelines(&self) -> &[PipelineId] {
        &self.released_pipelines
    }

    pub fn released_resources(&self) -> &[ResourceId] {
        &self.released_resources
    }

    fn check_lost(&self) -> Result<(), DeviceError> {
        match &self.lost {
            Some(reason) => Err(DeviceError::Lost {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Device for ManualTimeline {
    fn completed_value(&self) -> CompletionValue {
        self.completed
    }

    fn signal(&mut self, value: CompletionValue) -> Result<(), DeviceError> {
        self.check_lost()?;
        assert!(
            self.signaled.last().is_none_or(|&last| value > last),
            "signal {value} not above previous signals"
        );
        self.signaled.push(value);
        Ok(())
    }

    fn wait_for(&mut self, value: CompletionValue, _timeout: Duration) -> Result<(), DeviceError> {
        self.check_lost()?;
        self.waits.push(WaitRecord {
            target: value,
            completed_before: self.completed,
        });
        if self.completed.has_reached(value) {
            return Ok(());
        }
        if self.stalled {
            return Err(DeviceError::Timeout {
                target: value,
                completed: self.completed,
            });
        }
        assert!(
            self.signaled.iter().any(|&s| s.has_reached(value)),
            "waiting for {value}, which was never signalled"
        );
        self.complete(value);
        Ok(())
    }

    fn release_pipeline(&mut self, pipeline: PipelineId) {
        self.released_pipelines.push(pipeline);
    }

    fn release_resource(&mut self, resource: ResourceId) {
        self.released_resources.push(resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_catches_up_by_default() {
        let mut device = ManualTimeline::new();
        device.signal(CompletionValue(1)).unwrap();
        device.wait_for(CompletionValue(1), Duration::ZERO).unwrap();
        assert_eq!(device.completed_value(), CompletionValue(1));
        assert_eq!(device.blocking_waits(), 1);
        device.wait_for(CompletionValue(1), Duration::ZERO).unwrap();
        assert_eq!(device.blocking_waits(), 1);
    }

    #[test]
    fn stalled_wait_times_out() {
        let mut device = ManualTimeline::new();
        device.signal(CompletionValue(1)).unwrap();
        device.stall();
        assert_eq!(
            device.wait_for(CompletionValue(1), Duration::ZERO),
            Err(DeviceError::Timeout {
                target: CompletionValue(1),
                completed: CompletionValue::ZERO,
            })
        );
        device.complete_all();
        assert!(device.wait_for(CompletionValue(1), Duration::ZERO).is_ok());
    }

    #[test]
    fn lost_device_fails_everything() {
        let mut device = ManualTimeline::new();
        device.lose("removed");
        assert!(matches!(
            device.signal(CompletionValue(1)),
            Err(DeviceError::Lost { .. })
        ));
    }
}
