//! The host/device boundary.

use std::time::Duration;

use crate::error::DeviceError;
use crate::id::{CompletionValue, PipelineId, ResourceId};

/// The accelerator as seen by the frame pipeline.
///
/// The only synchronisation primitive is a monotonically increasing
/// completion counter: the host signals a value after submitting a frame's
/// work, and the device reports the highest value whose work has retired.
/// Device objects retired through deferred reclamation are handed back via
/// [`release_pipeline`](Device::release_pipeline) and
/// [`release_resource`](Device::release_resource) once the device is known
/// to be finished with them.
pub trait Device {
    /// The highest completion value the device has retired.
    fn completed_value(&self) -> CompletionValue;

    /// Enqueue a signal of `value` after all previously submitted work.
    ///
    /// Values are signalled in strictly increasing order.
    fn signal(&mut self, value: CompletionValue) -> Result<(), DeviceError>;

    /// Block the calling thread until `completed_value() >= value`.
    ///
    /// Returns immediately if the value has already been reached. Returns
    /// [`DeviceError::Timeout`] if `timeout` elapses first and
    /// [`DeviceError::Lost`] if the device can no longer make progress.
    fn wait_for(&mut self, value: CompletionValue, timeout: Duration) -> Result<(), DeviceError>;

    /// Destroy a pipeline state object. Called only after the device has
    /// retired every frame that could reference it.
    fn release_pipeline(&mut self, pipeline: PipelineId);

    /// Destroy a raw device resource. Called only after the device has
    /// retired every frame that could reference it.
    fn release_resource(&mut self, resource: ResourceId);
}
