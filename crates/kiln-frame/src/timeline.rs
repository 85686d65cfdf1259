//! A simulated device timeline backed by a worker thread.
//!
//! [`ThreadedTimeline`] stands in for an accelerator queue: signalled
//! values are sent over a channel to a worker that retires each one after
//! a fixed latency and publishes the new completed value. Host threads
//! block on a condition variable until the value they need is published.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use kiln_core::{CompletionValue, Device, DeviceError, PipelineId, ResourceId};

struct State {
    completed: CompletionValue,
    lost: Option<String>,
}

struct Shared {
    state: Mutex<State>,
    retired: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`Device`] whose work completes on a background thread.
pub struct ThreadedTimeline {
    shared: Arc<Shared>,
    sender: Option<Sender<CompletionValue>>,
    worker: Option<JoinHandle<()>>,
    released_pipelines: Vec<PipelineId>,
    released_resources: Vec<ResourceId>,
}

impl ThreadedTimeline {
    /// Start a timeline that retires each signalled value `latency` after
    /// the worker receives it.
    pub fn new(latency: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                completed: CompletionValue::ZERO,
                lost: None,
            }),
            retired: Condvar::new(),
        });
        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("kiln-timeline".into())
            .spawn(move || retire_loop(receiver, worker_shared, latency))?;
        tracing::debug!(latency_ms = latency.as_secs_f64() * 1000.0, "device timeline started");
        Ok(Self {
            shared,
            sender: Some(sender),
            worker: Some(worker),
            released_pipelines: Vec::new(),
            released_resources: Vec::new(),
        })
    }

    /// Mark the device lost. Pending and future waits fail.
    pub fn lose(&self, reason: &str) {
        self.shared.lock().lost = Some(reason.to_string());
        self.shared.retired.notify_all();
        tracing::error!(reason, "device timeline lost");
    }

    /// Pipelines handed back so far.
    pub fn released_pipelines(&self) -> &[PipelineId] {
        &self.released_pipelines
    }

    /// Resources handed back so far.
    pub fn released_resources(&self) -> &[ResourceId] {
        &self.released_resources
    }

    fn check_lost(state: &State) -> Result<(), DeviceError> {
        match &state.lost {
            Some(reason) => Err(DeviceError::Lost {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn retire_loop(receiver: Receiver<CompletionValue>, shared: Arc<Shared>, latency: Duration) {
    for value in receiver.iter() {
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        let mut state = shared.lock();
        if state.lost.is_some() {
            continue;
        }
        state.completed = state.completed.max(value);
        drop(state);
        shared.retired.notify_all();
        tracing::trace!(completed = %value, "device retired work");
    }
}

impl Device for ThreadedTimeline {
    fn completed_value(&self) -> CompletionValue {
        self.shared.lock().completed
    }

    fn signal(&mut self, value: CompletionValue) -> Result<(), DeviceError> {
        Self::check_lost(&self.shared.lock())?;
        let stopped = || DeviceError::Lost {
            reason: "timeline worker stopped".into(),
        };
        self.sender
            .as_ref()
            .ok_or_else(stopped)?
            .send(value)
            .map_err(|_| stopped())
    }

    fn wait_for(&mut self, value: CompletionValue, timeout: Duration) -> Result<(), DeviceError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        loop {
            if state.completed.has_reached(value) {
                return Ok(());
            }
            Self::check_lost(&state)?;
            let now = Instant::now();
            if now >= deadline {
                return Err(DeviceError::Timeout {
                    target: value,
                    completed: state.completed,
                });
            }
            state = self
                .shared
                .retired
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn release_pipeline(&mut self, pipeline: PipelineId) {
        self.released_pipelines.push(pipeline);
    }

    fn release_resource(&mut self, resource: ResourceId) {
        self.released_resources.push(resource);
    }
}

impl Drop for ThreadedTimeline {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("device timeline worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(5);

    #[test]
    fn signalled_values_complete() {
        let mut timeline = ThreadedTimeline::new(Duration::from_millis(1)).unwrap();
        timeline.signal(CompletionValue(1)).unwrap();
        timeline.signal(CompletionValue(2)).unwrap();
        timeline.wait_for(CompletionValue(2), LONG).unwrap();
        assert_eq!(timeline.completed_value(), CompletionValue(2));
    }

    #[test]
    fn reached_value_returns_immediately() {
        let mut timeline = ThreadedTimeline::new(Duration::ZERO).unwrap();
        timeline
            .wait_for(CompletionValue::ZERO, Duration::ZERO)
            .unwrap();
    }

    #[test]
    fn unsignalled_value_times_out() {
        let mut timeline = ThreadedTimeline::new(Duration::ZERO).unwrap();
        let err = timeline
            .wait_for(CompletionValue(1), Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::Timeout {
                target: CompletionValue(1),
                completed: CompletionValue::ZERO,
            }
        );
    }

    #[test]
    fn lost_timeline_fails_waits_and_signals() {
        let mut timeline = ThreadedTimeline::new(Duration::ZERO).unwrap();
        timeline.lose("removed");
        assert!(matches!(
            timeline.wait_for(CompletionValue(1), LONG),
            Err(DeviceError::Lost { .. })
        ));
        assert!(matches!(
            timeline.signal(CompletionValue(1)),
            Err(DeviceError::Lost { .. })
        ));
    }

    #[test]
    fn drop_joins_worker_with_pending_work() {
        let mut timeline = ThreadedTimeline::new(Duration::from_millis(1)).unwrap();
        for v in 1..=5 {
            timeline.signal(CompletionValue(v)).unwrap();
        }
        drop(timeline);
    }
}
