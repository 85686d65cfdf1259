//! Frame pipeline and deferred reclamation for Kiln.
//!
//! The host records frames ahead of the device, up to
//! `frames_in_flight` of them. Each in-flight frame owns a [`FrameSlot`]:
//! a host scratch arena, a scratch buffer heap and a scratch descriptor
//! heap, all reset wholesale when the slot comes round again, plus a queue
//! of [`DeferredRelease`]s for persistent resources the frame gave up.
//!
//! ```text
//! FramePipeline<D: Device>
//! ├── FrameSlot × frames_in_flight   scratch heaps + deferred queue
//! ├── StackAllocator                 pass-local host memory
//! └── FrameTimer / FrameMetrics
//! RenderHeaps                        BufferHeap + three DescriptorHeaps
//! FrameContext<'a>                   one frame's borrow of both
//! ```
//!
//! The only synchronisation with the device is its completion counter:
//! `end` signals `n + 1`; `begin` on a reused slot waits, bounded by the
//! configured timeout, until the device reports the slot's value.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffered;
pub mod config;
pub mod context;
pub mod deferred;
pub mod error;
pub mod heaps;
pub mod metrics;
pub mod pipeline;
pub mod slot;
pub mod timeline;

pub use buffered::FrameBuffered;
pub use config::{ConfigError, FrameConfig};
pub use context::{FrameContext, HostScratch};
pub use deferred::{DeferredQueue, DeferredRelease, DrainStats, Retire};
pub use error::FrameError;
pub use heaps::{RenderHeapDiagnostics, RenderHeaps};
pub use metrics::{FrameDiagnostics, FrameMetrics, FrameTimer};
pub use pipeline::FramePipeline;
pub use slot::{FrameSlot, SlotDiagnostics, SlotState};
pub use timeline::ThreadedTimeline;
