//! Core types and traits for the Kiln GPU memory management layer.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers shared by every other Kiln crate (heap instances,
//! frame slots, completion values, descriptor slots, device objects),
//! the [`Device`] trait through which the frame pipeline talks to the
//! accelerator, and the [`DeviceError`] type that trait reports.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod traits;

pub use error::DeviceError;
pub use id::{
    ArenaId, CompletionValue, DescriptorId, FrameIndex, HeapId, PipelineId, ResourceId,
    INVALID_OFFSET,
};
pub use traits::Device;
