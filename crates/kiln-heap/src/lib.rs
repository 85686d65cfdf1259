//! Device buffer heaps and descriptor tables for Kiln.
//!
//! Both heap kinds own one capacity-bounded device object and carve it into
//! persistent ranges with a free-list suballocator from `kiln-arena`. Each
//! also serves as the chunk source for a scratch heap: a bump arena whose
//! chunks are persistent ranges of the parent, reset once per frame.
//!
//! ```text
//! BufferHeap          ── ScratchBufferHeap      (byte offsets)
//! DescriptorHeap × 3  ── ScratchDescriptorHeap  (slot ids)
//! ResourcePool<R>                               (pre-created resources)
//! ```
//!
//! Freeing through a heap is immediate. While frames are in flight,
//! release through the frame pipeline so the device is done with a range
//! before it is reused.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod pool;
pub mod scratch;

pub use buffer::BufferHeap;
pub use config::{BufferHeapConfig, DescriptorHeapConfig};
pub use descriptor::{
    CpuDescriptorHandle, DescriptorAllocation, DescriptorHeap, DescriptorHeapKind, DescriptorRange,
    GpuDescriptorHandle, ViewDescriptor,
};
pub use diagnostics::HeapDiagnostics;
pub use error::HeapError;
pub use pool::{PooledResource, ResourcePool};
pub use scratch::{ScratchAllocation, ScratchBufferHeap, ScratchDescriptorHeap};
