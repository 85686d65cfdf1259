//! Kiln: GPU memory and descriptor management for a real-time renderer.
//!
//! This is the facade crate that re-exports the public API of every Kiln
//! sub-crate.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use kiln::prelude::*;
//!
//! let mut heaps = RenderHeaps::with_buffer_size(8 * 1024 * 1024).unwrap();
//! let device = ThreadedTimeline::new(Duration::ZERO).unwrap();
//! let mut pipeline = FramePipeline::new(FrameConfig::default(), device, &mut heaps).unwrap();
//!
//! for _ in 0..3 {
//!     let mut frame = pipeline.begin(&mut heaps).unwrap();
//!     let _constants = frame.write_scratch(&[1.0f32, 0.0, 0.0, 1.0]).unwrap();
//!     let mut mesh = frame.allocate_buffer(4096, 256).unwrap();
//!     // Freed once the device has finished with this frame.
//!     frame.safe_release(&mut mesh);
//!     pipeline.end().unwrap();
//! }
//!
//! pipeline.shutdown(&mut heaps).unwrap();
//! assert_eq!(heaps.buffers.diagnostics().used, 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `kiln-core` | IDs, `DeviceError`, the `Device` trait |
//! | [`arena`] | `kiln-arena` | Bump arenas, stack scopes, free-list suballocators, slot pools |
//! | [`heap`] | `kiln-heap` | Buffer heaps, descriptor tables, scratch heaps, resource pools |
//! | [`frame`] | `kiln-frame` | Frame pipeline, deferred reclamation, timing, device timeline |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers and the host/device boundary (`kiln-core`).
pub use kiln_core as types;

/// Allocation primitives (`kiln-arena`).
///
/// [`arena::LinearAllocator`] and [`arena::StackAllocator`] for host
/// scratch memory, [`arena::Suballocator`] for offset ranges.
pub use kiln_arena as arena;

/// Device heaps (`kiln-heap`).
///
/// [`heap::BufferHeap`] and [`heap::DescriptorHeap`] own persistent
/// ranges; their scratch counterparts are reset every frame.
pub use kiln_heap as heap;

/// Frame pipeline (`kiln-frame`).
pub use kiln_frame as frame;

/// Common imports for typical Kiln usage.
pub mod prelude {
    // Core
    pub use kiln_core::{
        CompletionValue, DescriptorId, Device, DeviceError, FrameIndex, PipelineId, ResourceId,
    };

    // Allocators
    pub use kiln_arena::{
        ArenaConfig, ArenaError, LinearAllocator, StackAllocator, StackScope, SubAllocation,
    };

    // Heaps
    pub use kiln_heap::{
        BufferHeap, BufferHeapConfig, DescriptorAllocation, DescriptorHeap, DescriptorHeapConfig,
        DescriptorHeapKind, DescriptorRange, HeapDiagnostics, HeapError, ScratchAllocation,
        ViewDescriptor,
    };

    // Frames
    pub use kiln_frame::{
        FrameBuffered, FrameConfig, FrameContext, FrameError, FramePipeline, RenderHeaps,
        ThreadedTimeline,
    };
}
