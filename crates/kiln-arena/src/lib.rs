//! Allocation primitives for Kiln GPU memory management.
//!
//! Everything here works on plain offsets; the heaps in `kiln-heap` decide
//! what an offset addresses (host bytes, device buffer bytes, descriptor
//! table slots).
//!
//! # Architecture
//!
//! ```text
//! ChunkArena<C>          bump position over chunks from a ChunkSource
//! ├── LinearAllocator    host byte chunks (per-frame CPU scratch)
//! │   └── StackAllocator scope-bound marker restore
//! Suballocator<A>        aligned, validated handles over a FreeListAlgorithm
//! ├── BestFit            smallest fitting range
//! └── FirstFit           lowest fitting offset
//! SlotPool               fixed-capacity O(1) index pool
//! ```
//!
//! No type here is thread-safe for concurrent mutation; each is owned by
//! the single submission thread.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod align;
pub mod chunk;
pub mod compliance;
pub mod config;
pub mod error;
pub mod freelist;
pub mod host;
pub mod pool;
pub mod stack;

pub use chunk::{BumpAllocation, ChunkArena, ChunkSource, Marker};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use freelist::{BestFit, FirstFit, FreeListAlgorithm, FreeRange, SubAllocation, Suballocator};
pub use host::{HostAllocation, HostChunk, HostChunkSource, LinearAllocator, MAX_HOST_ALIGNMENT};
pub use pool::SlotPool;
pub use stack::{StackAllocator, StackScope};
