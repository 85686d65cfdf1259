//! Scoped stack allocation over a host bump arena.
//!
//! A [`StackAllocator`] can only be allocated from through a [`StackScope`].
//! The scope records the arena's marker when it is opened and rewinds to it
//! when dropped, so everything allocated inside a scope is reclaimed on
//! every exit path: normal return, early return, `?`, or unwinding.
//!
//! ```
//! use kiln_arena::{ArenaConfig, StackAllocator};
//!
//! let mut stack = StackAllocator::new(&ArenaConfig::new(4096)).unwrap();
//! {
//!     let mut scope = stack.scope();
//!     let indices = scope.allocate::<u32>(64).unwrap();
//!     indices[0] = 7;
//! }
//! assert_eq!(stack.used_bytes(), 0);
//! ```

use bytemuck::Pod;

use crate::chunk::Marker;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::host::LinearAllocator;

/// Host bump arena whose allocations are bound to lexical scopes.
pub struct StackAllocator {
    inner: LinearAllocator,
}

impl StackAllocator {
    /// Create a stack allocator and reserve its initial chunks.
    pub fn new(config: &ArenaConfig) -> Result<Self, ArenaError> {
        Ok(Self {
            inner: LinearAllocator::new(config)?,
        })
    }

    /// Open a scope. Memory allocated through it is reclaimed when it drops.
    pub fn scope(&mut self) -> StackScope<'_> {
        StackScope::open(&mut self.inner)
    }

    /// Bytes currently in use. Zero whenever no scope is open.
    pub fn used_bytes(&self) -> u64 {
        self.inner.used_bytes()
    }

    /// Bytes reserved across all chunks.
    pub fn reserved_bytes(&self) -> u64 {
        self.inner.reserved_bytes()
    }

    /// Deepest usage reached since creation.
    pub fn high_water_bytes(&self) -> u64 {
        self.inner.high_water_bytes()
    }
}

/// An open allocation scope of a [`StackAllocator`].
pub struct StackScope<'a> {
    allocator: &'a mut LinearAllocator,
    marker: Marker,
}

impl<'a> StackScope<'a> {
    fn open(allocator: &'a mut LinearAllocator) -> Self {
        let marker = allocator.marker();
        Self { allocator, marker }
    }

    /// Allocate `size` uninitialised-content bytes aligned to `alignment`.
    pub fn allocate_bytes(&mut self, size: u32, alignment: u32) -> Result<&mut [u8], ArenaError> {
        let allocation = self.allocator.allocate_raw(size, alignment)?;
        Ok(self.allocator.bytes_mut(&allocation))
    }

    /// Allocate a zeroed slice of `count` values of `T`.
    pub fn allocate<T: Pod>(&mut self, count: usize) -> Result<&mut [T], ArenaError> {
        self.allocator.allocate_slice(count)
    }

    /// Copy `data` into the scope and return the copy.
    pub fn write_temporary<T: Pod>(&mut self, data: &[T]) -> Result<&mut [T], ArenaError> {
        let allocation = self.allocator.write_temporary(data)?;
        Ok(bytemuck::cast_slice_mut(self.allocator.bytes_mut(&allocation)))
    }

    /// Open a nested scope. It must drop before this scope can allocate
    /// again.
    pub fn scope(&mut self) -> StackScope<'_> {
        StackScope::open(self.allocator)
    }

    /// Bytes in use by the whole stack, including enclosing scopes.
    pub fn used_bytes(&self) -> u64 {
        self.allocator.used_bytes()
    }
}

impl Drop for StackScope<'_> {
    fn drop(&mut self) {
        // The marker was taken from this allocator, so the reset cannot fail.
        let restored = self.allocator.reset_to(self.marker);
        debug_assert!(restored.is_ok());
    }
}
