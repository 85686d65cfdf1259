//! Strongly-typed identifiers shared across the Kiln workspace.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel offset meaning "not allocated".
///
/// Every allocation handle in Kiln stores a plain `u32` offset; a handle
/// whose offset equals this value is invalid and must not be written,
/// resolved, or freed.
pub const INVALID_OFFSET: u32 = u32::MAX;

/// Counter for unique [`HeapId`] allocation.
static HEAP_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Counter for unique [`ArenaId`] allocation.
static ARENA_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a free-list suballocator.
///
/// Every handle produced by a suballocator records the id of the
/// suballocator that produced it, so returning a handle to the wrong
/// heap is detected instead of corrupting the other heap's free list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u64);

impl HeapId {
    /// Placeholder id carried by invalid handles. Never returned by
    /// [`HeapId::next`].
    pub const NONE: Self = Self(0);

    /// Allocate a fresh, unique heap id.
    ///
    /// Each call returns an id that has never been returned before within
    /// this process.
    pub fn next() -> Self {
        Self(HEAP_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "heap#{}", self.0)
    }
}

/// Unique per-instance identifier for a bump arena.
///
/// Markers carry the id of the arena that produced them; resetting an
/// arena to another arena's marker is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u64);

impl ArenaId {
    /// Allocate a fresh, unique arena id.
    pub fn next() -> Self {
        Self(ARENA_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena#{}", self.0)
    }
}

/// Index of a frame slot within the in-flight ring.
///
/// Ranges over `0..frames_in_flight`. Slots are reused round-robin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameIndex(pub u32);

impl FrameIndex {
    /// The index as a `usize`, for slot table lookups.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FrameIndex {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// A value on the device completion counter.
///
/// The host increments its submission counter once per frame and signals
/// the new value; the device advances its completed value as it retires
/// work. Monotonically increasing; never wraps in practice (u64 overflow at
/// 1000 frames per second would take ~584 million years).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionValue(pub u64);

impl CompletionValue {
    /// The initial value: nothing has been submitted yet.
    pub const ZERO: Self = Self(0);

    /// The value following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Whether a device that has completed `self` has also completed `target`.
    pub fn has_reached(self, target: CompletionValue) -> bool {
        self.0 >= target.0
    }
}

impl fmt::Display for CompletionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CompletionValue {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Index of a slot in a descriptor table.
///
/// Shaders address descriptors by this index; [`DescriptorId::INVALID`]
/// marks an unallocated slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub u32);

impl DescriptorId {
    /// Sentinel id for "no descriptor".
    pub const INVALID: Self = Self(INVALID_OFFSET);

    /// Whether this id refers to an allocated slot.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// The id `count` slots after this one.
    pub fn offset(self, count: u32) -> Self {
        Self(self.0 + count)
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "invalid")
        }
    }
}

/// Opaque handle to a device pipeline state object owned by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u64);

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline#{}", self.0)
    }
}

/// Opaque handle to a raw device resource (texture, buffer, acceleration
/// structure) owned by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_ids_are_unique() {
        let a = HeapId::next();
        let b = HeapId::next();
        assert_ne!(a, b);
        assert_ne!(a, HeapId::NONE);
    }

    #[test]
    fn arena_ids_are_unique() {
        let a = ArenaId::next();
        let b = ArenaId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn completion_value_ordering() {
        let v = CompletionValue(3);
        assert_eq!(v.next(), CompletionValue(4));
        assert!(v.has_reached(CompletionValue(3)));
        assert!(v.has_reached(CompletionValue::ZERO));
        assert!(!v.has_reached(CompletionValue(4)));
    }

    #[test]
    fn descriptor_id_sentinel() {
        assert!(!DescriptorId::INVALID.is_valid());
        assert!(DescriptorId(0).is_valid());
        assert_eq!(DescriptorId(7).offset(3), DescriptorId(10));
        assert_eq!(DescriptorId::INVALID.to_string(), "invalid");
    }

    #[test]
    fn display_formats() {
        assert_eq!(FrameIndex(2).to_string(), "2");
        assert_eq!(PipelineId(9).to_string(), "pipeline#9");
        assert_eq!(ResourceId(4).to_string(), "resource#4");
    }
}
