//! Fixed-capacity slot pool.
//!
//! [`SlotPool`] hands out indices `0..capacity` in O(1). The free list is
//! threaded through a `next_free` array with a parallel `is_free` array
//! guarding against double frees; the pooled elements themselves live
//! wherever the caller keeps them.

use crate::error::ArenaError;

const NO_SLOT: u32 = u32::MAX;

/// O(1) allocator of slot indices.
#[derive(Clone, Debug)]
pub struct SlotPool {
    is_free: Vec<bool>,
    next_free: Vec<u32>,
    head: u32,
    free_count: u32,
}

impl SlotPool {
    /// A pool of `capacity` slots, all free.
    pub fn new(capacity: u32) -> Self {
        let mut pool = Self {
            is_free: vec![true; capacity as usize],
            next_free: vec![NO_SLOT; capacity as usize],
            head: NO_SLOT,
            free_count: 0,
        };
        pool.reset();
        pool
    }

    /// Take a free slot. Slots are reused most-recently-freed first.
    ///
    /// # Errors
    ///
    /// [`ArenaError::PoolExhausted`] if every slot is in use.
    pub fn allocate(&mut self) -> Result<u32, ArenaError> {
        if self.head == NO_SLOT {
            return Err(ArenaError::PoolExhausted {
                capacity: self.capacity(),
            });
        }
        let index = self.head;
        let slot = index as usize;
        self.head = self.next_free[slot];
        self.next_free[slot] = NO_SLOT;
        self.is_free[slot] = false;
        self.free_count -= 1;
        Ok(index)
    }

    /// Return `index` to the pool.
    ///
    /// # Errors
    ///
    /// [`ArenaError::SlotOutOfRange`] for an index outside the pool,
    /// [`ArenaError::SlotNotAllocated`] if the slot is already free.
    pub fn free(&mut self, index: u32) -> Result<(), ArenaError> {
        let slot = index as usize;
        if slot >= self.is_free.len() {
            return Err(ArenaError::SlotOutOfRange {
                index,
                capacity: self.capacity(),
            });
        }
        if self.is_free[slot] {
            return Err(ArenaError::SlotNotAllocated { index });
        }
        self.is_free[slot] = true;
        self.next_free[slot] = self.head;
        self.head = index;
        self.free_count += 1;
        Ok(())
    }

    /// Mark every slot free. Slots are then handed out in index order.
    pub fn reset(&mut self) {
        let capacity = self.capacity();
        for (i, next) in self.next_free.iter_mut().enumerate() {
            let following = i as u32 + 1;
            *next = if following < capacity { following } else { NO_SLOT };
        }
        self.is_free.fill(true);
        self.head = if capacity > 0 { 0 } else { NO_SLOT };
        self.free_count = capacity;
    }

    /// Whether `index` is currently handed out.
    pub fn is_allocated(&self, index: u32) -> bool {
        self.is_free.get(index as usize).is_some_and(|&free| !free)
    }

    /// Total number of slots.
    pub fn capacity(&self) -> u32 {
        self.is_free.len() as u32
    }

    /// Slots available.
    pub fn free_count(&self) -> u32 {
        self.free_count
    }

    /// Slots handed out.
    pub fn in_use(&self) -> u32 {
        self.capacity() - self.free_count
    }
}
