//! Pools of pre-created resources.
//!
//! Passes that need a temporary resource of a fixed shape (an intermediate
//! read-write texture, a readback buffer) borrow one from a
//! [`ResourcePool`] and hand it back by dropping the guard. The pool never
//! creates resources after construction; running out is an error.

use std::cell::RefCell;
use std::ops::Deref;

use kiln_arena::{ArenaError, SlotPool};

use crate::error::HeapError;

/// Fixed set of resources handed out one guard at a time.
pub struct ResourcePool<R> {
    resources: Vec<R>,
    slots: RefCell<SlotPool>,
}

impl<R> ResourcePool<R> {
    /// Pool over `resources`.
    pub fn new(resources: Vec<R>) -> Self {
        let slots = SlotPool::new(resources.len() as u32);
        Self {
            resources,
            slots: RefCell::new(slots),
        }
    }

    /// Pool of `count` resources produced by `create`.
    pub fn from_fn(count: u32, create: impl FnMut(u32) -> R) -> Self {
        Self::new((0..count).map(create).collect())
    }

    /// Check out a resource. It returns to the pool when the guard drops.
    ///
    /// # Errors
    ///
    /// [`HeapError::PoolExhausted`] if every resource is checked out.
    pub fn acquire(&self) -> Result<PooledResource<'_, R>, HeapError> {
        let index = self.slots.borrow_mut().allocate().map_err(|e| match e {
            ArenaError::PoolExhausted { capacity } => HeapError::PoolExhausted { capacity },
            other => HeapError::Arena(other),
        })?;
        Ok(PooledResource { pool: self, index })
    }

    /// Number of resources in the pool.
    pub fn capacity(&self) -> u32 {
        self.resources.len() as u32
    }

    /// Resources not checked out.
    pub fn available(&self) -> u32 {
        self.slots.borrow().free_count()
    }

    /// Every resource, checked out or not. Used to destroy the pool's
    /// contents at shutdown.
    pub fn into_resources(self) -> Vec<R> {
        self.resources
    }
}

/// A checked-out pool resource.
pub struct PooledResource<'a, R> {
    pool: &'a ResourcePool<R>,
    index: u32,
}

impl<R> PooledResource<'_, R> {
    /// Index of the resource within its pool.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<R> Deref for PooledResource<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.pool.resources[self.index as usize]
    }
}

impl<R> Drop for PooledResource<'_, R> {
    fn drop(&mut self) {
        let returned = self.pool.slots.borrow_mut().free(self.index);
        debug_assert!(returned.is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::ResourceId;

    #[test]
    fn acquire_and_return() {
        let pool = ResourcePool::from_fn(2, |i| ResourceId(100 + i as u64));
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(*a, *b);
        assert_eq!(pool.available(), 0);
        assert_eq!(
            pool.acquire().err(),
            Some(HeapError::PoolExhausted { capacity: 2 })
        );
        drop(a);
        assert_eq!(pool.available(), 1);
        let c = pool.acquire().unwrap();
        assert_eq!(*c, ResourceId(100));
        drop(b);
        drop(c);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn guard_returns_on_early_exit() {
        fn use_one(pool: &ResourcePool<u32>, fail: bool) -> Result<u32, HeapError> {
            let texture = pool.acquire()?;
            if fail {
                return Err(HeapError::EmptyTableSlot {
                    id: kiln_core::DescriptorId(0),
                });
            }
            Ok(*texture)
        }

        let pool = ResourcePool::new(vec![7u32]);
        assert!(use_one(&pool, true).is_err());
        assert_eq!(use_one(&pool, false), Ok(7));
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.into_resources(), vec![7]);
    }
}
