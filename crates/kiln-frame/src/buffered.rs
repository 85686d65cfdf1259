//! Per-slot copies of a value.

use std::ops::{Index, IndexMut};

use kiln_core::FrameIndex;

/// One `T` per frame slot.
///
/// For host-written data the device reads during a frame (constant
/// buffers, indirect arguments): writing the current slot's copy never
/// races with the device reading another slot's.
#[derive(Clone, Debug)]
pub struct FrameBuffered<T> {
    values: Vec<T>,
}

impl<T> FrameBuffered<T> {
    /// `frames_in_flight` values produced by `init`.
    pub fn new(frames_in_flight: u32, mut init: impl FnMut(FrameIndex) -> T) -> Self {
        Self {
            values: (0..frames_in_flight).map(|i| init(FrameIndex(i))).collect(),
        }
    }

    /// Number of copies.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no copies.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every copy, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Every copy, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.values.iter_mut()
    }
}

impl<T: Clone> FrameBuffered<T> {
    /// `frames_in_flight` copies of `value`.
    pub fn splat(frames_in_flight: u32, value: T) -> Self {
        Self {
            values: vec![value; frames_in_flight as usize],
        }
    }
}

impl<T> Index<FrameIndex> for FrameBuffered<T> {
    type Output = T;

    fn index(&self, index: FrameIndex) -> &T {
        &self.values[index.as_usize()]
    }
}

impl<T> IndexMut<FrameIndex> for FrameBuffered<T> {
    fn index_mut(&mut self, index: FrameIndex) -> &mut T {
        &mut self.values[index.as_usize()]
    }
}
