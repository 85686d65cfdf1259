//! Chunked bump allocation over an injected chunk source.
//!
//! A [`ChunkArena`] owns an ordered list of fixed-size chunks and a bump
//! position `(chunk index, offset)`. Allocations are placed entirely inside
//! one chunk; when the current chunk lacks room the arena moves to the next
//! one, asking its [`ChunkSource`] for a fresh chunk only when it has run
//! past the end of the list. Resets rewind the position and keep every
//! chunk, so a reused arena makes no further source requests.
//!
//! The arena only does offset arithmetic. What a chunk *is* (a host byte
//! block, a range of a device buffer, a run of descriptor slots) is up to
//! the source.

use kiln_core::ArenaId;

use crate::error::ArenaError;

/// Supplier of fixed-size chunks for a [`ChunkArena`].
pub trait ChunkSource {
    /// Handle to one chunk of backing storage.
    type Chunk;

    /// Obtain a chunk of `size` units.
    fn allocate_chunk(&mut self, size: u32) -> Result<Self::Chunk, ArenaError>;

    /// Give back a chunk obtained from [`allocate_chunk`](Self::allocate_chunk).
    fn release_chunk(&mut self, chunk: Self::Chunk) -> Result<(), ArenaError>;
}

/// A copyable bump position of one [`ChunkArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    arena: ArenaId,
    chunk_index: u32,
    offset: u32,
}

impl Marker {
    /// Arena that produced this marker.
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    /// Chunk the position lies in.
    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Offset within that chunk.
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

/// A range carved from one chunk of a [`ChunkArena`].
///
/// Valid until the arena is reset to a position at or before `offset`
/// in `chunk_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BumpAllocation {
    /// Index of the chunk holding the range.
    pub chunk_index: u32,
    /// Start of the range within the chunk.
    pub offset: u32,
    /// Length of the range.
    pub size: u32,
}

/// Bump allocator over a growable list of fixed-size chunks.
pub struct ChunkArena<C> {
    id: ArenaId,
    chunks: Vec<C>,
    chunk_size: u32,
    chunk_index: u32,
    offset: u32,
    /// Maximum of `used_units()` since creation.
    high_water: u64,
}

impl<C> ChunkArena<C> {
    /// Create an arena and reserve `initial_chunk_count` chunks of
    /// `chunk_size` units from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] if `chunk_size` is zero, or the
    /// source's error if a chunk cannot be obtained. Chunks obtained before
    /// the failure are handed back to the source.
    pub fn new<S>(
        chunk_size: u32,
        initial_chunk_count: u32,
        source: &mut S,
    ) -> Result<Self, ArenaError>
    where
        S: ChunkSource<Chunk = C>,
    {
        if chunk_size == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "chunk_size must be non-zero".into(),
            });
        }
        let mut chunks = Vec::with_capacity(initial_chunk_count as usize);
        for _ in 0..initial_chunk_count {
            match source.allocate_chunk(chunk_size) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    for chunk in chunks {
                        if let Err(cleanup) = source.release_chunk(chunk) {
                            tracing::error!(%cleanup, "chunk release failed during arena construction");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self {
            id: ArenaId::next(),
            chunks,
            chunk_size,
            chunk_index: 0,
            offset: 0,
            high_water: 0,
        })
    }

    /// Carve `size` units from the current chunk, moving to the next chunk
    /// if the current one lacks room.
    ///
    /// # Errors
    ///
    /// [`ArenaError::AllocationTooLarge`] if `size` exceeds the chunk size,
    /// or the source's error if a new chunk is needed and cannot be
    /// obtained. On error the bump position is unchanged.
    pub fn allocate<S>(&mut self, size: u32, source: &mut S) -> Result<BumpAllocation, ArenaError>
    where
        S: ChunkSource<Chunk = C>,
    {
        if size > self.chunk_size {
            return Err(ArenaError::AllocationTooLarge {
                requested: size,
                chunk_size: self.chunk_size,
            });
        }

        let (mut chunk_index, mut offset) = (self.chunk_index, self.offset);
        if offset as u64 + size as u64 > self.chunk_size as u64 {
            chunk_index += 1;
            offset = 0;
        }
        while chunk_index as usize >= self.chunks.len() {
            let chunk = source.allocate_chunk(self.chunk_size)?;
            self.chunks.push(chunk);
            tracing::trace!(
                arena = %self.id,
                chunks = self.chunks.len(),
                chunk_size = self.chunk_size,
                "arena grew"
            );
        }

        let allocation = BumpAllocation {
            chunk_index,
            offset,
            size,
        };
        self.chunk_index = chunk_index;
        self.offset = offset + size;
        self.high_water = self.high_water.max(self.used_units());
        Ok(allocation)
    }

    /// The current bump position.
    pub fn marker(&self) -> Marker {
        Marker {
            arena: self.id,
            chunk_index: self.chunk_index,
            offset: self.offset,
        }
    }

    /// Rewind to the start of the first chunk. Chunks are kept.
    pub fn reset(&mut self) {
        self.chunk_index = 0;
        self.offset = 0;
    }

    /// Rewind to `marker`. Everything allocated after the marker was taken
    /// becomes invalid.
    ///
    /// # Errors
    ///
    /// [`ArenaError::ForeignMarker`] if the marker came from another arena.
    pub fn reset_to(&mut self, marker: Marker) -> Result<(), ArenaError> {
        if marker.arena != self.id {
            return Err(ArenaError::ForeignMarker {
                marker_arena: marker.arena,
                arena: self.id,
            });
        }
        self.chunk_index = marker.chunk_index;
        self.offset = marker.offset;
        Ok(())
    }

    /// Hand every chunk back to `source`, consuming the arena.
    ///
    /// Every chunk is offered back even if one is refused; the first
    /// refusal is returned.
    pub fn release_all<S>(self, source: &mut S) -> Result<(), ArenaError>
    where
        S: ChunkSource<Chunk = C>,
    {
        let count = self.chunks.len();
        let mut first_error = None;
        for chunk in self.chunks {
            if let Err(e) = source.release_chunk(chunk) {
                first_error.get_or_insert(e);
            }
        }
        tracing::trace!(arena = %self.id, chunks = count, "arena released");
        first_error.map_or(Ok(()), Err)
    }

    /// Chunk at `index`, if it exists.
    pub fn chunk(&self, index: u32) -> Option<&C> {
        self.chunks.get(index as usize)
    }

    /// Mutable chunk at `index`, if it exists.
    pub fn chunk_mut(&mut self, index: u32) -> Option<&mut C> {
        self.chunks.get_mut(index as usize)
    }

    /// All chunks, in allocation order.
    pub fn chunks(&self) -> &[C] {
        &self.chunks
    }

    /// All chunks, mutably.
    pub fn chunks_mut(&mut self) -> &mut [C] {
        &mut self.chunks
    }

    /// This arena's instance id.
    pub fn id(&self) -> ArenaId {
        self.id
    }

    /// Size of every chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunks currently owned.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Units reserved: chunk count times chunk size.
    pub fn reserved_units(&self) -> u64 {
        self.chunks.len() as u64 * self.chunk_size as u64
    }

    /// Units in use, counting skipped chunk tails as used.
    pub fn used_units(&self) -> u64 {
        self.chunk_index as u64 * self.chunk_size as u64 + self.offset as u64
    }

    /// Highest [`used_units`](Self::used_units) observed since creation.
    pub fn high_water_units(&self) -> u64 {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out sequential chunk numbers and records releases.
    #[derive(Default)]
    struct CountingSource {
        issued: u32,
        released: Vec<u32>,
        limit: Option<u32>,
        refused: Option<u32>,
    }

    impl ChunkSource for CountingSource {
        type Chunk = u32;

        fn allocate_chunk(&mut self, size: u32) -> Result<u32, ArenaError> {
            if self.limit.is_some_and(|limit| self.issued >= limit) {
                return Err(ArenaError::OutOfSpace {
                    requested: size,
                    free: 0,
                    largest: 0,
                });
            }
            self.issued += 1;
            Ok(self.issued - 1)
        }

        fn release_chunk(&mut self, chunk: u32) -> Result<(), ArenaError> {
            if self.refused == Some(chunk) {
                return Err(ArenaError::UnknownAllocation { offset: chunk });
            }
            self.released.push(chunk);
            Ok(())
        }
    }

    #[test]
    fn offsets_increase_within_chunk() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(256, 1, &mut source).unwrap();
        let a = arena.allocate(10, &mut source).unwrap();
        let b = arena.allocate(20, &mut source).unwrap();
        let c = arena.allocate(5, &mut source).unwrap();
        assert_eq!((a.chunk_index, a.offset), (0, 0));
        assert_eq!((b.chunk_index, b.offset), (0, 10));
        assert_eq!((c.chunk_index, c.offset), (0, 30));
        assert_eq!(arena.used_units(), 35);
    }

    #[test]
    fn exact_fit_stays_in_chunk() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(100, 1, &mut source).unwrap();
        arena.allocate(60, &mut source).unwrap();
        let b = arena.allocate(40, &mut source).unwrap();
        assert_eq!((b.chunk_index, b.offset), (0, 60));
        assert_eq!(arena.chunk_count(), 1);
    }

    #[test]
    fn overflow_moves_to_new_chunk() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(100, 1, &mut source).unwrap();
        arena.allocate(60, &mut source).unwrap();
        let b = arena.allocate(41, &mut source).unwrap();
        assert_eq!((b.chunk_index, b.offset), (1, 0));
        assert_eq!(arena.chunk_count(), 2);
        assert_eq!(source.issued, 2);
        assert_eq!(arena.reserved_units(), 200);
    }

    #[test]
    fn zero_initial_chunks_grows_on_first_allocation() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(64, 0, &mut source).unwrap();
        assert_eq!(arena.chunk_count(), 0);
        let a = arena.allocate(8, &mut source).unwrap();
        assert_eq!((a.chunk_index, a.offset), (0, 0));
        assert_eq!(arena.chunk_count(), 1);
    }

    #[test]
    fn too_large_rejected() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(64, 1, &mut source).unwrap();
        let err = arena.allocate(65, &mut source).unwrap_err();
        assert_eq!(
            err,
            ArenaError::AllocationTooLarge {
                requested: 65,
                chunk_size: 64
            }
        );
    }

    #[test]
    fn failed_growth_leaves_position_unchanged() {
        let mut source = CountingSource {
            limit: Some(1),
            ..Default::default()
        };
        let mut arena = ChunkArena::new(64, 1, &mut source).unwrap();
        arena.allocate(60, &mut source).unwrap();
        let before = arena.marker();
        assert!(arena.allocate(10, &mut source).is_err());
        assert_eq!(arena.marker(), before);
        // Still fits in the tail.
        let c = arena.allocate(4, &mut source).unwrap();
        assert_eq!((c.chunk_index, c.offset), (0, 60));
    }

    #[test]
    fn failed_construction_returns_partial_chunks() {
        let mut source = CountingSource {
            limit: Some(2),
            ..Default::default()
        };
        assert!(ChunkArena::<u32>::new(64, 3, &mut source).is_err());
        assert_eq!(source.released, vec![0, 1]);
    }

    #[test]
    fn construction_reports_exhaustion_even_if_a_chunk_is_refused() {
        let mut source = CountingSource {
            limit: Some(3),
            refused: Some(1),
            ..Default::default()
        };
        let err = ChunkArena::<u32>::new(64, 5, &mut source).err();
        assert_eq!(
            err,
            Some(ArenaError::OutOfSpace {
                requested: 64,
                free: 0,
                largest: 0,
            })
        );
        assert_eq!(source.released, vec![0, 2]);
    }

    #[test]
    fn release_all_offers_every_chunk() {
        let mut source = CountingSource {
            refused: Some(0),
            ..Default::default()
        };
        let arena = ChunkArena::new(64, 3, &mut source).unwrap();
        assert_eq!(
            arena.release_all(&mut source),
            Err(ArenaError::UnknownAllocation { offset: 0 })
        );
        assert_eq!(source.released, vec![1, 2]);
    }

    #[test]
    fn marker_round_trip_reuses_offset() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(128, 1, &mut source).unwrap();
        arena.allocate(16, &mut source).unwrap();
        let mark = arena.marker();
        arena.reset_to(arena.marker()).unwrap();
        assert_eq!(arena.marker(), mark);

        let first = arena.allocate(32, &mut source).unwrap();
        arena.reset_to(mark).unwrap();
        let again = arena.allocate(32, &mut source).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn reset_keeps_chunks() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(32, 1, &mut source).unwrap();
        for _ in 0..4 {
            arena.allocate(32, &mut source).unwrap();
        }
        assert_eq!(arena.chunk_count(), 4);
        arena.reset();
        assert_eq!(arena.used_units(), 0);
        for _ in 0..4 {
            arena.allocate(32, &mut source).unwrap();
        }
        assert_eq!(source.issued, 4);
        assert_eq!(arena.high_water_units(), 128);
    }

    #[test]
    fn foreign_marker_rejected() {
        let mut source = CountingSource::default();
        let mut a = ChunkArena::new(32, 1, &mut source).unwrap();
        let b = ChunkArena::new(32, 1, &mut source).unwrap();
        let err = a.reset_to(b.marker()).unwrap_err();
        assert!(matches!(err, ArenaError::ForeignMarker { .. }));
    }

    #[test]
    fn release_all_returns_every_chunk() {
        let mut source = CountingSource::default();
        let mut arena = ChunkArena::new(16, 2, &mut source).unwrap();
        for _ in 0..3 {
            arena.allocate(16, &mut source).unwrap();
        }
        arena.release_all(&mut source).unwrap();
        assert_eq!(source.released, vec![0, 1, 2]);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn allocations_never_overlap(
                sizes in proptest::collection::vec(1u32..=64, 1..60),
            ) {
                let mut source = CountingSource::default();
                let mut arena = ChunkArena::new(64, 1, &mut source).unwrap();
                let mut placed: Vec<BumpAllocation> = Vec::new();
                for &size in &sizes {
                    let a = arena.allocate(size, &mut source).unwrap();
                    prop_assert!(a.offset + a.size <= 64);
                    if let Some(prev) = placed.last() {
                        if prev.chunk_index == a.chunk_index {
                            prop_assert!(a.offset >= prev.offset + prev.size);
                        } else {
                            prop_assert_eq!(a.chunk_index, prev.chunk_index + 1);
                            prop_assert_eq!(a.offset, 0);
                        }
                    }
                    placed.push(a);
                }
            }

            #[test]
            fn reset_to_marker_replays_identically(
                prefix in proptest::collection::vec(1u32..=32, 0..10),
                suffix in proptest::collection::vec(1u32..=32, 1..10),
            ) {
                let mut source = CountingSource::default();
                let mut arena = ChunkArena::new(32, 1, &mut source).unwrap();
                for &size in &prefix {
                    arena.allocate(size, &mut source).unwrap();
                }
                let mark = arena.marker();
                let first: Vec<_> = suffix
                    .iter()
                    .map(|&s| arena.allocate(s, &mut source).unwrap())
                    .collect();
                let issued = source.issued;
                arena.reset_to(mark).unwrap();
                let second: Vec<_> = suffix
                    .iter()
                    .map(|&s| arena.allocate(s, &mut source).unwrap())
                    .collect();
                prop_assert_eq!(first, second);
                prop_assert_eq!(source.issued, issued);
            }
        }
    }
}
