//! # Scratch Arena
//!
//! Caller-owned bump arena used by the record codec for memory it cannot take
//! from the stack: offsets arrays wider than the inline capacity and record
//! copies. The codec only ever allocates from an arena it was handed; it never
//! frees individual allocations. The caller releases everything at once with
//! [`ScratchArena::reset`] (or by dropping the arena).
//!
//! ## Usage
//!
//! ```ignore
//! let mut arena = ScratchArena::new();
//! let mut offsets = RecOffsets::with_arena(&arena);
//! compute_offsets(rec, &schema, &mut offsets);
//! // ... access burst ...
//! drop(offsets);
//! arena.reset();
//! ```
//!
//! ## Thread Safety
//!
//! `ScratchArena` is `Send` but not `Sync`: each call site owns its own arena
//! or serializes reuse explicitly.

use bumpalo::Bump;

#[derive(Debug, Default)]
pub struct ScratchArena {
    bump: Bump,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bump: Bump::with_capacity(bytes),
        }
    }

    /// Allocates `n` zeroed bytes that live until the next [`reset`](Self::reset).
    pub fn allocate(&self, n: usize) -> &mut [u8] {
        self.bump.alloc_slice_fill_copy(n, 0u8)
    }

    pub(crate) fn allocate_words(&self, n: usize) -> &mut [u32] {
        self.bump.alloc_slice_fill_copy(n, 0u32)
    }

    pub(crate) fn copy_bytes(&self, src: &[u8]) -> &mut [u8] {
        self.bump.alloc_slice_copy(src)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Releases every allocation in bulk.
    pub fn reset(&mut self) {
        self.bump.reset();
    }
}
