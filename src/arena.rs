//! Step-scoped scratch allocation for the decoding hot path
//!
//! Each decoding step builds a candidate array sized to the vocabulary.
//! Allocating and freeing that array per token would put the allocator on
//! the latency-critical path, so the loop owns one bump arena: the step
//! allocates from it, and a single O(1) `reset` frees everything before
//! the next step. Nothing allocated from the arena survives the step that
//! produced it - the borrow returned by `alloc_slice` ends when the arena
//! is reset.

use bumpalo::Bump;

/// Bump arena for one generation loop's per-step scratch
pub struct StepArena {
    arena: Bump,
    capacity: usize,
}

impl StepArena {
    /// Create an arena with the given initial capacity in bytes
    ///
    /// The arena grows if a step needs more; sizing it to roughly
    /// `12 * n_vocab` bytes avoids growth entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: Bump::with_capacity(capacity),
            capacity,
        }
    }

    /// Allocate a slice of default-initialized values
    ///
    /// The slice is valid until `reset` is called.
    #[inline]
    pub fn alloc_slice<T: Default + Copy>(&self, count: usize) -> &mut [T] {
        self.arena.alloc_slice_fill_default(count)
    }

    /// Allocate a slice initialized from an existing one
    #[inline]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> &mut [T] {
        self.arena.alloc_slice_copy(src)
    }

    /// Free every allocation in O(1)
    #[inline]
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Total bytes currently allocated
    pub fn allocated_bytes(&self) -> usize {
        self.arena.allocated_bytes()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for StepArena {
    fn default() -> Self {
        // 64KB covers small vocabularies without growth; larger ones
        // grow once and then stay put
        Self::new(64 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_slice() {
        let arena = StepArena::new(4096);
        let floats = arena.alloc_slice::<f32>(50);
        assert_eq!(floats.len(), 50);
        assert!(arena.allocated_bytes() > 0);
    }

    #[test]
    fn test_alloc_slice_copy() {
        let arena = StepArena::new(4096);
        let src = [1.0f32, 2.0, 3.0];
        let copied = arena.alloc_slice_copy(&src);
        assert_eq!(copied, &src);
    }

    #[test]
    fn test_reset_reuses_memory() {
        let mut arena = StepArena::new(4096);
        let _ = arena.alloc_slice::<f32>(100);
        let before = arena.allocated_bytes();

        arena.reset();

        let _ = arena.alloc_slice::<f32>(100);
        assert!(arena.allocated_bytes() <= before + 400);
    }
}
