//! Per-frame transient memory arena.
//!
//! A bump allocator for short-lived per-frame allocations (staging scratch,
//! temporary arrays built while recording a frame). The frame loop driver
//! calls [`FrameArena::reset`] exactly once per iteration, after present, so
//! anything allocated from the arena is valid for at most one frame.

use tracing::{debug, warn};

/// Default arena capacity (64 KiB), enough for per-frame scratch data.
pub const DEFAULT_ARENA_CAPACITY: usize = 64 * 1024;

/// Bump allocator reset once per frame.
///
/// Allocations are plain byte slices carved from a fixed backing buffer.
/// There is no per-allocation free; `reset` reclaims everything at once.
pub struct FrameArena {
    storage: Vec<u8>,
    offset: usize,
    /// High-water mark across the arena's lifetime, for sizing diagnostics.
    peak: usize,
}

impl FrameArena {
    /// Create an arena with the given capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        debug!("Created frame arena: {} bytes", capacity);
        Self {
            storage: vec![0; capacity],
            offset: 0,
            peak: 0,
        }
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// Returns `None` when the arena is exhausted for this frame; callers
    /// fall back to a heap allocation in that case rather than failing the
    /// frame.
    pub fn alloc(&mut self, size: usize, align: usize) -> Option<&mut [u8]> {
        debug_assert!(align.is_power_of_two());

        let start = (self.offset + align - 1) & !(align - 1);
        let end = start.checked_add(size)?;
        if end > self.storage.len() {
            warn!(
                "Frame arena exhausted: {} requested, {} remaining",
                size,
                self.storage.len() - self.offset
            );
            return None;
        }

        self.offset = end;
        self.peak = self.peak.max(end);
        Some(&mut self.storage[start..end])
    }

    /// Number of bytes currently in use this frame.
    #[inline]
    pub fn used(&self) -> usize {
        self.offset
    }

    /// Total arena capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Highest usage observed since creation.
    #[inline]
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Reclaim all allocations made this frame.
    ///
    /// Must be called once per frame-loop iteration, after present. Any
    /// slice previously handed out is invalidated by the borrow rules before
    /// this can be called.
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_reset() {
        let mut arena = FrameArena::new(128);
        {
            let a = arena.alloc(32, 1).unwrap();
            assert_eq!(a.len(), 32);
        }
        assert_eq!(arena.used(), 32);

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.peak(), 32);
    }

    #[test]
    fn test_alignment() {
        let mut arena = FrameArena::new(128);
        arena.alloc(3, 1).unwrap();
        arena.alloc(8, 16).unwrap();
        // 3 rounded up to 16, plus 8
        assert_eq!(arena.used(), 24);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut arena = FrameArena::new(16);
        assert!(arena.alloc(16, 1).is_some());
        assert!(arena.alloc(1, 1).is_none());
        arena.reset();
        assert!(arena.alloc(16, 1).is_some());
    }
}
