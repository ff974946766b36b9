//! Backing arenas for the slab layer.
//!
//! An [`Arena`] supplies contiguous address ranges to [`super::cache::Cache`]
//! when it needs a new slab; the slab layer never allocates memory directly.
//! A real kernel would plug in a physical-page arena here (out of scope —
//! hardware driver portability is a non-goal); hosted builds and tests use
//! [`HeapArena`], which defers straight to the global allocator.

use core::alloc::Layout;
use core::ptr::NonNull;

/// A source of fixed-size contiguous allocations for the slab layer.
pub trait Arena: Send + Sync {
    /// Allocate `size` bytes, aligned to `align`. Returns `None` on exhaustion.
    fn alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>>;

    /// Return a range previously obtained from [`Arena::alloc`] with the same
    /// `size`/`align`.
    fn free(&self, ptr: NonNull<u8>, size: usize, align: usize);
}

/// An arena backed directly by the global (heap) allocator.
pub struct HeapArena;

impl Arena for HeapArena {
    fn alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(size, align).ok()?;
        // SAFETY: layout has non-zero size, validated above by from_size_align.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr)
    }

    fn free(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        let layout = Layout::from_size_align(size, align)
            .expect("HeapArena::free: size/align mismatched original allocation");
        // SAFETY: caller guarantees `ptr`/`size`/`align` match a prior `alloc`.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_arena_roundtrip() {
        let arena = HeapArena;
        let ptr = arena.alloc(64, 8).expect("alloc failed");
        unsafe {
            ptr.as_ptr().write_bytes(0xAA, 64);
        }
        arena.free(ptr, 64, 8);
    }
}
