//! # Block Allocators
//!
//! The overlay engine never allocates on its own: every operation that needs
//! fresh memory takes an [`Allocator`] argument, and the allocator that
//! produced a block is the only owner of it. Overlays borrow blocks and never
//! free them.
//!
//! ## Allocators
//!
//! ```text
//! ┌───────────────────────┬───────────────────────────────────────────┐
//! │ HeapAllocator         │ bumpalo arena on the process heap.        │
//! │                       │ Zero-filled blocks, reclaimed together by │
//! │                       │ reset() or drop.                          │
//! ├───────────────────────┼───────────────────────────────────────────┤
//! │ MmapAllocator<'m>     │ Bump pointer inside a borrowed mapped     │
//! │                       │ region. Blocks keep whatever the mapping  │
//! │                       │ holds and live as long as the mapping.    │
//! └───────────────────────┴───────────────────────────────────────────┘
//! ```
//!
//! ## Lifetimes
//!
//! `allocate` hands out `&mut [u8]` tied to the allocator's borrow, so a block
//! cannot outlive its allocator, and `HeapAllocator::reset` (which needs
//! `&mut self`) cannot run while any block is still referenced. Blocks returned
//! by one allocator never overlap.
//!
//! ## Freeing
//!
//! `free` hands a block back to the allocator that produced it. Both allocators are bump allocators, so a freed block
//! only leaves the live-byte accounting: its memory is reused after
//! `HeapAllocator::reset`, and never for `MmapAllocator`, whose bytes belong
//! to the mapping.

mod heap;
mod mmap_bump;

pub use heap::HeapAllocator;
pub use mmap_bump::MmapAllocator;

use eyre::Result;

use crate::error::MapError;

/// Source of raw memory blocks for the overlay engine.
pub trait Allocator {
    /// Returns a block of exactly `size` bytes whose address is a multiple of
    /// `align`. `align` must be a power of two.
    #[allow(clippy::mut_from_ref)]
    fn allocate(&self, size: usize, align: usize) -> Result<&mut [u8]>;

    /// Releases a block returned by `allocate`. Fails with `InvalidArgument`
    /// when the allocator can tell the block is not one of its own.
    fn free(&self, block: &mut [u8]) -> Result<()>;
}

impl<A: Allocator + ?Sized> Allocator for &A {
    #[allow(clippy::mut_from_ref)]
    fn allocate(&self, size: usize, align: usize) -> Result<&mut [u8]> {
        (**self).allocate(size, align)
    }

    fn free(&self, block: &mut [u8]) -> Result<()> {
        (**self).free(block)
    }
}

pub(crate) fn check_align(align: usize) -> Result<()> {
    if !align.is_power_of_two() {
        return Err(MapError::InvalidArgument(format!(
            "alignment {align} is not a power of two"
        ))
        .into());
    }
    Ok(())
}
