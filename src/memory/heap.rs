//! Heap allocator backed by a `bumpalo` arena.

use std::alloc::Layout;
use std::cell::Cell;

use bumpalo::Bump;
use eyre::Result;

use super::{check_align, Allocator};
use crate::error::MapError;

/// Arena allocator for records that do not live in a mapping.
///
/// Blocks are zero-filled. `free` only updates the live-byte count; the
/// memory is released all at once by [`reset`] or when the allocator is
/// dropped.
///
/// [`reset`]: HeapAllocator::reset
#[derive(Debug, Default)]
pub struct HeapAllocator {
    arena: Bump,
    allocated: Cell<usize>,
    freed: Cell<usize>,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            arena: Bump::with_capacity(bytes),
            allocated: Cell::new(0),
            freed: Cell::new(0),
        }
    }

    /// Sum of the sizes of the blocks handed out since the last reset.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.get()
    }

    /// Bytes handed out and not yet freed.
    pub fn live_bytes(&self) -> usize {
        self.allocated.get() - self.freed.get()
    }

    /// Bytes reserved from the system by the arena, including slack.
    pub fn arena_capacity(&self) -> usize {
        self.arena.allocated_bytes()
    }

    /// Frees every block. Requires exclusive access, so no block can still be
    /// borrowed.
    pub fn reset(&mut self) {
        self.arena.reset();
        self.allocated.set(0);
        self.freed.set(0);
    }
}

impl Allocator for HeapAllocator {
    #[allow(clippy::mut_from_ref)]
    fn allocate(&self, size: usize, align: usize) -> Result<&mut [u8]> {
        check_align(align)?;
        let layout = Layout::from_size_align(size, align)
            .map_err(|e| MapError::InvalidArgument(format!("bad block layout: {e}")))?;

        let ptr = self
            .arena
            .try_alloc_layout(layout)
            .map_err(|_| MapError::OutOfMemory {
                requested: size,
                available: 0,
            })?;

        // SAFETY:
        // 1. `ptr` points to `size` writable bytes reserved for this call only;
        //    bumpalo never hands out the same bytes twice before a reset.
        // 2. The bytes are zeroed before the slice is formed, so the slice
        //    never exposes uninitialized memory.
        // 3. The slice borrows `self`, and `reset` needs `&mut self`, so the
        //    arena cannot be recycled while the slice is alive.
        let block = unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
            std::slice::from_raw_parts_mut(ptr.as_ptr(), size)
        };

        self.allocated.set(self.allocated.get() + size);
        Ok(block)
    }

    fn free(&self, block: &mut [u8]) -> Result<()> {
        if block.len() > self.live_bytes() {
            return Err(MapError::InvalidArgument(format!(
                "freeing {} bytes but only {} are live",
                block.len(),
                self.live_bytes()
            ))
            .into());
        }
        self.freed.set(self.freed.get() + block.len());
        Ok(())
    }
}
