//! # Mapped-Region Bump Allocator
//!
//! Carves blocks out of a mapped region, typically a window's `view_mut()`.
//! The allocator keeps a single offset that only moves forward:
//!
//! ```text
//! region: |hdr|payload|pad|hdr|payload|.............................|
//!         0                            ^ used                        len
//! ```
//!
//! Freeing a block only counts its bytes as released; the region is never
//! reused. Blocks are not zeroed either: a block
//! carved from a file-backed mapping shows the bytes already stored there,
//! which is what makes reopening a store and re-overlaying its records work.

use std::cell::Cell;
use std::marker::PhantomData;

use eyre::Result;
use tracing::trace;

use super::{check_align, Allocator};
use crate::error::MapError;

pub struct MmapAllocator<'m> {
    base: *mut u8,
    len: usize,
    used: Cell<usize>,
    freed: Cell<usize>,
    _region: PhantomData<&'m mut [u8]>,
}

impl<'m> MmapAllocator<'m> {
    /// Allocates from the start of `region`.
    pub fn new(region: &'m mut [u8]) -> Self {
        Self::resume(region, 0)
    }

    /// Allocates from `region`, treating its first `used` bytes as taken.
    /// Used to continue allocating after reopening a store.
    pub fn resume(region: &'m mut [u8], used: usize) -> Self {
        let len = region.len();
        Self {
            base: region.as_mut_ptr(),
            len,
            used: Cell::new(used.min(len)),
            freed: Cell::new(0),
            _region: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.len
    }

    pub fn used(&self) -> usize {
        self.used.get()
    }

    pub fn remaining(&self) -> usize {
        self.len - self.used.get()
    }

    /// Bytes of blocks released through `free`.
    pub fn freed_bytes(&self) -> usize {
        self.freed.get()
    }

    /// Offset of `block` from the start of the region, if it lies inside it.
    pub fn offset_of(&self, block: &[u8]) -> Option<usize> {
        let start = self.base as usize;
        let addr = block.as_ptr() as usize;
        (addr >= start && addr + block.len() <= start + self.len).then(|| addr - start)
    }
}

impl std::fmt::Debug for MmapAllocator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapAllocator")
            .field("capacity", &self.len)
            .field("used", &self.used.get())
            .field("freed", &self.freed.get())
            .finish()
    }
}

impl Allocator for MmapAllocator<'_> {
    #[allow(clippy::mut_from_ref)]
    fn allocate(&self, size: usize, align: usize) -> Result<&mut [u8]> {
        check_align(align)?;

        let used = self.used.get();
        let addr = self.base as usize + used;
        let pad = (align - addr % align) % align;

        let start = used + pad;
        let end = match start.checked_add(size) {
            Some(end) if end <= self.len => end,
            _ => {
                return Err(MapError::OutOfMemory {
                    requested: size,
                    available: self.len - used,
                }
                .into())
            }
        };

        self.used.set(end);
        trace!(offset = start, size, "bump allocated block in mapped region");

        // SAFETY:
        // 1. `start..end` lies inside the region borrowed mutably for 'm.
        // 2. `used` only grows, so the range was never handed out before and
        //    does not overlap any live block.
        // 3. Mapped bytes are always initialized.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.base.add(start), size) })
    }

    fn free(&self, block: &mut [u8]) -> Result<()> {
        match self.offset_of(block) {
            Some(offset) if offset + block.len() <= self.used.get() => {
                self.freed.set(self.freed.get() + block.len());
                trace!(offset, size = block.len(), "released block in mapped region");
                Ok(())
            }
            _ => Err(MapError::InvalidArgument(
                "block was not allocated from this region".to_string(),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_respects_alignment() {
        let mut region = vec![0u64; 32];
        let bytes = zerocopy::IntoBytes::as_mut_bytes(region.as_mut_slice());
        let alloc = MmapAllocator::new(bytes);

        let a = alloc.allocate(3, 1).unwrap();
        let a_offset = alloc.offset_of(a).unwrap();
        let b = alloc.allocate(8, 8).unwrap();

        assert_eq!(a_offset, 0);
        assert_eq!(alloc.offset_of(b), Some(8));
        assert_eq!(alloc.used(), 16);
    }

    #[test]
    fn exhaustion_reports_available_bytes() {
        let mut region = [0u8; 64];
        let alloc = MmapAllocator::new(&mut region);
        alloc.allocate(60, 1).unwrap();

        let err = alloc.allocate(8, 1).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::OutOfMemory {
                requested: 8,
                available: 4
            })
        ));
        assert_eq!(alloc.remaining(), 4);
    }

    #[test]
    fn blocks_alias_the_region() {
        let mut region = [0u8; 32];
        {
            let alloc = MmapAllocator::resume(&mut region, 8);
            alloc.allocate(4, 1).unwrap().copy_from_slice(b"abcd");
        }

        assert_eq!(&region[8..12], b"abcd");
    }

    #[test]
    fn free_counts_bytes_without_reusing_them() {
        let mut region = [0u8; 32];
        let mut other = [0u8; 4];
        let alloc = MmapAllocator::new(&mut region);

        let first = alloc.allocate(8, 1).unwrap();
        alloc.free(first).unwrap();
        let second = alloc.allocate(8, 1).unwrap();

        assert_eq!(alloc.freed_bytes(), 8);
        assert_eq!(alloc.offset_of(second), Some(8));
        assert!(alloc.free(&mut other).is_err());
    }

    #[test]
    fn offset_of_rejects_foreign_blocks() {
        let mut region = [0u8; 16];
        let other = [0u8; 4];
        let alloc = MmapAllocator::new(&mut region);

        assert_eq!(alloc.offset_of(&other), None);
    }
}
