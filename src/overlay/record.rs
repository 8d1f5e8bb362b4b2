//! # Aggregate Record Overlays
//!
//! [`Overlay<T>`] is the per-type entry point of the engine for aggregate
//! records. It never owns memory: blocks come from an [`Allocator`] or from
//! memory the caller already holds (typically a mapped view), and every handle
//! it returns borrows that memory.
//!
//! ```ignore
//! let trades = registry.overlay::<Trade>()?;
//!
//! let mut fresh = trades.create(&heap)?;
//! fresh.set_price(10.5);
//!
//! let view = window.view_mut()?;
//! let mut existing = trades.overlay(&mut view[..trades.block_len(1)?])?;
//! existing.set_quantity(existing.quantity() + 1);
//! ```

use std::ops::{Deref, DerefMut};

use eyre::Result;
use zerocopy::{FromBytes, IntoBytes};

use super::header::{split_record, split_record_ref, too_small, RecordHeader};
use super::schema::{Record, Schema, TypeMarker, TypeTag};
use super::seq::RecordSeq;
use super::slice::RecordSlice;
use crate::config::{HEADER_WORD, RECORD_HEADER_SIZE};
use crate::error::MapError;
use crate::memory::Allocator;

pub struct Overlay<T: Record> {
    schema: Schema,
    _marker: TypeMarker<T>,
}

impl<T: Record> Clone for Overlay<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            _marker: TypeMarker::default(),
        }
    }
}

impl<T: Record> std::fmt::Debug for Overlay<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay").field("schema", &self.schema).finish()
    }
}

impl<T: Record> Overlay<T> {
    pub fn new() -> Result<Self> {
        Ok(Self {
            schema: Schema::aggregate::<T>()?,
            _marker: TypeMarker::default(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tag(&self) -> TypeTag {
        self.schema.tag()
    }

    pub fn stride(&self) -> usize {
        self.schema.stride()
    }

    /// Bytes needed for `count` consecutive records. Fails with
    /// `InvalidArgument` when the length does not fit in a `usize`.
    pub fn block_len(&self, count: usize) -> Result<usize> {
        count
            .checked_mul(self.stride())
            .ok_or_else(|| MapError::InvalidArgument(format!("{count} records overflow")).into())
    }

    /// Allocates a block, tags it and returns a handle to its payload.
    pub fn create<'a, A: Allocator + ?Sized>(&self, alloc: &'a A) -> Result<RecordMut<'a, T>> {
        let block = alloc.allocate(self.stride(), HEADER_WORD)?;
        self.overlay(block)
    }

    /// Allocates `count` contiguous tagged records.
    pub fn create_many<'a, A: Allocator + ?Sized>(
        &self,
        alloc: &'a A,
        count: usize,
    ) -> Result<RecordSlice<'a, T>> {
        let block = alloc.allocate(self.block_len(count)?, HEADER_WORD)?;
        self.as_random_access(block, count)
    }

    /// Interprets an existing block as a record, fixing up its header tag.
    pub fn overlay<'a>(&self, block: &'a mut [u8]) -> Result<RecordMut<'a, T>> {
        let len = block.len();
        let (header, payload) = split_record(block)?;
        let payload_len = payload.len();

        let (value, _) = T::mut_from_prefix(payload).map_err(|_| {
            if payload_len < self.schema.size() {
                too_small(len, RECORD_HEADER_SIZE + self.schema.size())
            } else {
                misaligned(&self.schema)
            }
        })?;

        header.fixup(self.tag());
        Ok(RecordMut { header, value })
    }

    /// Interprets read-only memory as a record. The header is checked but
    /// never written; a different tag fails with `TagMismatch`.
    pub fn overlay_ref<'a>(&self, block: &'a [u8]) -> Result<&'a T> {
        let (header, payload) = split_record_ref(block)?;

        let found = header.type_tag();
        if found != self.tag() {
            return Err(MapError::TagMismatch {
                expected: self.tag(),
                found,
            }
            .into());
        }

        let (value, _) = T::ref_from_prefix(payload).map_err(|_| {
            if payload.len() < self.schema.size() {
                too_small(block.len(), RECORD_HEADER_SIZE + self.schema.size())
            } else {
                misaligned(&self.schema)
            }
        })?;
        Ok(value)
    }

    /// Allocates a new record holding a byte copy of `value`'s payload.
    pub fn copy<'a, A: Allocator + ?Sized>(
        &self,
        value: &T,
        alloc: &'a A,
    ) -> Result<RecordMut<'a, T>> {
        let block = alloc.allocate(self.stride(), HEADER_WORD)?;
        self.copy_to(value, block)
    }

    /// Writes a tagged copy of `value` into the start of `dest`.
    pub fn copy_to<'a>(&self, value: &T, dest: &'a mut [u8]) -> Result<RecordMut<'a, T>> {
        let mut record = self.overlay(dest)?;
        record.value.as_mut_bytes().copy_from_slice(value.as_bytes());
        Ok(record)
    }

    /// Writes tagged copies of the first `count` values back to back into
    /// `dest` and returns an indexable view over them. Fails with
    /// `InvalidArgument` when `values` runs out early.
    pub fn copy_all_to<'a, 'v, I>(
        &self,
        values: I,
        count: usize,
        dest: &'a mut [u8],
    ) -> Result<RecordSlice<'a, T>>
    where
        T: 'v,
        I: IntoIterator<Item = &'v T>,
    {
        let block = self.records_region(dest, count)?;

        let size = self.schema.size();
        let mut copied = 0;
        for (record, value) in block.chunks_exact_mut(self.stride()).zip(values) {
            record[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + size].copy_from_slice(value.as_bytes());
            copied += 1;
        }

        if copied < count {
            return Err(MapError::InvalidArgument(format!(
                "expected {count} records to copy, got {copied}"
            ))
            .into());
        }

        let mut slice = RecordSlice::new(block, count, self.schema.clone());
        slice.fixup();
        Ok(slice)
    }

    /// Lazy, restartable traversal over `count` records at the start of
    /// `block`.
    pub fn as_sequence<'a>(&self, block: &'a mut [u8], count: usize) -> Result<RecordSeq<'a, T>> {
        let block = self.records_region(block, count)?;
        Ok(RecordSeq::new(block, count, self.schema.clone()))
    }

    /// Fixed-length indexable view over `count` records at the start of
    /// `block`. Every header is fixed up before the view is returned.
    pub fn as_random_access<'a>(
        &self,
        block: &'a mut [u8],
        count: usize,
    ) -> Result<RecordSlice<'a, T>> {
        let block = self.records_region(block, count)?;
        let mut slice = RecordSlice::new(block, count, self.schema.clone());
        slice.fixup();
        Ok(slice)
    }

    fn records_region<'a>(&self, block: &'a mut [u8], count: usize) -> Result<&'a mut [u8]> {
        let needed = self.block_len(count)?;

        if block.len() < needed {
            return Err(too_small(block.len(), needed).into());
        }

        let payload_addr = block.as_ptr() as usize + RECORD_HEADER_SIZE;
        if count > 0 && payload_addr % self.schema.align() != 0 {
            return Err(misaligned(&self.schema).into());
        }

        Ok(&mut block[..needed])
    }
}

pub(crate) fn misaligned(schema: &Schema) -> MapError {
    MapError::InvalidArgument(format!(
        "block is not aligned for {} (needs {})",
        schema.name(),
        schema.align()
    ))
}

/// Mutable handle to one record. Dereferences to the payload.
#[derive(Debug)]
pub struct RecordMut<'a, T> {
    header: &'a mut RecordHeader,
    value: &'a mut T,
}

impl<'a, T: Record> RecordMut<'a, T> {
    pub fn tag(&self) -> TypeTag {
        self.header.type_tag()
    }

    pub fn into_mut(self) -> &'a mut T {
        self.value
    }
}

impl<T> Deref for RecordMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<T> DerefMut for RecordMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use zerocopy::little_endian::{I64, U32};
    use zerocopy::{Immutable, KnownLayout, Unaligned};

    use super::*;
    use crate::memory::HeapAllocator;

    #[repr(C)]
    #[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
    struct Account {
        id: U32,
        balance: I64,
    }

    impl Account {
        zerocopy_accessors! {
            id: u32,
            balance: i64,
        }
    }

    impl Record for Account {
        const NAME: &'static str = "Account";
    }

    fn accounts() -> Overlay<Account> {
        Overlay::new().unwrap()
    }

    #[test]
    fn create_tags_header_and_exposes_payload() {
        let heap = HeapAllocator::new();
        let overlay = accounts();

        let mut record = overlay.create(&heap).unwrap();
        record.set_id(7);
        record.set_balance(-300);

        assert_eq!(record.tag(), overlay.tag());
        assert_eq!(record.id(), 7);
        assert_eq!(record.balance(), -300);
    }

    #[test]
    fn overlay_writes_through_to_block() {
        let overlay = accounts();
        let mut block = vec![0u8; overlay.block_len(1).unwrap()];

        overlay.overlay(&mut block).unwrap().set_id(0xABCD);

        assert_eq!(&block[..RECORD_HEADER_SIZE], &overlay.tag().get().to_ne_bytes());
        assert_eq!(
            &block[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + 4],
            &0xABCDu32.to_le_bytes()
        );
    }

    #[test]
    fn overlay_ref_checks_tag_without_writing() {
        let overlay = accounts();
        let block = vec![0u8; overlay.block_len(1).unwrap()];

        let err = overlay.overlay_ref(&block).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::TagMismatch { .. })
        ));
        assert!(block.iter().all(|&b| b == 0));
    }

    #[test]
    fn overlay_ref_reads_tagged_block() {
        let overlay = accounts();
        let mut block = vec![0u8; overlay.block_len(1).unwrap()];
        overlay.overlay(&mut block).unwrap().set_balance(99);

        let account = overlay.overlay_ref(&block).unwrap();

        assert_eq!(account.balance(), 99);
    }

    #[test]
    fn copy_is_independent_of_source() {
        let heap = HeapAllocator::new();
        let overlay = accounts();
        let mut original = overlay.create(&heap).unwrap();
        original.set_balance(5);

        let mut copy = overlay.copy(&original, &heap).unwrap();
        copy.set_balance(6);

        assert_eq!(original.balance(), 5);
        assert_eq!(copy.balance(), 6);
        assert_eq!(copy.tag(), overlay.tag());
    }

    #[test]
    fn copy_to_writes_into_caller_memory() {
        let heap = HeapAllocator::new();
        let overlay = accounts();
        let mut source = overlay.create(&heap).unwrap();
        source.set_id(3);
        source.set_balance(-12);

        let mut dest = vec![0xFFu8; overlay.stride() + 4];
        let copy = overlay.copy_to(&source, &mut dest).unwrap();
        assert_eq!(copy.id(), 3);
        drop(copy);

        assert_eq!(&dest[..RECORD_HEADER_SIZE], &overlay.tag().get().to_ne_bytes());
        assert_eq!(&dest[overlay.stride()..], &[0xFF; 4]);
        assert_eq!(overlay.overlay_ref(&dest).unwrap().balance(), -12);
    }

    #[test]
    fn copy_all_to_packs_records_at_stride() {
        let heap = HeapAllocator::new();
        let overlay = accounts();
        let mut sources = overlay.create_many(&heap, 3).unwrap();
        for i in 0..3 {
            sources[i].set_id(i as u32 + 1);
            sources[i].set_balance(i as i64 * 100);
        }

        let mut dest = vec![0u8; overlay.block_len(3).unwrap()];
        let copies = overlay.copy_all_to(sources.iter(), 3, &mut dest).unwrap();

        assert_eq!(copies.len(), 3);
        assert_eq!(copies[2].id(), 3);
        assert_eq!(copies[2].balance(), 200);
        drop(copies);

        let tail = &dest[2 * overlay.stride()..];
        assert_eq!(overlay.overlay_ref(tail).unwrap().id(), 3);
    }

    #[test]
    fn copy_all_to_rejects_short_destination() {
        let overlay = accounts();
        let values = [Account {
            id: U32::new(1),
            balance: I64::new(1),
        }];
        let mut dest = vec![0u8; overlay.stride() - 1];

        let err = overlay.copy_all_to(&values, 1, &mut dest).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::InvalidArgument(_))
        ));
        assert!(dest.iter().all(|&b| b == 0));
    }

    #[test]
    fn copy_all_to_needs_enough_values() {
        let overlay = accounts();
        let values = [Account {
            id: U32::new(1),
            balance: I64::new(1),
        }];
        let mut dest = vec![0u8; overlay.block_len(2).unwrap()];

        assert!(overlay.copy_all_to(&values, 2, &mut dest).is_err());
    }

    #[test]
    fn block_len_overflow_is_an_error() {
        let heap = HeapAllocator::new();
        let overlay = accounts();

        let err = overlay.create_many(&heap, usize::MAX / 2).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::InvalidArgument(_))
        ));
        assert!(overlay.block_len(usize::MAX).is_err());
        assert_eq!(heap.allocated_bytes(), 0);
    }

    #[test]
    fn short_block_is_rejected() {
        let overlay = accounts();
        let mut block = vec![0u8; overlay.block_len(1).unwrap() - 1];

        let err = overlay.overlay(&mut block).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::InvalidArgument(_))
        ));
    }

    #[test]
    fn short_block_for_many_records_is_rejected() {
        let overlay = accounts();
        let mut block = vec![0u8; overlay.block_len(3).unwrap()];

        assert!(overlay.as_random_access(&mut block, 4).is_err());
        assert!(overlay.as_random_access(&mut block, 3).is_ok());
    }
}
