//! # Fixed-Stride Random Access
//!
//! [`RecordSlice`] indexes `len` records in place with O(1) access. It is an
//! overlay, not a container: its length is fixed by the memory it covers, so
//! the structural operations a `Vec` would offer fail with
//! `UnsupportedOperation`.

use std::ops::{Index, IndexMut, Range};

use eyre::Result;
use zerocopy::FromBytes;

use super::header::RecordHeader;
use super::record::misaligned;
use super::schema::{Record, Schema, TypeMarker, TypeTag};
use super::seq::{fixup_records, FixupStats};
use crate::config::RECORD_HEADER_SIZE;
use crate::error::MapError;

pub struct RecordSlice<'a, T> {
    bytes: &'a mut [u8],
    len: usize,
    schema: Schema,
    _marker: TypeMarker<T>,
}

impl<'a, T: Record> RecordSlice<'a, T> {
    pub(crate) fn new(bytes: &'a mut [u8], len: usize, schema: Schema) -> Self {
        Self {
            bytes,
            len,
            schema,
            _marker: TypeMarker::default(),
        }
    }

    pub(crate) fn fixup(&mut self) -> FixupStats {
        fixup_records(self.bytes, self.schema.stride(), self.schema.tag())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn record_range(&self, index: usize) -> Result<Range<usize>> {
        if index >= self.len {
            return Err(MapError::IndexOutOfRange {
                index,
                len: self.len,
            }
            .into());
        }
        let start = index * self.schema.stride();
        Ok(start..start + RECORD_HEADER_SIZE + self.schema.size())
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        let range = self.record_range(index)?;
        let payload = &self.bytes[range.start + RECORD_HEADER_SIZE..range.end];
        T::ref_from_bytes(payload).map_err(|_| misaligned(&self.schema).into())
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let range = self.record_range(index)?;
        let payload = &mut self.bytes[range.start + RECORD_HEADER_SIZE..range.end];
        T::mut_from_bytes(payload).map_err(|_| misaligned(&self.schema).into())
    }

    /// Tag stored in the header of record `index`.
    pub fn tag_of(&self, index: usize) -> Result<TypeTag> {
        let range = self.record_range(index)?;
        let (header, _) = RecordHeader::ref_from_prefix(&self.bytes[range])
            .map_err(|_| misaligned(&self.schema))?;
        Ok(header.type_tag())
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let size = self.schema.size();
        self.bytes
            .chunks_exact(self.schema.stride())
            .filter_map(move |record| {
                T::ref_from_bytes(&record[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + size]).ok()
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        let size = self.schema.size();
        self.bytes
            .chunks_exact_mut(self.schema.stride())
            .filter_map(move |record| {
                T::mut_from_bytes(&mut record[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + size]).ok()
            })
    }

    pub fn push(&mut self, _value: T) -> Result<()> {
        Err(fixed_length("push onto a fixed-length record view").into())
    }

    pub fn insert(&mut self, _index: usize, _value: T) -> Result<()> {
        Err(fixed_length("insert into a fixed-length record view").into())
    }

    pub fn remove(&mut self, _index: usize) -> Result<T> {
        Err(fixed_length("remove from a fixed-length record view").into())
    }

    pub fn truncate(&mut self, _len: usize) -> Result<()> {
        Err(fixed_length("truncate a fixed-length record view").into())
    }
}

fn fixed_length(op: &'static str) -> MapError {
    MapError::UnsupportedOperation { op }
}

impl<T: Record> Index<usize> for RecordSlice<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T: Record> IndexMut<usize> for RecordSlice<'_, T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T> std::fmt::Debug for RecordSlice<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSlice")
            .field("schema", &self.schema.name())
            .field("len", &self.len)
            .finish()
    }
}
