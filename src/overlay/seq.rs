//! # Lazy Record Sequences
//!
//! A [`RecordSeq`] describes `count` records laid out back to back. Nothing
//! happens until a traversal starts; each traversal begins by fixing up every
//! header in the range (see [`RecordHeader::fixup`]) and then yields payloads
//! front to back. Traversals can be restarted any number of times. Over
//! unchanged memory every traversal after the first rewrites no header.

use zerocopy::FromBytes;

use super::header::RecordHeader;
use super::schema::{Record, Schema, TypeMarker, TypeTag};
use crate::config::RECORD_HEADER_SIZE;

/// Header bookkeeping of one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixupStats {
    pub visited: usize,
    pub rewritten: usize,
}

pub(crate) fn fixup_records(bytes: &mut [u8], stride: usize, tag: TypeTag) -> FixupStats {
    let mut stats = FixupStats::default();
    for record in bytes.chunks_exact_mut(stride) {
        if let Ok((header, _)) = RecordHeader::mut_from_prefix(record) {
            stats.visited += 1;
            if header.fixup(tag) {
                stats.rewritten += 1;
            }
        }
    }
    stats
}

pub struct RecordSeq<'a, T> {
    bytes: &'a mut [u8],
    len: usize,
    schema: Schema,
    last_fixup: Option<FixupStats>,
    _marker: TypeMarker<T>,
}

impl<'a, T: Record> RecordSeq<'a, T> {
    pub(crate) fn new(bytes: &'a mut [u8], len: usize, schema: Schema) -> Self {
        Self {
            bytes,
            len,
            schema,
            last_fixup: None,
            _marker: TypeMarker::default(),
        }
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

    /// Header statistics of the most recent traversal, once it has started.
    pub fn last_fixup(&self) -> Option<FixupStats> {
        self.last_fixup
    }

    /// Fixes up every header without yielding records.
    pub fn fixup(&mut self) -> FixupStats {
        let stats = fixup_records(self.bytes, self.schema.stride(), self.schema.tag());
        self.last_fixup = Some(stats);
        stats
    }

    /// Starts a new traversal.
    pub fn iter_mut(&mut self) -> RecordIter<'_, T> {
        RecordIter {
            rest: &mut *self.bytes,
            remaining: self.len,
            stride: self.schema.stride(),
            size: self.schema.size(),
            tag: self.schema.tag(),
            stats: &mut self.last_fixup,
            started: false,
            _marker: TypeMarker::default(),
        }
    }
}

impl<'s, 'a, T: Record + 's> IntoIterator for &'s mut RecordSeq<'a, T> {
    type Item = &'s mut T;
    type IntoIter = RecordIter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> std::fmt::Debug for RecordSeq<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSeq")
            .field("schema", &self.schema.name())
            .field("len", &self.len)
            .field("last_fixup", &self.last_fixup)
            .finish()
    }
}

/// One forward traversal of a [`RecordSeq`].
pub struct RecordIter<'s, T> {
    rest: &'s mut [u8],
    remaining: usize,
    stride: usize,
    size: usize,
    tag: TypeTag,
    stats: &'s mut Option<FixupStats>,
    started: bool,
    _marker: TypeMarker<T>,
}

impl<T> RecordIter<'_, T> {
    /// Header statistics of this traversal, once the first record was requested.
    pub fn fixup_stats(&self) -> Option<FixupStats> {
        if self.started {
            *self.stats
        } else {
            None
        }
    }
}

impl<'s, T: Record + 's> Iterator for RecordIter<'s, T> {
    type Item = &'s mut T;

    fn next(&mut self) -> Option<&'s mut T> {
        if !self.started {
            *self.stats = Some(fixup_records(self.rest, self.stride, self.tag));
            self.started = true;
        }

        if self.remaining == 0 {
            return None;
        }

        let bytes = std::mem::take(&mut self.rest);
        let (record, rest) = bytes.split_at_mut(self.stride);
        self.rest = rest;
        self.remaining -= 1;

        T::mut_from_bytes(&mut record[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + self.size]).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'s, T: Record + 's> ExactSizeIterator for RecordIter<'s, T> {}
