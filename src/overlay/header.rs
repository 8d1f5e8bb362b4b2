//! # Record Headers
//!
//! Every block handled by the overlay engine starts with a header written and
//! checked by the engine, invisible to payload accessors:
//!
//! ```text
//! scalar record:  [tag: usize][payload ...]
//! array record:   [count: usize][tag: usize][element 0][element 1]...
//! ```
//!
//! Header words use native endianness and the native word size. They are
//! `Unaligned` zerocopy structs, so a header can be read at any offset, which
//! matters for records packed at an odd stride.
//!
//! ## Tag Fixup
//!
//! `fixup` reads the stored tag and writes the schema's tag only when they
//! differ. Writing an unchanged value still faults a private copy of the page
//! on copy-on-write mappings and dirties it on shared ones, so an unconditional
//! store is never used.

use eyre::Result;
use tracing::trace;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::schema::TypeTag;
use crate::config::{ARRAY_HEADER_SIZE, RECORD_HEADER_SIZE};
use crate::error::MapError;

#[cfg(target_pointer_width = "64")]
type NativeWord = zerocopy::native_endian::U64;
#[cfg(target_pointer_width = "32")]
type NativeWord = zerocopy::native_endian::U32;

/// One native-endian, pointer-sized header word with no alignment
/// requirement.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct HeaderWord(NativeWord);

const _: () = assert!(std::mem::size_of::<HeaderWord>() == std::mem::size_of::<usize>());

impl HeaderWord {
    #[inline]
    pub fn new(value: usize) -> Self {
        Self(NativeWord::new(value as _))
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0.get() as usize
    }
}

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct RecordHeader {
    tag: HeaderWord,
}

const _: () = assert!(std::mem::size_of::<RecordHeader>() == RECORD_HEADER_SIZE);

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct ArrayHeader {
    count: HeaderWord,
    tag: HeaderWord,
}

const _: () = assert!(std::mem::size_of::<ArrayHeader>() == ARRAY_HEADER_SIZE);

impl RecordHeader {
    zerocopy_accessors! {
        tag: usize,
    }

    pub fn type_tag(&self) -> TypeTag {
        TypeTag::from_raw(self.tag())
    }

    /// Stores `tag` if the header holds a different one. Returns true when
    /// the header was rewritten.
    pub fn fixup(&mut self, tag: TypeTag) -> bool {
        fixup_word(&mut self.tag, tag)
    }
}

impl ArrayHeader {
    zerocopy_accessors! {
        count: usize,
        tag: usize,
    }

    pub fn type_tag(&self) -> TypeTag {
        TypeTag::from_raw(self.tag())
    }

    pub fn fixup(&mut self, tag: TypeTag) -> bool {
        fixup_word(&mut self.tag, tag)
    }
}

fn fixup_word(word: &mut HeaderWord, tag: TypeTag) -> bool {
    let found = word.get();
    if found == tag.get() {
        return false;
    }

    trace!(found, expected = tag.get(), "rewriting record header tag");
    *word = HeaderWord::new(tag.get());
    true
}

/// Splits `block` into its scalar header and the bytes after it.
pub(crate) fn split_record(block: &mut [u8]) -> Result<(&mut RecordHeader, &mut [u8])> {
    let len = block.len();
    RecordHeader::mut_from_prefix(block).map_err(|_| too_small(len, RECORD_HEADER_SIZE).into())
}

pub(crate) fn split_record_ref(block: &[u8]) -> Result<(&RecordHeader, &[u8])> {
    RecordHeader::ref_from_prefix(block)
        .map_err(|_| too_small(block.len(), RECORD_HEADER_SIZE).into())
}

pub(crate) fn split_array(block: &mut [u8]) -> Result<(&mut ArrayHeader, &mut [u8])> {
    let len = block.len();
    ArrayHeader::mut_from_prefix(block).map_err(|_| too_small(len, ARRAY_HEADER_SIZE).into())
}

pub(crate) fn split_array_ref(block: &[u8]) -> Result<(&ArrayHeader, &[u8])> {
    ArrayHeader::ref_from_prefix(block)
        .map_err(|_| too_small(block.len(), ARRAY_HEADER_SIZE).into())
}

pub(crate) fn too_small(len: usize, needed: usize) -> MapError {
    MapError::InvalidArgument(format!(
        "block of {len} bytes is too small: {needed} bytes needed"
    ))
}
