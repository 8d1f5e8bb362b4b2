//! # Primitive Arrays
//!
//! An array record stores its element count in front of the type tag:
//!
//! ```text
//! [count: usize][tag: usize][e0][e1]...[e(count-1)]
//! ```
//!
//! Only fixed-size primitives are accepted as elements. Overlaying an
//! existing array reads the count from the header and checks that the block
//! holds that many elements before any handle is produced.

use std::slice;

use eyre::Result;
use zerocopy::FromBytes;

use super::header::{split_array, split_array_ref, too_small, ArrayHeader};
use super::record::misaligned;
use super::schema::{Record, Schema, TypeMarker, TypeTag};
use crate::config::{ARRAY_HEADER_SIZE, HEADER_WORD};
use crate::error::MapError;
use crate::memory::Allocator;

pub struct ArrayOverlay<E: Record> {
    schema: Schema,
    _marker: TypeMarker<E>,
}

impl<E: Record> ArrayOverlay<E> {
    pub fn new() -> Result<Self> {
        Ok(Self {
            schema: Schema::primitive_array::<E>()?,
            _marker: TypeMarker::default(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tag(&self) -> TypeTag {
        self.schema.tag()
    }

    /// Bytes needed for an array of `count` elements, header included.
    pub fn block_len(&self, count: usize) -> Result<usize> {
        count
            .checked_mul(self.schema.size())
            .and_then(|n| n.checked_add(ARRAY_HEADER_SIZE))
            .ok_or_else(|| MapError::InvalidArgument(format!("{count} elements overflow")).into())
    }

    /// Allocates an array of `count` elements and writes its header.
    pub fn create_array<'a, A: Allocator + ?Sized>(
        &self,
        alloc: &'a A,
        count: usize,
    ) -> Result<ArrayMut<'a, E>> {
        let block = alloc.allocate(self.block_len(count)?, HEADER_WORD)?;
        let (header, _) = split_array(&mut *block)?;
        header.set_count(count);

        self.overlay(block)
    }

    /// Interprets an existing array block, fixing up its header tag.
    pub fn overlay<'a>(&self, block: &'a mut [u8]) -> Result<ArrayMut<'a, E>> {
        let len = block.len();
        let (header, payload) = split_array(block)?;
        let needed = self.payload_len(header.count(), len)?;

        if payload.len() < needed {
            return Err(too_small(len, ARRAY_HEADER_SIZE + needed).into());
        }

        let elements = <[E]>::mut_from_bytes(&mut payload[..needed])
            .map_err(|_| misaligned(&self.schema))?;

        header.fixup(self.tag());
        Ok(ArrayMut { header, elements })
    }

    /// Interprets read-only memory as an array. The tag is checked, never
    /// written.
    pub fn overlay_ref<'a>(&self, block: &'a [u8]) -> Result<&'a [E]> {
        let (header, payload) = split_array_ref(block)?;

        let found = header.type_tag();
        if found != self.tag() {
            return Err(MapError::TagMismatch {
                expected: self.tag(),
                found,
            }
            .into());
        }

        let needed = self.payload_len(header.count(), block.len())?;
        if payload.len() < needed {
            return Err(too_small(block.len(), ARRAY_HEADER_SIZE + needed).into());
        }

        <[E]>::ref_from_bytes(&payload[..needed]).map_err(|_| misaligned(&self.schema).into())
    }

    fn payload_len(&self, count: usize, block_len: usize) -> Result<usize> {
        count.checked_mul(self.schema.size()).ok_or_else(|| {
            MapError::InvalidArgument(format!(
                "array header of a {block_len}-byte block claims {count} elements"
            ))
            .into()
        })
    }
}

impl<E: Record> Clone for ArrayOverlay<E> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            _marker: TypeMarker::default(),
        }
    }
}

impl<E: Record> std::fmt::Debug for ArrayOverlay<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayOverlay")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Mutable handle to an array record.
#[derive(Debug)]
pub struct ArrayMut<'a, E> {
    header: &'a mut ArrayHeader,
    elements: &'a mut [E],
}

impl<'a, E: Record> ArrayMut<'a, E> {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn tag(&self) -> TypeTag {
        self.header.type_tag()
    }

    pub fn get(&self, index: usize) -> Result<&E> {
        let len = self.len();
        self.elements
            .get(index)
            .ok_or_else(|| MapError::IndexOutOfRange { index, len }.into())
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut E> {
        let len = self.len();
        self.elements
            .get_mut(index)
            .ok_or_else(|| MapError::IndexOutOfRange { index, len }.into())
    }

    pub fn set(&mut self, index: usize, value: E) -> Result<()> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    pub fn iter(&self) -> slice::Iter<'_, E> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, E> {
        self.elements.iter_mut()
    }

    pub fn as_slice(&self) -> &[E] {
        self.elements
    }

    pub fn as_mut_slice(&mut self) -> &mut [E] {
        self.elements
    }

    pub fn into_mut_slice(self) -> &'a mut [E] {
        self.elements
    }
}
