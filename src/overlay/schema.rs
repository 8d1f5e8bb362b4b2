//! # Schemas and Type Tags
//!
//! A [`Schema`] is the static description of one record layout: name, payload
//! size and alignment, kind, and the [`TypeTag`] written into every record
//! header of that layout.
//!
//! ## Tag Derivation
//!
//! ```text
//! tag = crc64_ecma_182( name bytes || kind byte || payload size as u64 LE )
//! ```
//!
//! truncated to the native word. Tags depend only on the schema, never on
//! process state, so a file written by one run is recognized by the next.
//!
//! ## Layout Rules
//!
//! The payload follows the header at a fixed offset, and consecutive records
//! are laid out `stride` bytes apart:
//!
//! ```text
//! stride = round_up(header_size + payload_size, payload_align)
//! ```
//!
//! A payload whose alignment exceeds the header word cannot be placed at a
//! fixed offset after the header, and a zero-sized payload has no layout to
//! overlay; both are rejected with `UnsupportedLayout`.

use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};

use crc::{Crc, CRC_64_ECMA_182};
use eyre::Result;
use hashbrown::HashMap;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::array::ArrayOverlay;
use super::header::{ArrayHeader, RecordHeader};
use super::record::Overlay;
use crate::config::{ARRAY_HEADER_SIZE, HEADER_WORD, RECORD_HEADER_SIZE};
use crate::error::MapError;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// A fixed-layout payload type that can be overlaid on raw memory.
///
/// `NAME` must be unique among the record types of an application and must
/// not change once records of the type are persisted: it feeds the type tag.
pub trait Record: FromBytes + IntoBytes + KnownLayout + Immutable + Sized {
    const NAME: &'static str;

    /// True for fixed-size primitives, the only valid array elements.
    const PRIMITIVE: bool = false;
}

impl_primitive_record!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

/// Identity of a schema as stored in record headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(usize);

impl TypeTag {
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    fn derive(name: &str, kind: u8, size: usize) -> Self {
        let mut digest = CRC64.digest();
        digest.update(name.as_bytes());
        digest.update(&[kind]);
        digest.update(&(size as u64).to_le_bytes());
        Self(digest.finalize() as usize)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// One record of `size` bytes behind a `[tag]` header.
    Aggregate,
    /// `count` elements of `element_size` bytes behind a `[count][tag]` header.
    PrimitiveArray { element_size: usize },
}

impl SchemaKind {
    fn discriminant(self) -> u8 {
        match self {
            SchemaKind::Aggregate => 0,
            SchemaKind::PrimitiveArray { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: &'static str,
    size: usize,
    align: usize,
    kind: SchemaKind,
    tag: TypeTag,
}

impl Schema {
    pub fn aggregate<T: Record>() -> Result<Self> {
        Self::build(
            T::NAME,
            size_of::<T>(),
            align_of::<T>(),
            SchemaKind::Aggregate,
        )
    }

    pub fn primitive_array<E: Record>() -> Result<Self> {
        if !E::PRIMITIVE {
            return Err(MapError::UnsupportedElementType { name: E::NAME }.into());
        }

        Self::build(
            E::NAME,
            size_of::<E>(),
            align_of::<E>(),
            SchemaKind::PrimitiveArray {
                element_size: size_of::<E>(),
            },
        )
    }

    fn build(name: &'static str, size: usize, align: usize, kind: SchemaKind) -> Result<Self> {
        if size == 0 {
            return Err(MapError::UnsupportedLayout {
                name,
                reason: "zero-sized payload".to_string(),
            }
            .into());
        }

        if align > HEADER_WORD {
            return Err(MapError::UnsupportedLayout {
                name,
                reason: format!(
                    "alignment {align} exceeds the {HEADER_WORD}-byte header word"
                ),
            }
            .into());
        }

        Ok(Self {
            name,
            size,
            align,
            kind,
            tag: TypeTag::derive(name, kind.discriminant(), size),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Payload size of one record, or of one element for arrays.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn header_size(&self) -> usize {
        match self.kind {
            SchemaKind::Aggregate => RECORD_HEADER_SIZE,
            SchemaKind::PrimitiveArray { .. } => ARRAY_HEADER_SIZE,
        }
    }

    /// Distance between consecutive aggregate records.
    pub fn stride(&self) -> usize {
        (RECORD_HEADER_SIZE + self.size).next_multiple_of(self.align)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SchemaKind::Aggregate => {
                write!(f, "{} ({} bytes, tag {})", self.name, self.size, self.tag)
            }
            SchemaKind::PrimitiveArray { .. } => {
                write!(f, "[{}] ({} bytes each, tag {})", self.name, self.size, self.tag)
            }
        }
    }
}

/// Table from type tag to schema.
///
/// Lets code that only holds a raw block find out what it contains.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    schemas: HashMap<TypeTag, Schema>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `schema`. Registering the same schema twice is a no-op; a
    /// different schema with the same tag is rejected.
    pub fn register(&mut self, schema: Schema) -> Result<TypeTag> {
        let tag = schema.tag();
        if let Some(existing) = self.schemas.get(&tag) {
            if *existing != schema {
                return Err(MapError::InvalidArgument(format!(
                    "tag {tag} of {schema} is already taken by {existing}"
                ))
                .into());
            }
            return Ok(tag);
        }

        self.schemas.insert(tag, schema);
        Ok(tag)
    }

    /// Builds and registers the overlay for aggregate type `T`.
    pub fn overlay<T: Record>(&mut self) -> Result<Overlay<T>> {
        let overlay = Overlay::<T>::new()?;
        self.register(overlay.schema().clone())?;
        Ok(overlay)
    }

    /// Builds and registers the overlay for arrays of primitive `E`.
    pub fn array_overlay<E: Record>(&mut self) -> Result<ArrayOverlay<E>> {
        let overlay = ArrayOverlay::<E>::new()?;
        self.register(overlay.schema().clone())?;
        Ok(overlay)
    }

    pub fn lookup(&self, tag: TypeTag) -> Option<&Schema> {
        self.schemas.get(&tag)
    }

    /// Finds the schema of the record at the start of `block` by reading its
    /// header. Scalar headers are tried first, then array headers.
    pub fn identify(&self, block: &[u8]) -> Option<&Schema> {
        let scalar = RecordHeader::ref_from_prefix(block)
            .ok()
            .and_then(|(header, _)| self.lookup(header.type_tag()))
            .filter(|schema| schema.kind() == SchemaKind::Aggregate);

        scalar.or_else(|| {
            ArrayHeader::ref_from_prefix(block)
                .ok()
                .and_then(|(header, _)| self.lookup(header.type_tag()))
                .filter(|schema| matches!(schema.kind(), SchemaKind::PrimitiveArray { .. }))
        })
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }
}

/// Zero-sized marker tying a schema to its Rust type.
pub(crate) type TypeMarker<T> = PhantomData<fn() -> T>;
