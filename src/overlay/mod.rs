//! # Typed Overlay Engine
//!
//! Turns raw blocks of memory into typed records without copying. Reads and
//! writes through a handle go straight to the underlying bytes, so a record
//! overlaid on a mapped view is persisted by the mapping itself.
//!
//! ## Block Layout
//!
//! ```text
//! scalar record:  +-----------+---------------------------+
//!                 | tag: usize| payload (size of T)       |
//!                 +-----------+---------------------------+
//!
//! array record:   +-------------+-----------+----+----+----+
//!                 | count: usize| tag: usize| e0 | e1 | .. |
//!                 +-------------+-----------+----+----+----+
//! ```
//!
//! Consecutive records are placed `Schema::stride()` bytes apart so every
//! payload keeps its alignment.
//!
//! ## Type Identity
//!
//! The header tag names the schema a block was written with. It is derived
//! from the schema alone (see [`schema`]), so identity survives process
//! restarts, and a [`TypeRegistry`] maps tags back to schemas for code that
//! only holds bytes.
//!
//! ## Entry Points
//!
//! | Type               | Produces                                        |
//! |--------------------|-------------------------------------------------|
//! | `Overlay<T>`       | `RecordMut`, `RecordSeq`, `RecordSlice`          |
//! | `ArrayOverlay<E>`  | `ArrayMut`                                      |
//! | `TypeRegistry`     | overlays, and schema lookup by tag or by block  |
//!
//! Every handle borrows the memory it interprets. The borrow checker keeps a
//! handle from outliving its allocator or from surviving a window remap.

mod array;
mod header;
mod record;
pub mod schema;
mod seq;
mod slice;

pub use array::{ArrayMut, ArrayOverlay};
pub use header::{ArrayHeader, HeaderWord, RecordHeader};
pub use record::{Overlay, RecordMut};
pub use schema::{Record, Schema, SchemaKind, TypeRegistry, TypeTag};
pub use seq::{FixupStats, RecordIter, RecordSeq};
pub use slice::RecordSlice;
