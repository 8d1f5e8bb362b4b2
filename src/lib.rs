//! # slidemap - Sliding Memory-Mapped Windows and Typed Overlays
//!
//! slidemap stores fixed-layout records directly in memory-mapped storage and
//! accesses them in place, without serialization or copying:
//!
//! - **Sliding windows**: a bounded view over an arbitrarily large backing
//!   store, remapped on demand as the caller moves through it
//! - **Mapped streams**: `std::io::{Read, Write, Seek}` over a window, with
//!   transfers split transparently across remaps
//! - **Typed overlays**: raw blocks interpreted as live records, record
//!   sequences and primitive arrays, tagged with a stable type identity
//!
//! ## Quick Start
//!
//! ```ignore
//! use slidemap::{BackingStore, MmapAllocator, TypeRegistry, Window, WindowConfig};
//!
//! let store = BackingStore::open("./trades.bin", 64 * slidemap::config::MB)?;
//! let mut window = Window::new(&store, WindowConfig::new().view_size(4 * slidemap::config::MB))?;
//!
//! let mut registry = TypeRegistry::new();
//! let trades = registry.overlay::<Trade>()?;
//!
//! let alloc = MmapAllocator::new(window.view_mut()?);
//! let mut batch = trades.create_many(&alloc, 100)?;
//! batch[0].set_price(101.25);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Typed Overlay Engine (overlay)          │
//! │  Overlay<T>, ArrayOverlay<E>, registry   │
//! ├────────────────────┬────────────────────┤
//! │ Allocators         │ Mapped Stream       │
//! │ (memory)           │ (window::stream)    │
//! ├────────────────────┴────────────────────┤
//! │  Sliding Window (window)                 │
//! ├─────────────────────────────────────────┤
//! │  Mapping Backend (storage)               │
//! │  memmap2 + per-platform page info        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Ownership Model
//!
//! A `Window` borrows its `BackingStore`; slices of a view borrow the window;
//! overlay handles borrow the memory they interpret. Holding a record across
//! a remap, or past the store's lifetime, is therefore a compile error rather
//! than a dangling pointer.
//!
//! ## Errors
//!
//! Every fallible operation returns `eyre::Result`. Failures a caller may
//! want to branch on are raised as [`MapError`] and can be recovered with
//! `report.downcast_ref::<MapError>()`.
//!
//! ## Module Overview
//!
//! - [`config`]: Header layout and view sizing constants
//! - [`storage`]: Backing stores, mapped views, page information
//! - [`window`]: Sliding window and mapped stream
//! - [`memory`]: Heap and mapped-region allocators
//! - [`overlay`]: Schemas, type tags and typed record overlays

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod memory;
pub mod overlay;
pub mod storage;
pub mod window;

pub use error::MapError;
pub use memory::{Allocator, HeapAllocator, MmapAllocator};
pub use overlay::{
    ArrayMut, ArrayOverlay, FixupStats, Overlay, Record, RecordMut, RecordSeq, RecordSlice,
    Schema, SchemaKind, TypeRegistry, TypeTag,
};
pub use storage::{Advice, BackingStore, Protection, View};
pub use window::{MappedStream, Window, WindowConfig};
