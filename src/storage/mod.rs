//! # Storage Module
//!
//! This module is the mapping backend of slidemap: it opens backing stores,
//! maps bounded views of them with a protection mode, flushes and unmaps
//! them, and reports the platform's page size and allocation granularity.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ BackingStore (mmap.rs)                    │
//! │   open / anonymous / map / unmap / flush  │
//! │   mapping table: view id -> memmap2 map   │
//! ├──────────────────────────────────────────┤
//! │ sys (per platform)                        │
//! │   unix:    sysconf + madvise              │
//! │   windows: GetSystemInfo                  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Mapping is done through `memmap2` on every platform, so the POSIX and
//! Windows backends share one contract and differ only in how page
//! information is discovered and whether access advice is honored.
//!
//! ## View Alignment
//!
//! Every view's start offset is a multiple of [`allocation_granularity`].
//! `BackingStore::map` rejects unaligned offsets; the sliding window aligns its
//! requests before mapping, so its callers never see an unaligned start.
//!
//! ## Thread Safety
//!
//! The mapping table sits behind a `parking_lot::Mutex` so several windows can
//! share one store through `&BackingStore`. Access to the mapped bytes is not
//! coordinated: callers that need concurrent access must partition the store
//! into disjoint ranges.
//!
//! ## Module Organization
//!
//! - `mmap`: `BackingStore` and `View`
//! - `sys`: platform page information and access advice

mod mmap;
mod sys;

pub use mmap::{BackingStore, View};

/// Access protection of a mapped view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protection {
    ReadOnly,
    #[default]
    ReadWrite,
    /// Private copy-on-write mapping; writes never reach the backing file.
    WriteCopy,
}

impl Protection {
    pub fn is_writable(self) -> bool {
        !matches!(self, Protection::ReadOnly)
    }
}

/// Expected access pattern for a view, forwarded to the kernel where the
/// platform supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    Normal,
    Sequential,
    Random,
    WillNeed,
}

/// Minimal unit paged in on a fault.
pub fn page_size() -> usize {
    sys::page_size()
}

/// Required alignment of a view's offset within its store.
pub fn allocation_granularity() -> usize {
    sys::allocation_granularity()
}
