//! # slidemap Configuration Constants
//!
//! This module centralizes the size and layout constants shared by the mapping
//! backend, the sliding window and the overlay engine. Constants that depend on
//! each other are co-located and their relationships are checked at compile
//! time.
//!
//! ## Dependency Graph
//!
//! ```text
//! HEADER_WORD (size_of::<usize>())
//!       │
//!       ├─> RECORD_HEADER_SIZE (1 word: type tag)
//!       │
//!       └─> ARRAY_HEADER_SIZE (2 words: element count + type tag)
//!
//! allocation granularity (runtime, from the platform)
//!       │
//!       ├─> min_view_size()     = MIN_VIEW_GRANULES * granularity
//!       │     A remap must always be able to produce a view that contains a
//!       │     position taken from the previous view.
//!       │
//!       └─> default_view_size() = DEFAULT_VIEW_MULTIPLIER * min_view_size()
//!
//! MAX_VIEW_SIZE (address-width dependent)
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `ARRAY_HEADER_SIZE == 2 * RECORD_HEADER_SIZE`
//! 2. Both header sizes are multiples of `HEADER_WORD`, so a payload that
//!    follows a header keeps the block's word alignment.
//! 3. `MAX_VIEW_SIZE` leaves room for the default view on every target.
//!
//! Page size and allocation granularity are not constants: they are queried
//! from the platform (see `storage::page_size` and
//! `storage::allocation_granularity`).

// ============================================================================
// SIZE UNITS
// ============================================================================

/// One kibibyte.
pub const KB: u64 = 1024;

/// One mebibyte.
pub const MB: u64 = 1024 * KB;

// ============================================================================
// RECORD HEADER LAYOUT
// Persisted bytes: must stay stable for file-backed stores to remain readable
// ============================================================================

/// Native word size used by every header field.
pub const HEADER_WORD: usize = std::mem::size_of::<usize>();

/// Header in front of a scalar record: `[type_tag]`.
pub const RECORD_HEADER_SIZE: usize = HEADER_WORD;

/// Header in front of an array record: `[element_count][type_tag]`.
pub const ARRAY_HEADER_SIZE: usize = 2 * HEADER_WORD;

const _: () = assert!(
    ARRAY_HEADER_SIZE == 2 * RECORD_HEADER_SIZE,
    "array header must be the record header plus one count word"
);

const _: () = assert!(
    RECORD_HEADER_SIZE % HEADER_WORD == 0 && ARRAY_HEADER_SIZE % HEADER_WORD == 0,
    "header sizes must keep payloads word aligned"
);

// ============================================================================
// VIEW SIZING
// ============================================================================

/// Minimum view size, in allocation granules.
pub const MIN_VIEW_GRANULES: u64 = 2;

/// Default view size, as a multiple of the minimum view size.
pub const DEFAULT_VIEW_MULTIPLIER: u64 = 32;

/// Largest view a window may request.
///
/// On 32-bit targets this stays below 2GB, the common user address space of
/// Linux (3GB/1GB split) and Windows (2GB/2GB split).
#[cfg(target_pointer_width = "32")]
pub const MAX_VIEW_SIZE: u64 = (2048 - 512) * MB;

/// Largest view a window may request.
#[cfg(not(target_pointer_width = "32"))]
pub const MAX_VIEW_SIZE: u64 = MB * MB;

const _: () = assert!(
    MAX_VIEW_SIZE >= DEFAULT_VIEW_MULTIPLIER * MIN_VIEW_GRANULES * 64 * KB,
    "MAX_VIEW_SIZE must hold a default view even with 64KB granules"
);

/// Minimum view size for a platform granularity.
pub const fn min_view_size(granularity: u64) -> u64 {
    MIN_VIEW_GRANULES * granularity
}

/// Default view size for a platform granularity.
pub const fn default_view_size(granularity: u64) -> u64 {
    DEFAULT_VIEW_MULTIPLIER * min_view_size(granularity)
}
