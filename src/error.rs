//! # Error Taxonomy
//!
//! Every fallible slidemap operation returns `eyre::Result`. Failures that a
//! caller may want to react to are raised as a [`MapError`] inside the report,
//! so they can be classified without string matching:
//!
//! ```ignore
//! match stream.seek_with(SeekFrom::Start(1 << 40), false, false) {
//!     Err(report) if matches!(
//!         report.downcast_ref::<MapError>(),
//!         Some(MapError::InvalidSeek { .. })
//!     ) => { /* out of bounds */ }
//!     other => { other?; }
//! }
//! ```
//!
//! OS-level failures keep the underlying `std::io::Error` as their source.
//! Nothing is retried automatically: a mapping failure is usually address
//! space or handle exhaustion, and retrying would only hide it.

use std::io;

use crate::overlay::TypeTag;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("range [{start}, {start}+{len}) is outside the bound [{bound_start}, {bound_end})")]
    InvalidRange {
        start: u64,
        len: u64,
        bound_start: u64,
        bound_end: u64,
    },

    #[error(
        "range [{start}, {start}+{len}) overlaps view {view} at [{view_start}, {view_end}) \
         and one of them is shared-writable"
    )]
    ViewOverlap {
        start: u64,
        len: u64,
        view: u64,
        view_start: u64,
        view_end: u64,
    },

    #[error("seek to {position} is outside the stream bound [0, {length}]")]
    InvalidSeek { position: i128, length: u64 },

    #[error("failed to map {len} bytes at offset {offset}")]
    MapFailure {
        offset: u64,
        len: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to flush view {view}")]
    FlushFailure {
        view: u64,
        #[source]
        source: Option<io::Error>,
    },

    #[error("failed to unmap view {view}: {reason}")]
    UnmapFailure { view: u64, reason: &'static str },

    #[error("type {name} has no fixed sequential layout: {reason}")]
    UnsupportedLayout { name: &'static str, reason: String },

    #[error("type {name} is not a fixed-size primitive and cannot be an array element")]
    UnsupportedElementType { name: &'static str },

    #[error("unsupported operation: {op}")]
    UnsupportedOperation { op: &'static str },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("record header holds tag {found:?}, expected {expected:?}")]
    TagMismatch { expected: TypeTag, found: TypeTag },

    #[error("allocation of {requested} bytes failed: only {available} available")]
    OutOfMemory { requested: usize, available: usize },

    #[error("window has no mapped view")]
    NotMapped,

    #[error("{0} has been closed")]
    Disposed(&'static str),
}

impl MapError {
    /// Converts into an `io::Error` whose inner error downcasts back to
    /// `MapError`. Used by the `std::io` trait implementations.
    pub fn into_io(self) -> io::Error {
        let kind = match &self {
            MapError::InvalidArgument(_) | MapError::InvalidSeek { .. } => {
                io::ErrorKind::InvalidInput
            }
            MapError::UnsupportedOperation { .. } => io::ErrorKind::Unsupported,
            MapError::OutOfMemory { .. } => io::ErrorKind::OutOfMemory,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}

/// Converts an `eyre::Report` into an `io::Error`, preserving a `MapError`
/// payload when the report carries one.
pub(crate) fn report_into_io(report: eyre::Report) -> io::Error {
    match report.downcast::<MapError>() {
        Ok(err) => err.into_io(),
        Err(report) => match report.downcast::<io::Error>() {
            Ok(err) => err,
            Err(report) => io::Error::other(format!("{report:#}")),
        },
    }
}
