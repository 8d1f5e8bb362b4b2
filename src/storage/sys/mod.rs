//! Platform page information and access advice.
//!
//! Mapping itself goes through `memmap2` on every platform. What differs per
//! OS is how the page size and the allocation granularity are discovered, and
//! whether access-pattern advice can be forwarded to the kernel. Each backend
//! exposes the same three functions:
//!
//! - `page_size()`: minimal unit paged in on a fault
//! - `allocation_granularity()`: required alignment of a view's file offset
//! - `advise(ptr, len, advice)`: best-effort access hint
//!
//! On POSIX systems both sizes come from `sysconf(_SC_PAGESIZE)`. On Windows
//! they come from `GetSystemInfo`, where the granularity is usually 64KB while
//! pages are 4KB.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::{advise, allocation_granularity, page_size};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{advise, allocation_granularity, page_size};
