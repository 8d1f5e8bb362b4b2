//! # Backing Stores and Views
//!
//! This module implements `BackingStore`, the mapping backend every other
//! component builds on. A store is a file (named) or an unlinked temporary file
//! (anonymous) with a fixed maximum addressable size. Callers map bounded
//! views of it, access them as byte slices, flush them and unmap them.
//!
//! ## Mapping Table
//!
//! The store owns every mapping it creates. `map()` registers the mapping in a
//! table keyed by view id and hands back a `View` token; `unmap()` removes the
//! entry, which drops the `memmap2` mapping and unmaps the range. `close()`
//! drains the table, so no mapping can outlive the store:
//!
//! ```text
//! BackingStore
//! ├── file (None once closed)
//! └── views: id -> Mapping
//!       ├── 1 -> ReadWrite  [0, 256KB)
//!       └── 7 -> WriteCopy  [1MB, 1MB+64KB)
//! ```
//!
//! ## Safety Model
//!
//! View memory is handed out as slices borrowed from both the store and the
//! view token:
//!
//! ```text
//! bytes(&self, &View)         -> &[u8]
//! bytes_mut(&self, &mut View) -> &mut [u8]
//! unmap(&self, View)          // consumes the token
//! close(&mut self)            // exclusive borrow of the store
//! ```
//!
//! A slice therefore cannot outlive its mapping: unmapping needs the token by
//! value and closing needs the store exclusively, and the borrow checker
//! rejects both while a slice is alive. The token is not `Clone`, so a view
//! hands out at most one mutable slice at a time.
//!
//! Two views of the same file range are different addresses for the same
//! bytes. `map()` therefore refuses a range that overlaps a live view when
//! either of the two is `ReadWrite`, so a store write can never show up
//! under a slice borrowed from another view. Overlapping `ReadOnly` and
//! `WriteCopy` views are allowed, since private copies are never visible to
//! other mappings.
//!
//! ## Anonymous Stores
//!
//! An anonymous store is backed by `tempfile::tempfile()`: the file has no name
//! in the filesystem and disappears when its handle closes. Unlike an
//! anonymous `mmap`, it can be mapped at arbitrary offsets, which the sliding
//! window needs.
//!
//! ## Protection Modes
//!
//! - `ReadOnly`: shared read-only mapping
//! - `ReadWrite`: shared mapping, writes reach the file
//! - `WriteCopy`: private mapping, the first write to a page copies it and the
//!   file never sees the change

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use eyre::{Result, WrapErr};
use hashbrown::HashMap;
use memmap2::{Mmap, MmapMut, MmapOptions};
use parking_lot::Mutex;
use tracing::debug;

use super::{sys, Advice, Protection};
use crate::error::MapError;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
    WriteCopy(MmapMut),
}

impl Mapping {
    fn as_ptr(&self) -> *const u8 {
        match self {
            Mapping::ReadOnly(m) => m.as_ptr(),
            Mapping::ReadWrite(m) | Mapping::WriteCopy(m) => m.as_ptr(),
        }
    }

    fn as_mut_ptr(&mut self) -> Option<*mut u8> {
        match self {
            Mapping::ReadOnly(_) => None,
            Mapping::ReadWrite(m) | Mapping::WriteCopy(m) => Some(m.as_mut_ptr()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Mapping::ReadOnly(m) => m.len(),
            Mapping::ReadWrite(m) | Mapping::WriteCopy(m) => m.len(),
        }
    }
}

/// Token for a mapped range of a [`BackingStore`].
///
/// The memory is reached through [`BackingStore::bytes`] and
/// [`BackingStore::bytes_mut`]. Dropping the token without calling
/// [`BackingStore::unmap`] leaves the range mapped until the store closes.
#[derive(Debug)]
pub struct View {
    store: u64,
    id: u64,
    offset: u64,
    len: usize,
    protection: Protection,
}

impl View {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Offset of the first mapped byte within the store.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset one past the last mapped byte.
    pub fn end(&self) -> u64 {
        self.offset + self.len as u64
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }
}

struct Slot {
    offset: u64,
    mapping: Mapping,
}

impl Slot {
    fn end(&self) -> u64 {
        self.offset + self.mapping.len() as u64
    }

    fn is_shared_writable(&self) -> bool {
        matches!(self.mapping, Mapping::ReadWrite(_))
    }

    fn conflicts(&self, offset: u64, end: u64, protection: Protection) -> bool {
        let overlaps = offset < self.end() && self.offset < end;
        overlaps && (self.is_shared_writable() || protection == Protection::ReadWrite)
    }
}

struct StoreState {
    file: Option<File>,
    views: HashMap<u64, Slot>,
    next_view: u64,
}

pub struct BackingStore {
    id: u64,
    path: Option<PathBuf>,
    max_size: u64,
    page_size: usize,
    granularity: usize,
    state: Mutex<StoreState>,
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStore")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("max_size", &self.max_size)
            .field("mapped_views", &self.mapped_views())
            .finish()
    }
}

impl BackingStore {
    /// Opens (or creates) a file-backed store.
    ///
    /// The file is extended to `max_size` if it is shorter. A `max_size` of 0
    /// maps the file's current length; the file must then exist and be
    /// non-empty.
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64) -> Result<Self> {
        let path = path.as_ref();

        let (file, max_size) = if max_size == 0 {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| {
                    MapError::InvalidArgument(format!(
                        "store '{}' must exist when opened at its current length: {}",
                        path.display(),
                        e
                    ))
                })?;

            let len = file
                .metadata()
                .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
                .len();

            if len == 0 {
                return Err(MapError::InvalidArgument(format!(
                    "store '{}' is empty and no size was given",
                    path.display()
                ))
                .into());
            }

            (file, len)
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .wrap_err_with(|| format!("failed to open backing store '{}'", path.display()))?;

            let len = file
                .metadata()
                .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
                .len();

            if len < max_size {
                file.set_len(max_size).wrap_err_with(|| {
                    format!("failed to extend '{}' to {} bytes", path.display(), max_size)
                })?;
            }

            (file, max_size)
        };

        Ok(Self::from_file(file, Some(path.to_path_buf()), max_size))
    }

    /// Creates a process-local store that vanishes when closed.
    pub fn anonymous(max_size: u64) -> Result<Self> {
        if max_size == 0 {
            return Err(MapError::InvalidArgument(
                "anonymous store needs a non-zero size".to_string(),
            )
            .into());
        }

        let file = tempfile::tempfile().wrap_err("failed to create anonymous backing file")?;
        file.set_len(max_size)
            .wrap_err_with(|| format!("failed to size anonymous store to {} bytes", max_size))?;

        Ok(Self::from_file(file, None, max_size))
    }

    fn from_file(file: File, path: Option<PathBuf>, max_size: u64) -> Self {
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);
        let store = Self {
            id,
            path,
            max_size,
            page_size: sys::page_size(),
            granularity: sys::allocation_granularity(),
            state: Mutex::new(StoreState {
                file: Some(file),
                views: HashMap::new(),
                next_view: 1,
            }),
        };

        debug!(
            store = id,
            path = ?store.path,
            max_size,
            granularity = store.granularity,
            "opened backing store"
        );

        store
    }

    /// Maps `[offset, offset + size)`.
    ///
    /// `offset` must be a multiple of [`allocation_granularity`](Self::allocation_granularity).
    pub fn map(&self, protection: Protection, offset: u64, size: u64) -> Result<View> {
        if size == 0 {
            return Err(MapError::InvalidArgument("cannot map an empty view".to_string()).into());
        }

        if offset % self.granularity as u64 != 0 {
            return Err(MapError::InvalidArgument(format!(
                "view offset {} is not a multiple of the allocation granularity {}",
                offset, self.granularity
            ))
            .into());
        }

        if offset.checked_add(size).map_or(true, |end| end > self.max_size) {
            return Err(MapError::InvalidRange {
                start: offset,
                len: size,
                bound_start: 0,
                bound_end: self.max_size,
            }
            .into());
        }

        let len = usize::try_from(size).map_err(|_| {
            MapError::InvalidArgument(format!("view of {} bytes exceeds the address space", size))
        })?;

        let mut state = self.state.lock();
        let file = state
            .file
            .as_ref()
            .ok_or(MapError::Disposed("backing store"))?;

        let end = offset + size;
        if let Some((&other, slot)) = state
            .views
            .iter()
            .find(|(_, slot)| slot.conflicts(offset, end, protection))
        {
            return Err(MapError::ViewOverlap {
                start: offset,
                len: size,
                view: other,
                view_start: slot.offset,
                view_end: slot.end(),
            }
            .into());
        }

        let mut options = MmapOptions::new();
        options.offset(offset).len(len);

        // SAFETY: mapping a file is unsafe because another process could
        // truncate or modify it underneath us. This is acceptable because:
        // 1. The store holds the only handle this crate opens on the file
        // 2. No live view shares bytes with this one unless both are
        //    read-only or private (checked above)
        // 3. The range was checked against max_size, which the file was
        //    extended to on open
        // 4. The mapping is owned by the table and dropped before the file
        let mapping = unsafe {
            match protection {
                Protection::ReadOnly => options.map(file).map(Mapping::ReadOnly),
                Protection::ReadWrite => options.map_mut(file).map(Mapping::ReadWrite),
                Protection::WriteCopy => options.map_copy(file).map(Mapping::WriteCopy),
            }
        }
        .map_err(|source| MapError::MapFailure {
            offset,
            len: size,
            source,
        })?;

        let id = state.next_view;
        state.next_view += 1;
        state.views.insert(id, Slot { offset, mapping });

        debug!(store = self.id, view = id, offset, len, ?protection, "mapped view");

        Ok(View {
            store: self.id,
            id,
            offset,
            len,
            protection,
        })
    }

    /// Unmaps a view. Unmapping a view the store already dropped (for example
    /// after `close`) is a no-op.
    pub fn unmap(&self, view: View) -> Result<()> {
        if view.store != self.id {
            return Err(MapError::UnmapFailure {
                view: view.id,
                reason: "view belongs to a different store",
            }
            .into());
        }

        let removed = self.state.lock().views.remove(&view.id);
        if removed.is_some() {
            debug!(store = self.id, view = view.id, offset = view.offset, "unmapped view");
        }

        Ok(())
    }

    /// Synchronously writes up to `length` dirty bytes of the view back to the
    /// file. Read-only and copy-on-write views have nothing to write back.
    pub fn flush(&self, view: &View, length: u64) -> Result<()> {
        self.flush_with(view, length, false)
    }

    /// Schedules write-back of up to `length` bytes without waiting for it.
    pub fn flush_async(&self, view: &View, length: u64) -> Result<()> {
        self.flush_with(view, length, true)
    }

    fn flush_with(&self, view: &View, length: u64, asynchronous: bool) -> Result<()> {
        let state = self.state.lock();
        if state.file.is_none() {
            return Err(MapError::Disposed("backing store").into());
        }

        let mapping = state
            .views
            .get(&view.id)
            .filter(|_| view.store == self.id)
            .map(|slot| &slot.mapping)
            .ok_or(MapError::FlushFailure {
                view: view.id,
                source: None,
            })?;

        let len = length.min(mapping.len() as u64) as usize;
        if len == 0 {
            return Ok(());
        }

        if let Mapping::ReadWrite(m) = mapping {
            let result = if asynchronous {
                m.flush_async_range(0, len)
            } else {
                m.flush_range(0, len)
            };

            result.map_err(|source| MapError::FlushFailure {
                view: view.id,
                source: Some(source),
            })?;
        }

        Ok(())
    }

    /// Borrows the mapped bytes of a view.
    pub fn bytes<'a>(&'a self, view: &'a View) -> Result<&'a [u8]> {
        let (ptr, len) = {
            let state = self.state.lock();
            let mapping = self.lookup(&state, view)?;
            (mapping.as_ptr(), mapping.len())
        };

        // SAFETY: the mapping stays in the table, at a fixed address, until the
        // view is unmapped (which consumes the token borrowed here) or the store
        // is closed (which needs &mut self, also borrowed here).
        Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
    }

    /// Mutably borrows the mapped bytes of a writable view.
    pub fn bytes_mut<'a>(&'a self, view: &'a mut View) -> Result<&'a mut [u8]> {
        let (ptr, len) = {
            let mut state = self.state.lock();
            let mapping = self.lookup_mut(&mut state, view)?;
            let len = mapping.len();
            let ptr = mapping.as_mut_ptr().ok_or(MapError::UnsupportedOperation {
                op: "write through a read-only view",
            })?;
            (ptr, len)
        };

        // SAFETY: as in bytes(); additionally the token is borrowed mutably and
        // is not Clone, so no other slice of this mapping can exist.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
    }

    /// Forwards an access-pattern hint for the view to the kernel.
    pub fn advise(&self, view: &View, advice: Advice) -> Result<()> {
        let state = self.state.lock();
        let mapping = self.lookup(&state, view)?;
        sys::advise(mapping.as_ptr(), mapping.len(), advice);
        Ok(())
    }

    fn lookup<'s>(&self, state: &'s StoreState, view: &View) -> Result<&'s Mapping> {
        if state.file.is_none() {
            return Err(MapError::Disposed("backing store").into());
        }

        state
            .views
            .get(&view.id)
            .filter(|_| view.store == self.id)
            .map(|slot| &slot.mapping)
            .ok_or_else(|| {
                MapError::InvalidArgument(format!("view {} is not mapped in this store", view.id))
                    .into()
            })
    }

    fn lookup_mut<'s>(&self, state: &'s mut StoreState, view: &View) -> Result<&'s mut Mapping> {
        if state.file.is_none() {
            return Err(MapError::Disposed("backing store").into());
        }

        let id = self.id;
        state
            .views
            .get_mut(&view.id)
            .filter(|_| view.store == id)
            .map(|slot| &mut slot.mapping)
            .ok_or_else(|| {
                MapError::InvalidArgument(format!("view {} is not mapped in this store", view.id))
                    .into()
            })
    }

    /// Unmaps every outstanding view and releases the file. Idempotent.
    pub fn close(&mut self) {
        let state = self.state.get_mut();
        let views = state.views.len();
        state.views.clear();

        if state.file.take().is_some() {
            debug!(store = self.id, views, "closed backing store");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().file.is_none()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.path.is_none()
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn allocation_granularity(&self) -> usize {
        self.granularity
    }

    /// Number of views currently registered in the mapping table.
    pub fn mapped_views(&self) -> usize {
        self.state.lock().views.len()
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn granule(store: &BackingStore) -> u64 {
        store.allocation_granularity() as u64
    }

    fn map_error(report: &eyre::Report) -> &MapError {
        report.downcast_ref::<MapError>().unwrap()
    }

    #[test]
    fn create_named_store_extends_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");

        let store = BackingStore::open(&path, 1024 * 1024).unwrap();

        assert_eq!(store.max_size(), 1024 * 1024);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024 * 1024);
        assert!(!store.is_anonymous());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn open_with_zero_size_uses_file_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        std::fs::write(&path, vec![7u8; 10_000]).unwrap();

        let store = BackingStore::open(&path, 0).unwrap();

        assert_eq!(store.max_size(), 10_000);
    }

    #[test]
    fn open_with_zero_size_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let err = BackingStore::open(&path, 0).unwrap_err();

        assert!(matches!(map_error(&err), MapError::InvalidArgument(_)));
        assert!(!path.exists());
    }

    #[test]
    fn open_with_zero_size_fails_for_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, []).unwrap();

        let err = BackingStore::open(&path, 0).unwrap_err();

        assert!(matches!(map_error(&err), MapError::InvalidArgument(_)));
    }

    #[test]
    fn anonymous_store_rejects_zero_size() {
        let err = BackingStore::anonymous(0).unwrap_err();

        assert!(matches!(map_error(&err), MapError::InvalidArgument(_)));
    }

    #[test]
    fn map_registers_and_unmap_removes() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);

        let a = store.map(Protection::ReadWrite, 0, g).unwrap();
        let b = store.map(Protection::ReadOnly, g, g).unwrap();
        assert_eq!(store.mapped_views(), 2);
        assert_ne!(a.id(), b.id());

        store.unmap(a).unwrap();
        assert_eq!(store.mapped_views(), 1);
        store.unmap(b).unwrap();
        assert_eq!(store.mapped_views(), 0);
    }

    #[test]
    fn map_rejects_unaligned_offset() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();

        let err = store.map(Protection::ReadWrite, 1, 100).unwrap_err();

        assert!(matches!(map_error(&err), MapError::InvalidArgument(_)));
    }

    #[test]
    fn map_rejects_range_past_max_size() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();

        let err = store
            .map(Protection::ReadWrite, 0, 1024 * 1024 + 1)
            .unwrap_err();

        assert!(matches!(
            map_error(&err),
            MapError::InvalidRange {
                bound_end: 1048576,
                ..
            }
        ));
    }

    #[test]
    fn map_rejects_overlap_with_shared_writable_view() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);

        let reader = store.map(Protection::ReadOnly, 0, 2 * g).unwrap();
        let err = store.map(Protection::ReadWrite, g, 2 * g).unwrap_err();
        assert!(matches!(
            map_error(&err),
            MapError::ViewOverlap { view_start: 0, .. }
        ));

        let writer = store.map(Protection::ReadWrite, 2 * g, g).unwrap();
        let err = store.map(Protection::ReadOnly, 2 * g, g).unwrap_err();
        assert!(matches!(map_error(&err), MapError::ViewOverlap { .. }));
        let err = store.map(Protection::WriteCopy, 0, 4 * g).unwrap_err();
        assert!(matches!(map_error(&err), MapError::ViewOverlap { .. }));
        assert_eq!(store.mapped_views(), 2);

        let shared = store.bytes(&reader).unwrap();
        assert_eq!(shared[0], 0);

        store.unmap(writer).unwrap();
        store.map(Protection::ReadWrite, 2 * g, g).unwrap();
    }

    #[test]
    fn read_only_and_private_views_may_overlap() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);

        let _a = store.map(Protection::ReadOnly, 0, 2 * g).unwrap();
        let _b = store.map(Protection::ReadOnly, g, 2 * g).unwrap();
        let _c = store.map(Protection::WriteCopy, 0, 4 * g).unwrap();

        assert_eq!(store.mapped_views(), 3);
    }

    #[test]
    fn adjacent_writable_views_do_not_overlap() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);

        let _left = store.map(Protection::ReadWrite, 0, g).unwrap();
        let _right = store.map(Protection::ReadWrite, g, g).unwrap();

        assert_eq!(store.mapped_views(), 2);
    }

    #[test]
    fn map_rejects_empty_view() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();

        let err = store.map(Protection::ReadWrite, 0, 0).unwrap_err();

        assert!(matches!(map_error(&err), MapError::InvalidArgument(_)));
    }

    #[test]
    fn read_write_view_round_trips() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);

        let mut view = store.map(Protection::ReadWrite, g, g).unwrap();
        store.bytes_mut(&mut view).unwrap()[..4].copy_from_slice(b"abcd");
        store.unmap(view).unwrap();

        let view = store.map(Protection::ReadOnly, g, g).unwrap();
        assert_eq!(&store.bytes(&view).unwrap()[..4], b"abcd");
    }

    #[test]
    fn read_only_view_refuses_mutable_access() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);

        let mut view = store.map(Protection::ReadOnly, 0, g).unwrap();
        let err = store.bytes_mut(&mut view).unwrap_err();

        assert!(matches!(
            map_error(&err),
            MapError::UnsupportedOperation { .. }
        ));
    }

    #[test]
    fn write_copy_view_does_not_reach_the_file() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);

        let mut private = store.map(Protection::WriteCopy, 0, g).unwrap();
        store.bytes_mut(&mut private).unwrap()[0] = 0xAB;
        store.flush(&private, g).unwrap();

        let shared = store.map(Protection::ReadOnly, 0, g).unwrap();
        assert_eq!(store.bytes(&private).unwrap()[0], 0xAB);
        assert_eq!(store.bytes(&shared).unwrap()[0], 0);
    }

    #[test]
    fn flush_persists_named_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");

        {
            let store = BackingStore::open(&path, 256 * 1024).unwrap();
            let g = granule(&store);
            let mut view = store.map(Protection::ReadWrite, g, g).unwrap();
            let bytes = store.bytes_mut(&mut view).unwrap();
            bytes[50] = 0xBE;
            bytes[51] = 0xEF;
            store.flush(&view, g).unwrap();
        }

        let data = std::fs::read(&path).unwrap();
        let g = crate::storage::allocation_granularity();
        assert_eq!(data[g + 50], 0xBE);
        assert_eq!(data[g + 51], 0xEF);
    }

    #[test]
    fn flush_of_foreign_view_fails() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let other = BackingStore::anonymous(1024 * 1024).unwrap();
        let view = other.map(Protection::ReadWrite, 0, 4096).unwrap();

        let err = store.flush(&view, 4096).unwrap_err();

        assert!(matches!(map_error(&err), MapError::FlushFailure { .. }));
    }

    #[test]
    fn unmap_of_foreign_view_fails() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let other = BackingStore::anonymous(1024 * 1024).unwrap();
        let view = other.map(Protection::ReadWrite, 0, 4096).unwrap();

        let err = store.unmap(view).unwrap_err();

        assert!(matches!(map_error(&err), MapError::UnmapFailure { .. }));
        assert_eq!(other.mapped_views(), 1);
    }

    #[test]
    fn close_unmaps_everything_and_is_idempotent() {
        let mut store = BackingStore::anonymous(1024 * 1024).unwrap();
        let g = granule(&store);
        let view = store.map(Protection::ReadWrite, 0, g).unwrap();

        store.close();
        store.close();

        assert!(store.is_closed());
        assert_eq!(store.mapped_views(), 0);

        let err = store.bytes(&view).unwrap_err();
        assert!(matches!(map_error(&err), MapError::Disposed(_)));

        let err = store.map(Protection::ReadWrite, 0, g).unwrap_err();
        assert!(matches!(map_error(&err), MapError::Disposed(_)));

        store.unmap(view).unwrap();
    }

    #[test]
    fn zero_copy_view_access() {
        let store = BackingStore::anonymous(1024 * 1024).unwrap();
        let view = store.map(Protection::ReadOnly, 0, 4096).unwrap();

        let first = store.bytes(&view).unwrap();
        let second = store.bytes(&view).unwrap();

        assert_eq!(first.as_ptr(), second.as_ptr());
    }
}
