//! # Sliding Window
//!
//! A `Window` owns at most one mapped view over a bounded sub-range of a
//! [`BackingStore`] and moves that view on demand. It makes stores larger than
//! the address space (or larger than a caller's working-set budget) usable
//! through a small, fixed virtual-memory footprint.
//!
//! ## Ranges
//!
//! ```text
//! store:   0                                                   max_size
//!          |----------------------------------------------------|
//! window:        map_start                      map_start+map_size
//!                |--------------------------------------|
//! view:                 view_start   view_start+view_size
//!                       |-------------|
//! ```
//!
//! Invariants maintained by every remap:
//!
//! - `map_start <= view_start` and `view_start + view_size <= map_start + map_size`
//! - `view_start` is a multiple of the store's allocation granularity
//! - `map_start` itself is granularity aligned (checked at construction), so
//!   aligning a view start down never leaves the window's range
//!
//! ## Remapping
//!
//! `remap_to(start, size)` trims the request to the window, aligns the start
//! down to the allocation granularity (growing the size so the requested bytes
//! stay covered), and replaces the active view unless it already has exactly
//! that start and size. The old view is unmapped before the new one is mapped,
//! so at most one view's worth of address space is in use.
//!
//! `remap_centered(center, size)` places the view around a position, for
//! access patterns that wander in both directions from it.
//!
//! `slide(pos, centered)` moves a full-size view to a position given relative
//! to the window (`SeekFrom::Current` counts from the current view start) and
//! returns where that position landed inside the new view.
//!
//! ## Safety Model
//!
//! Slices returned by `view()` and `view_mut()` borrow the window. Remapping
//! requires `&mut self`, so the compiler rejects any attempt to keep a slice of
//! the previous view across a remap.
//!
//! ## Failure Semantics
//!
//! Validation happens before the active view is touched, so a rejected request
//! leaves the window as it was. If the OS refuses the new mapping after the
//! old view was unmapped, the window is left unmapped and the next remap
//! starts from scratch.

mod stream;

pub use stream::MappedStream;

use std::io::SeekFrom;
use std::ops::Range;

use eyre::Result;
use tracing::{trace, warn};

use crate::config::{default_view_size, min_view_size, MAX_VIEW_SIZE};
use crate::error::MapError;
use crate::storage::{Advice, BackingStore, Protection, View};

/// Settings for a [`Window`] or [`MappedStream`].
///
/// | Option     | Default                     | Description                         |
/// |------------|-----------------------------|-------------------------------------|
/// | map_start  | 0                           | First store offset the window sees  |
/// | map_size   | rest of the store           | Length of the window's range        |
/// | view_size  | 32 × minimum view size      | Desired size of each mapped view    |
/// | protection | `ReadWrite`                 | Protection of every mapped view     |
/// | advice     | none                        | Access hint applied to each view    |
#[derive(Debug, Clone, Default)]
pub struct WindowConfig {
    map_start: u64,
    map_size: u64,
    view_size: Option<u64>,
    protection: Protection,
    advice: Option<Advice>,
}

impl WindowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first store offset covered by the window. Must be a multiple
    /// of the store's allocation granularity.
    pub fn map_start(mut self, offset: u64) -> Self {
        self.map_start = offset;
        self
    }

    /// Sets the length of the window's range. 0 means "to the end of the store".
    pub fn map_size(mut self, size: u64) -> Self {
        self.map_size = size;
        self
    }

    pub fn view_size(mut self, size: u64) -> Self {
        self.view_size = Some(size);
        self
    }

    pub fn protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    pub fn read_only(self) -> Self {
        self.protection(Protection::ReadOnly)
    }

    pub fn advice(mut self, advice: Advice) -> Self {
        self.advice = Some(advice);
        self
    }
}

#[derive(Debug)]
pub struct Window<'s> {
    store: &'s BackingStore,
    map_start: u64,
    map_size: u64,
    desired_view_size: u64,
    granularity: u64,
    protection: Protection,
    advice: Option<Advice>,
    view: Option<View>,
    closed: bool,
}

impl<'s> Window<'s> {
    /// Creates a window over `store` and maps its first view at `map_start`.
    pub fn new(store: &'s BackingStore, config: WindowConfig) -> Result<Self> {
        if store.is_closed() {
            return Err(MapError::Disposed("backing store").into());
        }

        let max_size = store.max_size();
        let granularity = store.allocation_granularity() as u64;

        if config.map_start > max_size {
            return Err(MapError::InvalidArgument(format!(
                "map start {} is beyond the store size {}",
                config.map_start, max_size
            ))
            .into());
        }

        if config.map_start % granularity != 0 {
            return Err(MapError::InvalidArgument(format!(
                "map start {} is not a multiple of the allocation granularity {}",
                config.map_start, granularity
            ))
            .into());
        }

        let map_size = if config.map_size == 0 {
            max_size - config.map_start
        } else {
            config.map_size
        };

        let fits = config
            .map_start
            .checked_add(map_size)
            .is_some_and(|end| end <= max_size);

        if map_size == 0 || !fits {
            return Err(MapError::InvalidArgument(format!(
                "map size {} at start {} does not fit the store size {}",
                map_size, config.map_start, max_size
            ))
            .into());
        }

        let desired_view_size = config
            .view_size
            .unwrap_or_else(|| default_view_size(granularity));
        let min = min_view_size(granularity);

        if desired_view_size < min || desired_view_size > MAX_VIEW_SIZE {
            return Err(MapError::InvalidArgument(format!(
                "view size {} is outside [{}, {}]",
                desired_view_size, min, MAX_VIEW_SIZE
            ))
            .into());
        }

        let mut window = Self {
            store,
            map_start: config.map_start,
            map_size,
            desired_view_size,
            granularity,
            protection: config.protection,
            advice: config.advice,
            view: None,
            closed: false,
        };

        window.remap_to(window.map_start, desired_view_size)?;

        Ok(window)
    }

    /// Maps a view covering `[target_start, target_start + target_size)`,
    /// trimmed to the window and aligned down to the allocation granularity.
    /// Returns the resulting view start and size.
    pub fn remap_to(&mut self, target_start: u64, target_size: u64) -> Result<(u64, u64)> {
        self.ensure_open()?;
        self.validate_request(target_start, target_size)?;

        let map_end = self.map_end();
        let mut size = target_size.min(map_end - target_start);
        if size == 0 {
            return Err(self.invalid_range(target_start, target_size).into());
        }

        let adjustment = target_start % self.granularity;
        let start = target_start - adjustment;
        size += adjustment;

        if let Some(view) = &self.view {
            if view.offset() == start && view.len() as u64 == size {
                trace!(start, size, "view already covers request");
                return Ok((start, size));
            }
        }

        if let Some(old) = self.view.take() {
            self.store.unmap(old)?;
        }

        let view = self.store.map(self.protection, start, size)?;
        if let Some(advice) = self.advice {
            self.store.advise(&view, advice)?;
        }

        trace!(
            requested = target_start,
            start,
            size,
            "remapped window view"
        );

        self.view = Some(view);
        Ok((start, size))
    }

    /// Maps a view of `target_size` bytes centered on `target_center`, clamped
    /// to the window.
    pub fn remap_centered(&mut self, target_center: u64, target_size: u64) -> Result<(u64, u64)> {
        self.ensure_open()?;
        self.validate_request(target_center, target_size)?;

        let map_end = self.map_end();
        let mut start = target_center
            .saturating_sub(target_size / 2)
            .max(self.map_start);

        if start + target_size > map_end {
            start = map_end.saturating_sub(target_size).max(self.map_start);
        }

        self.remap_to(start, target_size)
    }

    /// Moves a view of the desired size to a window-relative position and
    /// returns the position's offset within the new view. Positions outside
    /// `[0, map_size]` fail with `InvalidSeek`; the window's end is reached
    /// with a centered view.
    pub fn slide(&mut self, pos: SeekFrom, centered: bool) -> Result<u64> {
        self.ensure_open()?;

        let current = self.view_start().map_or(0, |start| start - self.map_start);
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => current as i128 + delta as i128,
            SeekFrom::End(delta) => self.map_size as i128 + delta as i128,
        };

        if target < 0 || target > self.map_size as i128 {
            return Err(MapError::InvalidSeek {
                position: target,
                length: self.map_size,
            }
            .into());
        }

        let abs = self.map_start + target as u64;
        let (start, _) = if centered || abs == self.map_end() {
            self.remap_centered(abs, self.desired_view_size)?
        } else {
            self.remap_to(abs, self.desired_view_size)?
        };

        Ok(abs - start)
    }

    fn validate_request(&self, target: u64, size: u64) -> Result<()> {
        if target < self.map_start
            || target > self.map_end()
            || size == 0
            || size > self.desired_view_size
        {
            return Err(self.invalid_range(target, size).into());
        }
        Ok(())
    }

    fn invalid_range(&self, start: u64, len: u64) -> MapError {
        MapError::InvalidRange {
            start,
            len,
            bound_start: self.map_start,
            bound_end: self.map_end(),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(MapError::Disposed("window").into());
        }
        Ok(())
    }

    /// Bytes of the active view.
    pub fn view(&self) -> Result<&[u8]> {
        self.ensure_open()?;
        let view = self.view.as_ref().ok_or(MapError::NotMapped)?;
        self.store.bytes(view)
    }

    /// Mutable bytes of the active view. Fails on read-only windows.
    pub fn view_mut(&mut self) -> Result<&mut [u8]> {
        self.ensure_open()?;
        let view = self.view.as_mut().ok_or(MapError::NotMapped)?;
        self.store.bytes_mut(view)
    }

    /// Store offsets covered by the active view.
    pub fn view_range(&self) -> Option<Range<u64>> {
        self.view.as_ref().map(|v| v.offset()..v.end())
    }

    pub fn view_start(&self) -> Option<u64> {
        self.view.as_ref().map(View::offset)
    }

    pub fn view_size(&self) -> Option<u64> {
        self.view.as_ref().map(|v| v.len() as u64)
    }

    /// True if the store offset lies inside the active view.
    pub fn contains(&self, offset: u64) -> bool {
        self.view_range().is_some_and(|r| r.contains(&offset))
    }

    pub fn is_mapped(&self) -> bool {
        self.view.is_some()
    }

    /// Forces dirty pages of the active view to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        match &self.view {
            Some(view) => self.store.flush(view, view.len() as u64),
            None => Ok(()),
        }
    }

    /// Unmaps the active view. Idempotent; later access fails with `Disposed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(view) = self.view.take() {
            self.store.unmap(view)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn store(&self) -> &'s BackingStore {
        self.store
    }

    pub fn map_start(&self) -> u64 {
        self.map_start
    }

    pub fn map_size(&self) -> u64 {
        self.map_size
    }

    pub fn map_end(&self) -> u64 {
        self.map_start + self.map_size
    }

    pub fn desired_view_size(&self) -> u64 {
        self.desired_view_size
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }
}

impl Drop for Window<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to unmap window view on drop");
        }
    }
}
