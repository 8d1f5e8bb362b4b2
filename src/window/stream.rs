//! # Mapped Stream
//!
//! A seekable byte stream over a window's range. Positions are logical:
//! position 0 is the window's `map_start`, and the stream's length is the
//! window's `map_size`. The stream cannot grow or shrink.
//!
//! Reads and writes copy through the active view and remap it whenever the
//! position leaves it, so a transfer larger than the view is split into
//! several view-sized chunks. The result is byte-identical to a transfer
//! through one mapping of the whole range.
//!
//! `MappedStream` implements `std::io::{Read, Write, Seek}`. Errors crossing
//! the `std::io` boundary carry their [`MapError`] as the inner error.

use std::io::{self, SeekFrom};

use eyre::Result;
use tracing::trace;

use crate::error::{report_into_io, MapError};
use crate::storage::BackingStore;

use super::{Window, WindowConfig};

#[derive(Debug)]
pub struct MappedStream<'s> {
    window: Window<'s>,
    position: u64,
}

impl<'s> MappedStream<'s> {
    pub fn new(store: &'s BackingStore, config: WindowConfig) -> Result<Self> {
        Ok(Self::from_window(Window::new(store, config)?))
    }

    /// Wraps an existing window. The stream starts at position 0.
    pub fn from_window(window: Window<'s>) -> Self {
        Self {
            window,
            position: 0,
        }
    }

    pub fn length(&self) -> u64 {
        self.window.map_size()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Offset of the current position inside the active view, if covered.
    pub fn view_position(&self) -> Option<u64> {
        let abs = self.absolute();
        self.window
            .view_range()
            .filter(|r| r.start <= abs && abs <= r.end)
            .map(|r| abs - r.start)
    }

    pub fn window(&self) -> &Window<'s> {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window<'s> {
        &mut self.window
    }

    pub fn into_window(self) -> Window<'s> {
        self.window
    }

    fn absolute(&self) -> u64 {
        self.window.map_start() + self.position
    }

    /// Makes the current position addressable. Returns the offset into the
    /// view and the bytes left in the view from there.
    fn locate(&mut self) -> Result<(usize, usize)> {
        let abs = self.absolute();
        if !self.window.contains(abs) {
            let size = self.window.desired_view_size();
            self.window.remap_to(abs, size)?;
        }

        let range = self.window.view_range().ok_or(MapError::NotMapped)?;
        Ok(((abs - range.start) as usize, (range.end - abs) as usize))
    }

    fn remaining(&self, wanted: usize) -> usize {
        let left = self.length() - self.position;
        (wanted as u64).min(left) as usize
    }

    /// Copies up to `buf.len()` bytes from the current position. Returns 0 at
    /// the end of the stream.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.window.ensure_open()?;
        let total = self.remaining(buf.len());

        let mut done = 0;
        while done < total {
            let (at, left) = self.locate()?;
            let n = left.min(total - done);
            let view = self.window.view()?;
            buf[done..done + n].copy_from_slice(&view[at..at + n]);
            done += n;
            self.position += n as u64;
        }

        Ok(done)
    }

    /// Copies up to `buf.len()` bytes to the current position. Returns fewer
    /// bytes than requested only at the end of the stream.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        self.window.ensure_open()?;
        if !self.window.protection().is_writable() {
            return Err(MapError::UnsupportedOperation {
                op: "write to a read-only stream",
            }
            .into());
        }
        let total = self.remaining(buf.len());

        let mut done = 0;
        while done < total {
            let (at, left) = self.locate()?;
            let n = left.min(total - done);
            let view = self.window.view_mut()?;
            view[at..at + n].copy_from_slice(&buf[done..done + n]);
            done += n;
            self.position += n as u64;
        }

        Ok(done)
    }

    /// Moves the position.
    ///
    /// The view is remapped when the new position falls outside it, or always
    /// when `force_remap` is set. A remap places the view centered on the
    /// position when `prefer_centered` is set or when seeking to the very end,
    /// and starting at the position otherwise.
    pub fn seek_with(
        &mut self,
        pos: SeekFrom,
        force_remap: bool,
        prefer_centered: bool,
    ) -> Result<u64> {
        self.window.ensure_open()?;
        let length = self.length();

        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
            SeekFrom::End(delta) => length as i128 + delta as i128,
        };

        if target < 0 || target > length as i128 {
            return Err(MapError::InvalidSeek {
                position: target,
                length,
            }
            .into());
        }

        let new_position = target as u64;
        let abs = self.window.map_start() + new_position;
        let map_end = self.window.map_end();
        let at_end = abs == map_end;

        let covered = self.window.contains(abs)
            || (at_end && self.window.view_range().is_some_and(|r| r.end == map_end));

        if force_remap || !covered {
            let size = self.window.desired_view_size();
            if prefer_centered || at_end {
                self.window.remap_centered(abs, size)?;
            } else {
                self.window.remap_to(abs, size)?;
            }
            trace!(
                position = new_position,
                centered = prefer_centered || at_end,
                "seek remapped view"
            );
        }

        self.position = new_position;
        Ok(new_position)
    }

    /// Flushes dirty pages of the active view to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.window.flush()
    }

    /// Streams have a fixed length.
    pub fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(MapError::UnsupportedOperation {
            op: "resize a mapped stream",
        }
        .into())
    }

    pub fn close(&mut self) -> Result<()> {
        self.window.close()
    }
}

impl io::Read for MappedStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(report_into_io)
    }
}

impl io::Write for MappedStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(report_into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        MappedStream::flush(self).map_err(report_into_io)
    }
}

impl io::Seek for MappedStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_with(pos, false, false).map_err(report_into_io)
    }
}
