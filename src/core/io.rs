//! Segmented extent I/O
//!
//! An [`ExtentStream`] turns `(logical offset, buffer)` requests into per-extent
//! writes and reads. Writes go through a [`CacheWriter`] bound to exactly one
//! open extent file at a time. Moving to another extent always flushes and
//! closes the current file before the next one is opened, so bytes of extent K
//! reach the OS before anything of extent K+1 does.

use crate::core::extent::ExtentList;
use crate::error::{ExtentError, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tracing::{debug, trace};

/// Default write-behind buffer size
pub const DEFAULT_CACHE_CAPACITY: usize = 4 * 1024 * 1024;

/// Write-behind buffer bound to one extent file at a time
pub trait CacheWriter {
    /// Attach a freshly opened extent file
    fn bind(&mut self, file: File);

    /// Queue `bytes` for `local_offset` of the bound file
    fn write(&mut self, local_offset: u64, bytes: &[u8]) -> io::Result<()>;

    /// Push queued bytes to the bound file
    fn flush(&mut self) -> io::Result<()>;

    /// Detach the bound file, discarding anything not yet flushed
    fn release(&mut self) -> Option<File>;
}

/// Default [`CacheWriter`]: coalesces contiguous writes into one buffer
#[derive(Debug)]
pub struct WriteBehindCache {
    file: Option<File>,
    buffer: Vec<u8>,
    buffer_offset: u64,
    capacity: usize,
}

impl WriteBehindCache {
    pub fn new(capacity: usize) -> Self {
        WriteBehindCache {
            file: None,
            buffer: Vec::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
            buffer_offset: 0,
            capacity: capacity.max(1),
        }
    }

    /// Bytes waiting to be written
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "no extent file bound"))
    }

    fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> io::Result<()> {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)
    }

    fn drain_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let offset = self.buffer_offset;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "no extent file bound"))?;
        Self::write_at(file, offset, &self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

impl Default for WriteBehindCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl CacheWriter for WriteBehindCache {
    fn bind(&mut self, file: File) {
        self.buffer.clear();
        self.file = Some(file);
    }

    fn write(&mut self, local_offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.file_mut()?;

        let contiguous = local_offset == self.buffer_offset + self.buffer.len() as u64;
        if !self.buffer.is_empty() && (!contiguous || self.buffer.len() + bytes.len() > self.capacity) {
            self.drain_buffer()?;
        }

        if bytes.len() >= self.capacity {
            let file = self.file_mut()?;
            return Self::write_at(file, local_offset, bytes);
        }

        if self.buffer.is_empty() {
            self.buffer_offset = local_offset;
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_buffer()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn release(&mut self) -> Option<File> {
        self.buffer.clear();
        self.file.take()
    }
}

/// One logical stream: its extent table plus the single live descriptor
pub struct ExtentStream<W: CacheWriter = WriteBehindCache> {
    extents: ExtentList,
    writer: W,
    bound_extent: Option<usize>,
}

impl ExtentStream<WriteBehindCache> {
    pub fn new(extents: ExtentList) -> Self {
        Self::with_writer(extents, WriteBehindCache::default())
    }

    pub fn with_capacity(extents: ExtentList, capacity: usize) -> Self {
        Self::with_writer(extents, WriteBehindCache::new(capacity))
    }
}

impl<W: CacheWriter> ExtentStream<W> {
    pub fn with_writer(extents: ExtentList, writer: W) -> Self {
        ExtentStream {
            extents,
            writer,
            bound_extent: None,
        }
    }

    pub fn extents(&self) -> &ExtentList {
        &self.extents
    }

    /// Mutable table access; closes the live descriptor first
    pub fn extents_mut(&mut self) -> Result<&mut ExtentList> {
        self.close()?;
        Ok(&mut self.extents)
    }

    /// Extent currently bound to the cache writer
    pub fn bound_extent(&self) -> Option<usize> {
        self.bound_extent
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Write `buffer` at `logical_offset`, splitting it across extents
    ///
    /// The first extent is resolved from `logical_offset + 1` and the last from
    /// `logical_offset + len`, so a span starting exactly on an extent boundary
    /// lands in the extent that starts there. A failed open or write resets the
    /// descriptor and returns a recoverable error; nothing is retried here.
    pub fn write_span(&mut self, logical_offset: u64, buffer: &[u8]) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let (low, high) = self.resolve_span(logical_offset, buffer.len())?;
        let mut local = logical_offset - self.extents.entries()[low].start_offset();
        let mut cursor = 0usize;

        for index in low..=high {
            let size = self.extents.entries()[index].size();
            let remaining = (buffer.len() - cursor) as u64;
            let count = remaining.min(size - local) as usize;

            self.bind_extent(index)?;
            if let Err(source) = self.writer.write(local, &buffer[cursor..cursor + count]) {
                let path = self.extent_path(index);
                self.invalidate();
                return Err(ExtentError::ExtentWrite { path, source });
            }

            trace!("Wrote {} bytes at {} of extent {}", count, local, index);
            cursor += count;
            local = 0;
        }
        Ok(())
    }

    /// Read `buffer.len()` bytes at `logical_offset`
    ///
    /// Extents that were never materialized, and bytes past the end of a
    /// short extent file, read as zeros.
    pub fn read_span(&mut self, logical_offset: u64, buffer: &mut [u8]) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let (low, high) = self.resolve_span(logical_offset, buffer.len())?;
        self.flush()?;

        let mut local = logical_offset - self.extents.entries()[low].start_offset();
        let mut cursor = 0usize;

        for index in low..=high {
            let size = self.extents.entries()[index].size();
            let remaining = (buffer.len() - cursor) as u64;
            let count = remaining.min(size - local) as usize;
            let target = &mut buffer[cursor..cursor + count];

            let path = self.extent_path(index);
            read_extent(&path, local, target)
                .map_err(|source| ExtentError::ExtentRead { path, source })?;

            cursor += count;
            local = 0;
        }
        Ok(())
    }

    /// Push buffered bytes of the bound extent to its file
    pub fn flush(&mut self) -> Result<()> {
        let Some(index) = self.bound_extent else {
            return Ok(());
        };
        if let Err(source) = self.writer.flush() {
            let path = self.extent_path(index);
            self.invalidate();
            return Err(ExtentError::ExtentWrite { path, source });
        }
        Ok(())
    }

    /// Flush and close the live descriptor
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(index) = self.bound_extent.take() {
            drop(self.writer.release());
            debug!("Closed extent {}", index);
        }
        Ok(())
    }

    /// `(first, last)` extent touched by `len` bytes at `logical_offset`
    fn resolve_span(&self, logical_offset: u64, len: usize) -> Result<(usize, usize)> {
        let invalid = ExtentError::InvalidSpan {
            offset: logical_offset,
            length: len as u64,
        };
        let end = match logical_offset.checked_add(len as u64) {
            Some(end) => end,
            None => return Err(invalid),
        };

        let low = self.extents.extent_index(logical_offset + 1)?;
        let high = self.extents.extent_index(end)?;
        if high < low {
            return Err(invalid);
        }
        Ok((low, high))
    }

    /// Make `index` the live extent, flushing and closing the previous one first
    fn bind_extent(&mut self, index: usize) -> Result<()> {
        if self.bound_extent == Some(index) {
            return Ok(());
        }

        let is_placeholder = self
            .extents
            .entry(index)
            .map_or(false, |e| e.is_placeholder());
        if is_placeholder && !self.extents.accepts_new_extents() {
            return Err(ExtentError::invalid(format!(
                "extent {} was never written and no folder accepts new extents",
                index
            )));
        }

        if let Some(previous) = self.bound_extent {
            if let Err(source) = self.writer.flush() {
                let path = self.extent_path(previous);
                self.invalidate();
                return Err(ExtentError::ExtentWrite { path, source });
            }
            drop(self.writer.release());
            self.bound_extent = None;
            trace!("Closed extent {}", previous);
        }

        let path = self.extent_path(index);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| ExtentError::ExtentOpen {
                path: path.clone(),
                source,
            })?;

        self.writer.bind(file);
        self.bound_extent = Some(index);
        if self.extents.promote_placeholder(index) {
            debug!("Materialized extent {}", path.display());
        } else {
            trace!("Opened extent {}", path.display());
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        drop(self.writer.release());
        self.bound_extent = None;
    }

    fn extent_path(&self, index: usize) -> PathBuf {
        self.extents
            .extent_path(index)
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    }
}

impl<W: CacheWriter> Drop for ExtentStream<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("Failed to close extent stream on drop: {}", e);
        }
    }
}

/// Fill `target` from `path` at `offset`; absent files and short files read as zeros
fn read_extent(path: &std::path::Path, offset: u64, target: &mut [u8]) -> io::Result<()> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            target.fill(0);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < target.len() {
        match file.read(&mut target[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    target[filled..].fill(0);
    Ok(())
}
