//! A single row of the extent table

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Suffix marking a table slot whose file was never materialized
pub const PLACEHOLDER_SUFFIX: &str = "_NOT_FOUND";

/// One extent: a contiguous slice `[start_offset, start_offset + size)` of a
/// logical stream stored in the file at `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtentListEntry {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) start_offset: u64,
    pub(crate) size: u64,
    pub(crate) path: PathBuf,
}

impl ExtentListEntry {
    pub(crate) fn new(name: String, index: usize, start_offset: u64, size: u64, path: PathBuf) -> Self {
        ExtentListEntry {
            name,
            index,
            start_offset,
            size,
            path,
        }
    }

    pub(crate) fn placeholder(base_name: &str, index: usize, start_offset: u64, size: u64, path: PathBuf) -> Self {
        Self::new(
            format!("{}{}{}", base_name, index, PLACEHOLDER_SUFFIX),
            index,
            start_offset,
            size,
            path,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// One past the last logical byte of this extent
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True for a synthesized entry whose file was not found on disk
    pub fn is_placeholder(&self) -> bool {
        self.name.ends_with(PLACEHOLDER_SUFFIX)
    }
}
