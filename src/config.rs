//! Dataset configuration
//!
//! A [`DatasetConfig`] describes the two logical streams of a new dataset and
//! how they are split into extents. It can be built in code, through
//! [`crate::DatasetBuilder`], or read from TOML:
//!
//! ```toml
//! trace_length = 1073741824
//! trace_frame_bytes = 2097152
//! header_length = 67108864
//! header_frame_bytes = 131072
//! num_extents = 16
//! folders = ["/prim/home/proj/sub/line.js", "/sec1/home/proj/sub/line.js"]
//! ```

use crate::core::extent::{compute_extent_size, extents_needed};
use crate::core::io::DEFAULT_CACHE_CAPACITY;
use crate::core::stream::StreamKind;
use crate::error::{ExtentError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Extent size aimed for when the extent count is not given
pub const DEFAULT_TARGET_EXTENT_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Configuration file written next to the dataset metadata
pub const DATASET_CONFIG_FILE: &str = "Dataset.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Logical length of the trace-data stream in bytes
    pub trace_length: u64,

    /// Bytes per trace frame; extents are sized in whole frames
    pub trace_frame_bytes: u64,

    /// Logical length of the trace-header stream in bytes
    pub header_length: u64,

    /// Bytes per header frame
    pub header_frame_bytes: u64,

    /// Requested extents per stream (may shrink after frame rounding)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_extents: Option<u64>,

    /// Extent size aimed for when `num_extents` is unset
    pub target_extent_size: u64,

    /// Write-behind buffer size per stream
    pub cache_capacity: usize,

    /// Folder specs (`path[,ATTRIBUTE]`); empty means the dataset directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            trace_length: 0,
            trace_frame_bytes: 1,
            header_length: 0,
            header_frame_bytes: 1,
            num_extents: None,
            target_extent_size: DEFAULT_TARGET_EXTENT_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            folders: Vec::new(),
        }
    }
}

/// Extent layout of one stream derived from a config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    pub num_extents: usize,
    pub extent_size: u64,
    pub max_file_position: u64,
}

impl DatasetConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DatasetConfig = toml::from_str(text)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.to_toml_string()?)?;
        Ok(())
    }

    pub fn length(&self, kind: StreamKind) -> u64 {
        match kind {
            StreamKind::TraceData => self.trace_length,
            StreamKind::TraceHeaders => self.header_length,
        }
    }

    pub fn frame_bytes(&self, kind: StreamKind) -> u64 {
        match kind {
            StreamKind::TraceData => self.trace_frame_bytes,
            StreamKind::TraceHeaders => self.header_frame_bytes,
        }
    }

    /// Check the values needed to create a dataset
    pub fn validate(&self) -> Result<()> {
        for kind in StreamKind::ALL {
            if self.length(kind) == 0 {
                return Err(ExtentError::invalid(format!("{} length must be positive", kind)));
            }
            if self.frame_bytes(kind) == 0 {
                return Err(ExtentError::invalid(format!(
                    "{} frame size must be positive",
                    kind
                )));
            }
        }
        if self.num_extents == Some(0) {
            return Err(ExtentError::invalid("num_extents must be positive"));
        }
        if self.target_extent_size == 0 {
            return Err(ExtentError::invalid("target_extent_size must be positive"));
        }
        if self.cache_capacity == 0 {
            return Err(ExtentError::invalid("cache_capacity must be positive"));
        }
        Ok(())
    }

    /// Frame-aligned extent layout of `kind`
    ///
    /// Frame rounding can make the extents larger than an even split, in which
    /// case fewer extents are used so none is left empty.
    pub fn layout(&self, kind: StreamKind) -> Result<StreamLayout> {
        let length = self.length(kind);
        let requested = match self.num_extents {
            Some(n) => n,
            None => extents_needed(length, self.target_extent_size)?,
        };
        let extent_size = compute_extent_size(length, requested, self.frame_bytes(kind))?;
        let num_extents = extents_needed(length, extent_size)?;

        Ok(StreamLayout {
            num_extents: usize::try_from(num_extents)
                .map_err(|_| ExtentError::invalid("too many extents for this platform"))?,
            extent_size,
            max_file_position: length,
        })
    }
}
