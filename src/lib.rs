//! # seisvfio - Extent Storage for Large Seismic Datasets
//!
//! A seismic dataset keeps its trace samples and trace headers in two logical
//! byte streams that can be terabytes long. `seisvfio` stores each stream as a
//! sequence of bounded-size files (extents) spread over a list of directories
//! (virtual folders), so no single filesystem or directory has to hold it.
//!
//! - **Deterministic layout**: extent `i` of a stream lives at
//!   `<folder>/<base><i>` and covers `[extent_size * i, extent_size * (i + 1))`
//! - **Recovery**: extent tables are rebuilt by scanning the folders, sorting
//!   by index and filling never-written extents with placeholders
//! - **Segmented I/O**: any `(offset, length)` request is split across extents
//!   with at most one open descriptor per stream
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seisvfio::{Dataset, DatasetBuilder, Result, StreamKind};
//!
//! # fn main() -> Result<()> {
//! let mut dataset = DatasetBuilder::new("/data/home/proj/sub/line.js")
//!     .folder("/data/home/proj/sub/line.js")
//!     .folder("/sec1/home/proj/sub/line.js")
//!     .trace_stream(64 * 1024 * 1024, 4096)
//!     .header_stream(4 * 1024 * 1024, 256)
//!     .num_extents(4)
//!     .create()?;
//!
//! dataset.write(StreamKind::TraceData, 8192, b"samples")?;
//! dataset.close()?;
//!
//! // Later: recover the extent tables from disk
//! let mut dataset = DatasetBuilder::new("/data/home/proj/sub/line.js")
//!     .folder("/data/home/proj/sub/line.js")
//!     .folder("/sec1/home/proj/sub/line.js")
//!     .open()?;
//! let mut buf = [0u8; 7];
//! dataset.read(StreamKind::TraceData, 8192, &mut buf)?;
//! assert_eq!(&buf, b"samples");
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! ```text
//! /data/home/proj/sub/line.js/          folder 0 (also holds metadata)
//!   VirtualFolders.toml                 folder list
//!   TraceFile.toml, TraceHeaders.toml   extent-manager scalars
//!   Dataset.toml                        stream configuration
//!   TraceFile0 .. TraceFile{k-1}        first share of trace extents
//!   TraceHeaders0 ..
//! /sec1/home/proj/sub/line.js/          folder 1
//!   TraceFile{k} ..
//! ```

pub mod config;
pub mod core;
pub mod dataset;
pub mod error;

pub use crate::config::{DatasetConfig, StreamLayout};
pub use crate::core::codec::{FrameCodec, Uncompressed};
pub use crate::core::extent::{compute_extent_size, ExtentList, ExtentListEntry};
pub use crate::core::folders::{FolderAttribute, VirtualFolder, VirtualFolders};
pub use crate::core::io::{CacheWriter, ExtentStream, WriteBehindCache};
pub use crate::core::stream::StreamKind;
pub use crate::dataset::{Dataset, DatasetBuilder};
pub use crate::error::{ExtentError, Result, Severity};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
