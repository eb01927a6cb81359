//! Dataset session
//!
//! A [`Dataset`] owns the folder list and one [`ExtentStream`] per logical
//! stream (trace data and trace headers). It is the single writer of its
//! extents for as long as it is open.

use crate::config::{DatasetConfig, DATASET_CONFIG_FILE};
use crate::core::codec::FrameCodec;
use crate::core::extent::ExtentList;
use crate::core::folders::{VirtualFolder, VirtualFolders, VIRTUAL_FOLDERS_FILE};
use crate::core::io::ExtentStream;
use crate::core::stream::StreamKind;
use crate::error::{ExtentError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An open dataset: folders plus the trace and header streams
pub struct Dataset {
    path: PathBuf,
    config: DatasetConfig,
    folders: VirtualFolders,
    traces: ExtentStream,
    headers: ExtentStream,
    scratch: Vec<u8>,
}

impl Dataset {
    pub fn builder(path: impl AsRef<Path>) -> DatasetBuilder {
        DatasetBuilder::new(path)
    }

    /// Create a dataset at `path` laid out by `config`
    pub fn create(path: impl AsRef<Path>, config: DatasetConfig) -> Result<Self> {
        DatasetBuilder::new(path).config(config).create()
    }

    /// Open an existing dataset, loading its folder list from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        DatasetBuilder::new(path).open()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn folders(&self) -> &VirtualFolders {
        &self.folders
    }

    /// Extent table of one stream
    pub fn extents(&self, kind: StreamKind) -> &ExtentList {
        self.stream(kind).extents()
    }

    pub fn stream(&self, kind: StreamKind) -> &ExtentStream {
        match kind {
            StreamKind::TraceData => &self.traces,
            StreamKind::TraceHeaders => &self.headers,
        }
    }

    pub fn stream_mut(&mut self, kind: StreamKind) -> &mut ExtentStream {
        match kind {
            StreamKind::TraceData => &mut self.traces,
            StreamKind::TraceHeaders => &mut self.headers,
        }
    }

    /// Write `bytes` at logical `offset` of a stream
    pub fn write(&mut self, kind: StreamKind, offset: u64, bytes: &[u8]) -> Result<()> {
        self.stream_mut(kind).write_span(offset, bytes)
    }

    /// Read `buf.len()` bytes at logical `offset` of a stream
    pub fn read(&mut self, kind: StreamKind, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.stream_mut(kind).read_span(offset, buf)
    }

    /// Encode a frame and write it into its frame slot
    ///
    /// Frame `i` occupies `[i * frame_bytes, (i + 1) * frame_bytes)`. Only the
    /// encoded bytes are written. Returns the encoded length.
    pub fn write_frame<C: FrameCodec>(
        &mut self,
        kind: StreamKind,
        frame_index: u64,
        codec: &C,
        frame: &[u8],
    ) -> Result<usize> {
        let frame_bytes = self.config.frame_bytes(kind);
        let offset = frame_offset(frame_index, frame_bytes)?;

        let mut scratch = std::mem::take(&mut self.scratch);
        let result = codec.encode(frame, &mut scratch).and_then(|len| {
            if len as u64 > frame_bytes {
                return Err(ExtentError::invalid(format!(
                    "encoded frame of {} bytes exceeds the {}-byte frame slot",
                    len, frame_bytes
                )));
            }
            self.stream_mut(kind).write_span(offset, &scratch[..len])?;
            Ok(len)
        });
        self.scratch = scratch;
        result
    }

    /// Read the raw slot of frame `frame_index` into `buf` (at most one frame)
    pub fn read_frame(&mut self, kind: StreamKind, frame_index: u64, buf: &mut [u8]) -> Result<()> {
        let frame_bytes = self.config.frame_bytes(kind);
        if buf.len() as u64 > frame_bytes {
            return Err(ExtentError::invalid(format!(
                "buffer of {} bytes is larger than a {}-byte frame",
                buf.len(),
                frame_bytes
            )));
        }
        let offset = frame_offset(frame_index, frame_bytes)?;
        self.read(kind, offset, buf)
    }

    /// Flush buffered bytes of both streams
    pub fn flush(&mut self) -> Result<()> {
        self.traces.flush()?;
        self.headers.flush()
    }

    /// Flush and close both streams
    pub fn close(mut self) -> Result<()> {
        self.traces.close()?;
        self.headers.close()?;
        debug!("Closed dataset {}", self.path.display());
        Ok(())
    }

    /// Remove every extent, every folder and the dataset directory
    pub fn delete(mut self) -> Result<()> {
        let removed = self.traces.extents_mut()?.delete_extents()?
            + self.headers.extents_mut()?.delete_extents()?;
        self.folders.remove_folders_contents()?;
        self.folders.remove_folders()?;
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
        }
        info!(
            "Deleted dataset {} ({} extent files)",
            self.path.display(),
            removed
        );
        Ok(())
    }
}

fn frame_offset(frame_index: u64, frame_bytes: u64) -> Result<u64> {
    frame_index
        .checked_mul(frame_bytes)
        .ok_or_else(|| ExtentError::invalid(format!("frame {} is out of range", frame_index)))
}

/// Builder for creating or opening a [`Dataset`]
///
/// # Examples
///
/// ```rust,no_run
/// use seisvfio::{DatasetBuilder, StreamKind, Result};
///
/// # fn main() -> Result<()> {
/// let mut dataset = DatasetBuilder::new("/prim/home/proj/sub/line.js")
///     .folder("/sec1/home/proj/sub/line.js")
///     .trace_stream(1 << 30, 4096)
///     .header_stream(1 << 24, 256)
///     .num_extents(8)
///     .create()?;
///
/// dataset.write(StreamKind::TraceData, 0, &[0u8; 4096])?;
/// dataset.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    path: PathBuf,
    folders: Vec<String>,
    config: DatasetConfig,
    cache_capacity: Option<usize>,
}

impl DatasetBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        DatasetBuilder {
            path: path.as_ref().to_path_buf(),
            folders: Vec::new(),
            config: DatasetConfig::default(),
            cache_capacity: None,
        }
    }

    /// Add a folder spec (`path[,ATTRIBUTE]`)
    pub fn folder(mut self, spec: impl Into<String>) -> Self {
        self.folders.push(spec.into());
        self
    }

    pub fn folders<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folders.extend(specs.into_iter().map(Into::into));
        self
    }

    pub fn config(mut self, config: DatasetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn trace_stream(mut self, length: u64, frame_bytes: u64) -> Self {
        self.config.trace_length = length;
        self.config.trace_frame_bytes = frame_bytes;
        self
    }

    pub fn header_stream(mut self, length: u64, frame_bytes: u64) -> Self {
        self.config.header_length = length;
        self.config.header_frame_bytes = frame_bytes;
        self
    }

    pub fn num_extents(mut self, num_extents: u64) -> Self {
        self.config.num_extents = Some(num_extents);
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Folder list from explicit specs, the config, or the dataset directory
    fn folder_specs(&self) -> Vec<String> {
        if !self.folders.is_empty() {
            return self.folders.clone();
        }
        if !self.config.folders.is_empty() {
            return self.config.folders.clone();
        }
        vec![self.path.to_string_lossy().into_owned()]
    }

    /// Lay out and create a new dataset
    ///
    /// Fails when the directory already holds dataset metadata or any folder
    /// still contains extent files.
    pub fn create(self) -> Result<Dataset> {
        let mut config = self.config.clone();
        if let Some(capacity) = self.cache_capacity {
            config.cache_capacity = capacity;
        }
        config.folders = self.folder_specs();
        config.validate()?;

        let path = self.path;
        let mut folders = VirtualFolders::from_paths(&config.folders);

        if path.join(VIRTUAL_FOLDERS_FILE).exists()
            || StreamKind::ALL
                .iter()
                .any(|kind| path.join(kind.metadata_file()).exists())
        {
            return Err(ExtentError::invalid(format!(
                "{} already holds a dataset",
                path.display()
            )));
        }

        fs::create_dir_all(&path)?;
        folders.create_folders()?;

        // Stale extents would show through never-written regions
        folders.find_extents()?;
        let stale = StreamKind::ALL
            .iter()
            .filter_map(|kind| folders.precomputed_extents(kind.base_name()))
            .map(|found| found.len())
            .sum::<usize>();
        folders.clear_precomputed_extents();
        if stale > 0 {
            return Err(ExtentError::invalid(format!(
                "{} extent files from an earlier dataset remain in the folders of {}",
                stale,
                path.display()
            )));
        }

        folders.save(&path)?;
        config.write_to(path.join(DATASET_CONFIG_FILE))?;

        let mut lists = Vec::with_capacity(2);
        for kind in StreamKind::ALL {
            let layout = config.layout(kind)?;
            let mut list = ExtentList::new();
            list.init(
                kind.base_name(),
                layout.num_extents,
                layout.max_file_position,
                layout.extent_size,
                &folders,
            )?;
            list.save_metadata(path.join(kind.metadata_file()))?;
            lists.push(list);
        }
        let headers = lists.pop().ok_or(ExtentError::NotInitialized)?;
        let traces = lists.pop().ok_or(ExtentError::NotInitialized)?;

        info!(
            "Created dataset {}: {} trace extents, {} header extents over {} folders",
            path.display(),
            traces.num_extents(),
            headers.num_extents(),
            folders.len()
        );

        Ok(Dataset {
            traces: ExtentStream::with_capacity(traces, config.cache_capacity),
            headers: ExtentStream::with_capacity(headers, config.cache_capacity),
            path,
            config,
            folders,
            scratch: Vec::new(),
        })
    }

    /// Open an existing dataset and recover its extent tables from disk
    ///
    /// Folders given to the builder replace the persisted folder list.
    pub fn open(self) -> Result<Dataset> {
        let path = self.path;
        if !path.is_dir() {
            return Err(ExtentError::invalid(format!(
                "dataset {} does not exist",
                path.display()
            )));
        }

        let config_file = path.join(DATASET_CONFIG_FILE);
        let mut config = if config_file.is_file() {
            DatasetConfig::from_file(&config_file)?
        } else {
            debug!("{} has no {}, using defaults", path.display(), DATASET_CONFIG_FILE);
            DatasetConfig::default()
        };
        if let Some(capacity) = self.cache_capacity {
            config.cache_capacity = capacity;
        }

        let mut folders = if self.folders.is_empty() {
            let mut loaded = VirtualFolders::new();
            loaded.load(&path)?;
            loaded
        } else {
            VirtualFolders::from_paths(&self.folders)
        };
        config.folders = folders.iter().map(VirtualFolder::to_string).collect();

        // One scan serves both streams
        folders.find_extents()?;

        let mut traces = ExtentList::with_folders(folders.clone());
        traces.init_from_metadata(&path, StreamKind::TraceData.metadata_file())?;
        let mut headers = ExtentList::with_folders(folders.clone());
        headers.init_from_metadata(&path, StreamKind::TraceHeaders.metadata_file())?;

        info!(
            "Opened dataset {}: {} trace extents, {} header extents",
            path.display(),
            traces.num_extents(),
            headers.num_extents()
        );

        folders.clear_precomputed_extents();
        Ok(Dataset {
            traces: ExtentStream::with_capacity(traces, config.cache_capacity),
            headers: ExtentStream::with_capacity(headers, config.cache_capacity),
            path,
            config,
            folders,
            scratch: Vec::new(),
        })
    }
}
