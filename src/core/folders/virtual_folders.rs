//! Ordered collection of virtual folders
//!
//! Folder order is assignment priority: folder 0 receives the largest share of
//! new extents. The collection also persists itself next to the dataset and can
//! carry a precomputed list of extent files so that only one caller scans disk.

use super::folder::VirtualFolder;
use crate::core::metadata::ParameterSet;
use crate::core::stream::StreamKind;
use crate::core::validation::{tail_segments, truncate_segments};
use crate::error::{ExtentError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Folder-list metadata file in the dataset directory
pub const VIRTUAL_FOLDERS_FILE: &str = "VirtualFolders.toml";

const BLOCK_NAME: &str = "VirtualFolders";
const NDIR: &str = "NDIR";
const DIR_TAG: &str = "DIR-";
const FILESYSTEM_TAG: &str = "FILESYSTEM-";
const SELF_REFERENCE: &str = ".";

/// Segments of the dataset path appended to a `FILESYSTEM-<i>` root on load
const LOAD_TAIL_SEGMENTS: usize = 4;

/// Segments removed from a folder path before it is saved as a `FILESYSTEM-<i>` root
const SAVE_TRUNCATE_SEGMENTS: usize = 2;

/// Extent files discovered by a single scan of all folders
#[derive(Debug, Clone, Default)]
struct ExtentCache {
    trace_data: Vec<PathBuf>,
    trace_headers: Vec<PathBuf>,
    populated: bool,
}

/// Ordered list of [`VirtualFolder`]s without duplicate paths
#[derive(Debug, Clone, Default)]
pub struct VirtualFolders {
    folders: Vec<VirtualFolder>,
    cache: ExtentCache,
}

impl VirtualFolders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from folder specs (`path[,ATTRIBUTE]`), skipping duplicates
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut folders = Self::new();
        for path in paths {
            folders.add_folder(path.as_ref());
        }
        folders
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VirtualFolder> {
        self.folders.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VirtualFolder> {
        self.folders.iter()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let probe = VirtualFolder::new(path);
        self.folders.contains(&probe)
    }

    /// Append a folder; false (and no change) when the path is already present
    pub fn add_folder(&mut self, spec: &str) -> bool {
        self.add(VirtualFolder::parse(spec))
    }

    /// Append an already-built folder; false when the path is already present
    pub fn add(&mut self, folder: VirtualFolder) -> bool {
        if self.folders.contains(&folder) {
            return false;
        }
        self.folders.push(folder);
        true
    }

    /// Remove the first folder with this path; false when absent
    pub fn remove_folder(&mut self, path: impl AsRef<Path>) -> bool {
        let probe = VirtualFolder::new(path);
        match self.folders.iter().position(|f| *f == probe) {
            Some(pos) => {
                self.folders.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Replace the folder list with the one persisted in `dataset_path`
    ///
    /// `DIR-<i>` entries are literal paths. `FILESYSTEM-<i>` entries are roots
    /// that get the last four segments of `dataset_path` appended, the layout
    /// used by the external project tool. `.` under either tag is the dataset
    /// directory itself.
    pub fn load(&mut self, dataset_path: impl AsRef<Path>) -> Result<()> {
        let dataset_path = dataset_path.as_ref();
        let block =
            ParameterSet::read_from(&dataset_path.join(VIRTUAL_FOLDERS_FILE), BLOCK_NAME)?;

        let ndir: i64 = block.require_parsed(NDIR)?;
        if ndir <= 0 {
            return Err(ExtentError::format(format!(
                "{} must be positive, got {}",
                NDIR, ndir
            )));
        }

        let mut loaded = VirtualFolders::new();
        for i in 0..ndir {
            let folder = if let Some(dir) = block.get(&format!("{}{}", DIR_TAG, i)) {
                if dir.trim() == SELF_REFERENCE {
                    VirtualFolder::new(dataset_path)
                } else {
                    VirtualFolder::parse(dir.trim())
                }
            } else if let Some(root) = block.get(&format!("{}{}", FILESYSTEM_TAG, i)) {
                let root = root.trim();
                if root == SELF_REFERENCE {
                    VirtualFolder::new(dataset_path)
                } else {
                    VirtualFolder::new(
                        Path::new(root).join(tail_segments(dataset_path, LOAD_TAIL_SEGMENTS)),
                    )
                }
            } else {
                return Err(ExtentError::format(format!(
                    "folder {} of {} has neither {}{} nor {}{}",
                    i, ndir, DIR_TAG, i, FILESYSTEM_TAG, i
                )));
            };

            if !loaded.add(folder) {
                debug!("Skipping duplicate folder entry {}", i);
            }
        }

        info!(
            "Loaded {} virtual folders for {}",
            loaded.len(),
            dataset_path.display()
        );
        self.folders = loaded.folders;
        self.clear_precomputed_extents();
        Ok(())
    }

    /// Persist the folder list into `dataset_path`
    ///
    /// A single folder equal to the dataset directory is written as `.`;
    /// otherwise every folder path loses its last two segments and is written
    /// as a `FILESYSTEM-<i>` root.
    pub fn save(&self, dataset_path: impl AsRef<Path>) -> Result<()> {
        let dataset_path = dataset_path.as_ref();
        if self.folders.is_empty() {
            return Err(ExtentError::invalid("cannot save an empty folder list"));
        }

        let mut block = ParameterSet::new(BLOCK_NAME);
        block.put(NDIR, self.folders.len());

        let self_referencing =
            self.folders.len() == 1 && self.folders[0] == VirtualFolder::new(dataset_path);
        if self_referencing {
            block.put(format!("{}0", FILESYSTEM_TAG), SELF_REFERENCE);
        } else {
            for (i, folder) in self.folders.iter().enumerate() {
                let root = truncate_segments(folder.path(), SAVE_TRUNCATE_SEGMENTS);
                block.put(
                    format!("{}{}", FILESYSTEM_TAG, i),
                    root.to_string_lossy(),
                );
            }
        }

        block.write_to(&dataset_path.join(VIRTUAL_FOLDERS_FILE))
    }

    /// Scan every folder once for trace and header extents
    ///
    /// Only one caller per dataset open should run this; others receive the
    /// result through [`VirtualFolders::set_precomputed_extents`].
    pub fn find_extents(&mut self) -> Result<()> {
        let mut cache = ExtentCache::default();
        for folder in &self.folders {
            for kind in StreamKind::ALL {
                let names = folder.load_extents(kind.base_name())?;
                let found = names.into_iter().map(|name| folder.path().join(name));
                match kind {
                    StreamKind::TraceData => cache.trace_data.extend(found),
                    StreamKind::TraceHeaders => cache.trace_headers.extend(found),
                }
            }
        }
        cache.populated = true;

        debug!(
            "Scanned {} folders: {} trace extents, {} header extents",
            self.folders.len(),
            cache.trace_data.len(),
            cache.trace_headers.len()
        );
        self.cache = cache;
        Ok(())
    }

    /// Install extent lists discovered by another scanner
    pub fn set_precomputed_extents(&mut self, trace_data: Vec<PathBuf>, trace_headers: Vec<PathBuf>) {
        self.cache = ExtentCache {
            trace_data,
            trace_headers,
            populated: true,
        };
    }

    /// Cached extent paths for one of the fixed base names
    ///
    /// `None` when the cache is not populated or the base name is not one of
    /// the dataset streams.
    pub fn precomputed_extents(&self, base_name: &str) -> Option<&[PathBuf]> {
        if !self.cache.populated {
            return None;
        }
        match StreamKind::from_base_name(base_name)? {
            StreamKind::TraceData => Some(&self.cache.trace_data),
            StreamKind::TraceHeaders => Some(&self.cache.trace_headers),
        }
    }

    pub fn is_populated(&self) -> bool {
        self.cache.populated
    }

    pub fn clear_precomputed_extents(&mut self) {
        self.cache = ExtentCache::default();
    }

    /// Create every folder, stopping at the first failure
    pub fn create_folders(&self) -> Result<()> {
        for folder in &self.folders {
            folder.create_directory().map_err(|e| {
                debug!("Failed to create {}: {}", folder.path().display(), e);
                e
            })?;
        }
        Ok(())
    }

    /// Wipe the contents of every folder, stopping at the first failure
    pub fn remove_folders_contents(&self) -> Result<()> {
        for folder in &self.folders {
            if folder.exists() && !folder.remove_directory_content() {
                return Err(ExtentError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("failed to wipe {}", folder.path().display()),
                )));
            }
        }
        Ok(())
    }

    /// Remove the (already emptied) folder directories, stopping at the first failure
    pub fn remove_folders(&self) -> Result<()> {
        for folder in &self.folders {
            if folder.exists() {
                std::fs::remove_dir(folder.path())?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a VirtualFolders {
    type Item = &'a VirtualFolder;
    type IntoIter = std::slice::Iter<'a, VirtualFolder>;

    fn into_iter(self) -> Self::IntoIter {
        self.folders.iter()
    }
}
