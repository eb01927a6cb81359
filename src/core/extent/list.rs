//! Extent table for one logical stream
//!
//! An [`ExtentList`] splits a logical byte stream of `max_file_position` bytes
//! into `num_extents` files of nominal `extent_size` bytes. Entry `i` starts at
//! `extent_size * i`; the last entry is trimmed so the table ends exactly at
//! `max_file_position`.
//!
//! Tables are built two ways:
//! - [`ExtentList::init`] lays out a new dataset deterministically.
//! - [`ExtentList::init_from_metadata`] reads the persisted scalars and then
//!   rebuilds the table from what is on disk ([`ExtentList::load_extents`]),
//!   filling slots whose files were never written with placeholders.

use super::entry::ExtentListEntry;
use crate::core::folders::{FolderAttribute, VirtualFolder, VirtualFolders};
use crate::core::metadata::ParameterSet;
use crate::core::validation::ExtentBaseName;
use crate::error::{ExtentError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

const BLOCK_NAME: &str = "ExtentManager";
const TAG_EXTSIZE: &str = "EXTSIZE";
const TAG_MAXFILE: &str = "MAXFILE";
const TAG_EXTNAME: &str = "EXTNAME";
const TAG_MAXPOS: &str = "MAXPOS";
const TAG_VERSION: &str = "VERSION";
const METADATA_VERSION: &str = "1";

/// Upper bound on extents per stream; the table is held in memory
pub const MAX_EXTENTS: usize = 1 << 20;

/// Extent table of one logical stream
#[derive(Debug, Clone, Default)]
pub struct ExtentList {
    base_name: Option<ExtentBaseName>,
    num_extents: usize,
    max_file_position: u64,
    extent_size: u64,
    folders: VirtualFolders,
    entries: Vec<ExtentListEntry>,
}

impl ExtentList {
    /// Uninitialized list; call `init` or `init_from_metadata` next
    pub fn new() -> Self {
        Self::default()
    }

    /// Uninitialized list with a known folder set
    ///
    /// `init_from_metadata` only loads the folder list from disk when none was
    /// given here.
    pub fn with_folders(folders: VirtualFolders) -> Self {
        ExtentList {
            folders,
            ..Self::default()
        }
    }

    /// Lay out a new extent table
    ///
    /// Folder 0 receives `n / f + n % f` extents and every other eligible
    /// folder `n / f`, with contiguous indices in folder order. Eligible folders
    /// are the read-write ones, or the overflow-only ones when no read-write
    /// folder exists.
    pub fn init(
        &mut self,
        base_name: &str,
        num_extents: usize,
        max_file_position: u64,
        extent_size: u64,
        folders: &VirtualFolders,
    ) -> Result<()> {
        let base = ExtentBaseName::new(base_name)?;
        validate_layout(num_extents, max_file_position, extent_size)
            .map_err(ExtentError::InvalidArgument)?;

        let paths = layout_paths(folders, base.as_str(), num_extents)?;
        self.folders = folders.clone();

        self.entries = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                ExtentListEntry::new(
                    base.extent_name(i),
                    i,
                    extent_size * i as u64,
                    extent_size,
                    path,
                )
            })
            .collect();

        self.num_extents = num_extents;
        self.max_file_position = max_file_position;
        self.extent_size = extent_size;
        self.base_name = Some(base);
        self.reconcile_tail();

        info!(
            "Initialized {} extents of {} bytes for {} ({} bytes across {} folders)",
            num_extents,
            extent_size,
            base_name,
            max_file_position,
            self.folders.len()
        );
        Ok(())
    }

    /// Restore the table from the metadata file and the files on disk
    pub fn init_from_metadata(
        &mut self,
        dataset_path: impl AsRef<Path>,
        metadata_file: impl AsRef<Path>,
    ) -> Result<()> {
        let dataset_path = dataset_path.as_ref();
        if self.folders.is_empty() {
            self.folders.load(dataset_path)?;
        }

        let block = ParameterSet::read_from(&dataset_path.join(metadata_file), BLOCK_NAME)?;
        let extent_size: u64 = block.require_parsed(TAG_EXTSIZE)?;
        let num_extents: usize = block.require_parsed(TAG_MAXFILE)?;
        let base_name = block.require(TAG_EXTNAME)?.trim();
        let max_file_position: u64 = block.require_parsed(TAG_MAXPOS)?;

        let base = ExtentBaseName::new(base_name)
            .map_err(|e| ExtentError::format(format!("{}: {}", TAG_EXTNAME, e)))?;
        validate_recovered(num_extents, max_file_position, extent_size).map_err(ExtentError::Format)?;

        self.base_name = Some(base);
        self.num_extents = num_extents;
        self.max_file_position = max_file_position;
        self.extent_size = extent_size;
        self.entries.clear();

        self.load_extents()
    }

    /// Rebuild the table from the extent files present in the folders
    ///
    /// Files are matched by name, ordered by their numeric suffix and placed
    /// into their slot. Files with an index past the table are ignored, and a
    /// slot without a file gets a `<base><i>_NOT_FOUND` placeholder: such
    /// extents were never written because all their data was empty.
    pub fn load_extents(&mut self) -> Result<()> {
        let base = self.base_name.clone().ok_or(ExtentError::NotInitialized)?;
        let num_extents = self.num_extents;

        let mut discovered = self.discover(&base)?;
        if discovered.is_empty() {
            warn!(
                "No extent files named {}* found in {} folders",
                base,
                self.folders.len()
            );
        }

        discovered.sort_by_key(|(index, _, _)| *index);
        discovered.retain(|(index, name, _)| {
            if *index >= num_extents {
                trace!("Ignoring {} (index {} >= {})", name, index, num_extents);
                false
            } else {
                true
            }
        });
        discovered.dedup_by(|later, first| {
            if later.0 == first.0 {
                trace!("Ignoring duplicate extent {}", later.2.display());
                true
            } else {
                false
            }
        });

        let layout = recovery_paths(&self.folders, base.as_str(), num_extents)?;
        let mut found = discovered.into_iter().peekable();
        let mut entries = Vec::with_capacity(num_extents);
        let mut placeholders = 0usize;

        for (i, layout_path) in layout.into_iter().enumerate() {
            let start = self.extent_size * i as u64;
            match found.next_if(|(index, _, _)| *index == i) {
                Some((_, name, path)) => {
                    entries.push(ExtentListEntry::new(name, i, start, self.extent_size, path));
                }
                None => {
                    trace!("Extent {}{} not found, synthesizing placeholder", base, i);
                    placeholders += 1;
                    entries.push(ExtentListEntry::placeholder(
                        base.as_str(),
                        i,
                        start,
                        self.extent_size,
                        layout_path,
                    ));
                }
            }
        }

        self.entries = entries;
        self.reconcile_tail();

        debug!(
            "Loaded {} extents for {} ({} placeholders)",
            num_extents, base, placeholders
        );
        Ok(())
    }

    /// `(index, file name, path)` of every file that parses as an extent
    fn discover(&self, base: &ExtentBaseName) -> Result<Vec<(usize, String, PathBuf)>> {
        let mut discovered = Vec::new();

        if let Some(paths) = self.folders.precomputed_extents(base.as_str()) {
            for path in paths {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                match base.parse_index(name) {
                    Some(index) => discovered.push((index, name.to_string(), path.clone())),
                    None => trace!("Skipping non-extent {}", path.display()),
                }
            }
            return Ok(discovered);
        }

        for folder in &self.folders {
            for name in folder.load_extents(base.as_str())? {
                match base.parse_index(&name) {
                    Some(index) => {
                        let path = folder.path().join(&name);
                        discovered.push((index, name, path));
                    }
                    None => trace!("Skipping non-extent {} in {}", name, folder.path().display()),
                }
            }
        }
        Ok(discovered)
    }

    /// Trim the final extent so the table ends at `max_file_position`
    fn reconcile_tail(&mut self) {
        let max = self.max_file_position;
        if let Some(last) = self.entries.last_mut() {
            last.size = max - last.start_offset;
        }
    }

    /// Persist the table scalars to `path`
    pub fn save_metadata(&self, path: impl AsRef<Path>) -> Result<()> {
        let base = self.base_name.as_ref().ok_or(ExtentError::NotInitialized)?;

        let mut block = ParameterSet::new(BLOCK_NAME);
        block.put(TAG_VERSION, METADATA_VERSION);
        block.put(TAG_EXTNAME, base);
        block.put(TAG_EXTSIZE, self.extent_size);
        block.put(TAG_MAXFILE, self.num_extents);
        block.put(TAG_MAXPOS, self.max_file_position);
        block.write_to(path.as_ref())
    }

    /// Index of the extent holding logical `position`
    ///
    /// This is the greatest index whose start offset is strictly below
    /// `position`, so a position equal to an extent's start offset resolves to
    /// the previous extent (and 0 resolves to extent 0). Callers address byte
    /// `p` with `extent_index(p + 1)`.
    pub fn extent_index(&self, position: u64) -> Result<usize> {
        self.ensure_initialized()?;
        if position > self.max_file_position {
            return Err(ExtentError::PositionOutOfRange {
                position,
                max: self.max_file_position,
            });
        }

        let mut index = 0;
        for entry in &self.entries {
            if entry.start_offset < position {
                index = entry.index;
            } else {
                break;
            }
        }
        Ok(index)
    }

    /// File path of extent `index`, `None` when out of range
    pub fn extent_path(&self, index: usize) -> Option<&Path> {
        self.entries.get(index).map(|e| e.path())
    }

    /// `(extent index, local offset)` of a global offset, assuming uniform extents
    pub fn extent_info_for_offset(&self, global_offset: u64) -> Result<(usize, u64)> {
        self.ensure_initialized()?;
        if global_offset > self.max_file_position {
            return Err(ExtentError::PositionOutOfRange {
                position: global_offset,
                max: self.max_file_position,
            });
        }

        // A recovered table may end with a tail longer than extent_size
        let last = self.num_extents.saturating_sub(1) as u64;
        let index = (global_offset / self.extent_size).min(last);
        let local = global_offset - index * self.extent_size;
        Ok((index as usize, local))
    }

    /// Give a placeholder its real extent name once its file exists
    ///
    /// Returns true when the entry was a placeholder.
    pub fn promote_placeholder(&mut self, index: usize) -> bool {
        let Some(base) = self.base_name.as_ref() else {
            return false;
        };
        match self.entries.get_mut(index) {
            Some(entry) if entry.is_placeholder() => {
                entry.name = base.extent_name(index);
                true
            }
            _ => false,
        }
    }

    /// Delete every materialized extent file; the table keeps placeholders
    pub fn delete_extents(&mut self) -> Result<usize> {
        let base = self.base_name.clone().ok_or(ExtentError::NotInitialized)?;
        let mut removed = 0;
        for entry in &mut self.entries {
            if entry.path.is_file() {
                fs::remove_file(&entry.path)?;
                removed += 1;
            }
            if !entry.is_placeholder() {
                *entry = ExtentListEntry::placeholder(
                    base.as_str(),
                    entry.index,
                    entry.start_offset,
                    entry.size,
                    entry.path.clone(),
                );
            }
        }
        debug!("Deleted {} extent files of {}", removed, base);
        Ok(removed)
    }

    /// Bytes currently allocated on disk by materialized extents
    pub fn disk_usage(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|e| fs::metadata(&e.path).ok())
            .map(|m| m.len())
            .sum()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.base_name.is_none() {
            return Err(ExtentError::NotInitialized);
        }
        Ok(())
    }

    /// True when some folder may receive newly materialized extents
    pub fn accepts_new_extents(&self) -> bool {
        !placement_folders(&self.folders).is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.base_name.is_some()
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_ref().map(ExtentBaseName::as_str)
    }

    pub fn num_extents(&self) -> usize {
        self.num_extents
    }

    pub fn max_file_position(&self) -> u64 {
        self.max_file_position
    }

    pub fn extent_size(&self) -> u64 {
        self.extent_size
    }

    pub fn entries(&self) -> &[ExtentListEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ExtentListEntry> {
        self.entries.get(index)
    }

    pub fn folders(&self) -> &VirtualFolders {
        &self.folders
    }

    /// Shared folder set, e.g. to install a precomputed scan
    pub fn folders_mut(&mut self) -> &mut VirtualFolders {
        &mut self.folders
    }
}

/// Checks every table must pass, new or recovered
///
/// The last extent must start before `max_file_position`; recovered tables
/// may end with a tail longer than `extent_size`.
fn validate_recovered(
    num_extents: usize,
    max_file_position: u64,
    extent_size: u64,
) -> std::result::Result<(), String> {
    if num_extents == 0 {
        return Err("number of extents must be positive".to_string());
    }
    if num_extents > MAX_EXTENTS {
        return Err(format!(
            "{} extents exceeds the limit of {}",
            num_extents, MAX_EXTENTS
        ));
    }
    if max_file_position == 0 {
        return Err("max file position must be positive".to_string());
    }
    if extent_size == 0 {
        return Err("extent size must be positive".to_string());
    }

    let last_start = extent_size
        .checked_mul(num_extents as u64 - 1)
        .unwrap_or(u64::MAX);
    if last_start >= max_file_position {
        return Err(format!(
            "{} extents of {} bytes leave trailing extents empty for {} bytes",
            num_extents, extent_size, max_file_position
        ));
    }
    Ok(())
}

/// A new layout must also hold the stream in `num_extents` nominal extents
fn validate_layout(
    num_extents: usize,
    max_file_position: u64,
    extent_size: u64,
) -> std::result::Result<(), String> {
    validate_recovered(num_extents, max_file_position, extent_size)?;

    let capacity = extent_size
        .checked_mul(num_extents as u64)
        .unwrap_or(u64::MAX);
    if capacity < max_file_position {
        return Err(format!(
            "{} extents of {} bytes cannot hold {} bytes",
            num_extents, extent_size, max_file_position
        ));
    }
    Ok(())
}

/// Folders that may receive new extents
fn placement_folders(folders: &VirtualFolders) -> Vec<&VirtualFolder> {
    let read_write: Vec<_> = folders
        .iter()
        .filter(|f| f.attribute() == FolderAttribute::ReadWrite)
        .collect();
    if !read_write.is_empty() {
        return read_write;
    }
    folders.iter().filter(|f| f.accepts_new_extents()).collect()
}

/// Deterministic path of every extent index of a new table
fn layout_paths(folders: &VirtualFolders, base_name: &str, num_extents: usize) -> Result<Vec<PathBuf>> {
    let targets = placement_folders(folders);
    if targets.is_empty() {
        return Err(ExtentError::invalid(format!(
            "none of the {} folders accepts new extents",
            folders.len()
        )));
    }
    Ok(distribute(&targets, base_name, num_extents))
}

/// Paths for placeholders of a recovered table
///
/// Read-only archives have no placement folder; their placeholders are spread
/// over every folder so the table still loads, and writes into them are
/// refused later.
fn recovery_paths(folders: &VirtualFolders, base_name: &str, num_extents: usize) -> Result<Vec<PathBuf>> {
    let mut targets = placement_folders(folders);
    if targets.is_empty() {
        targets = folders.iter().collect();
    }
    if targets.is_empty() {
        return Err(ExtentError::format("no virtual folders to recover extents from"));
    }
    Ok(distribute(&targets, base_name, num_extents))
}

/// Folder 0 gets `n / f + n % f` extents, the others `n / f`, in index order
fn distribute(targets: &[&VirtualFolder], base_name: &str, num_extents: usize) -> Vec<PathBuf> {
    let per_folder = num_extents / targets.len();
    let first_share = per_folder + num_extents % targets.len();

    let mut paths = Vec::with_capacity(num_extents);
    for (slot, folder) in targets.iter().enumerate() {
        let share = if slot == 0 { first_share } else { per_folder };
        for _ in 0..share {
            paths.push(folder.extent_path(base_name, paths.len()));
        }
    }
    paths
}
