//! A single virtual folder: one directory eligible to hold extents

use crate::core::validation::strip_trailing_separator;
use crate::error::Result;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Access attribute of a virtual folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FolderAttribute {
    ReadOnly,
    #[default]
    ReadWrite,
    /// Only used for new extents when no read-write folder is available
    OverflowOnly,
    /// Scanned for existing extents, never given new ones
    Retired,
}

impl FolderAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderAttribute::ReadOnly => "READ_ONLY",
            FolderAttribute::ReadWrite => "READ_WRITE",
            FolderAttribute::OverflowOnly => "OVERFLOW_ONLY",
            FolderAttribute::Retired => "RETIRED",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "READ_ONLY" => Some(FolderAttribute::ReadOnly),
            "READ_WRITE" => Some(FolderAttribute::ReadWrite),
            "OVERFLOW_ONLY" => Some(FolderAttribute::OverflowOnly),
            "RETIRED" => Some(FolderAttribute::Retired),
            _ => None,
        }
    }
}

/// One physical directory with an access attribute
///
/// Equality and hashing consider the path only.
#[derive(Debug, Clone)]
pub struct VirtualFolder {
    path: PathBuf,
    attribute: FolderAttribute,
}

impl VirtualFolder {
    /// Folder with the default read-write attribute
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_attribute(path, FolderAttribute::ReadWrite)
    }

    pub fn with_attribute(path: impl AsRef<Path>, attribute: FolderAttribute) -> Self {
        let raw = path.as_ref().to_string_lossy();
        VirtualFolder {
            path: PathBuf::from(strip_trailing_separator(&raw)),
            attribute,
        }
    }

    /// Parse `path[,ATTRIBUTE]`
    ///
    /// ```
    /// use seisvfio::core::folders::{FolderAttribute, VirtualFolder};
    ///
    /// let folder = VirtualFolder::parse("/sec1/line.js/,READ_ONLY");
    /// assert_eq!(folder.path(), std::path::Path::new("/sec1/line.js"));
    /// assert_eq!(folder.attribute(), FolderAttribute::ReadOnly);
    /// ```
    pub fn parse(spec: &str) -> Self {
        if let Some((path, tag)) = spec.rsplit_once(',') {
            if let Some(attribute) = FolderAttribute::from_tag(tag.trim()) {
                return Self::with_attribute(path, attribute);
            }
        }
        Self::new(spec)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn attribute(&self) -> FolderAttribute {
        self.attribute
    }

    /// True when new extents may be placed here
    pub fn accepts_new_extents(&self) -> bool {
        matches!(
            self.attribute,
            FolderAttribute::ReadWrite | FolderAttribute::OverflowOnly
        )
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Path of extent `<base><index>` inside this folder
    pub fn extent_path(&self, base_name: &str, index: usize) -> PathBuf {
        self.path.join(format!("{}{}", base_name, index))
    }

    /// Number of directory entries, 0 when the directory cannot be read
    pub fn count(&self) -> usize {
        match fs::read_dir(&self.path) {
            Ok(entries) => entries.filter(|e| e.is_ok()).count(),
            Err(_) => 0,
        }
    }

    /// Names of files that look like extents of `base_name`
    ///
    /// A name matches when it starts with `base_name` and the rest contains no
    /// `.`, which keeps metadata, temp and lock files out.
    pub fn load_extents(&self, base_name: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(suffix) = name.strip_prefix(base_name) {
                if !suffix.contains('.') {
                    names.push(name.to_string());
                }
            }
        }

        trace!(
            "Found {} candidate extents for {} in {}",
            names.len(),
            base_name,
            self.path.display()
        );
        Ok(names)
    }

    /// Create the directory and its parents
    pub fn create_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Delete every entry of the directory
    ///
    /// Returns false on the first entry that cannot be deleted, or when the
    /// directory cannot be read. The directory itself is kept.
    pub fn remove_directory_content(&self) -> bool {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read {}: {}", self.path.display(), e);
                return false;
            }
        };

        for entry in entries {
            let Ok(entry) = entry else {
                return false;
            };
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }

            let target = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let removed = if is_dir {
                fs::remove_dir_all(&target)
            } else {
                fs::remove_file(&target)
            };
            if let Err(e) = removed {
                debug!("Failed to remove {}: {}", target.display(), e);
                return false;
            }
        }
        true
    }
}

impl PartialEq for VirtualFolder {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for VirtualFolder {}

impl Hash for VirtualFolder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl std::fmt::Display for VirtualFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.attribute {
            FolderAttribute::ReadWrite => write!(f, "{}", self.path.display()),
            other => write!(f, "{},{}", self.path.display(), other.as_str()),
        }
    }
}
