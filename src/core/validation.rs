//! Validation for extent base names and folder paths
//!
//! Extent files are named `<base><index>`, so a base name only has to be a
//! usable file-name prefix. Folder paths are compared and persisted segment-wise, so
//! this module also owns the small path helpers used by folder persistence.

use crate::error::{ExtentError, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Validated extent base name (e.g. "TraceFile")
///
/// # Rules
/// - Non-empty, at most 200 bytes
/// - No path separators or NUL bytes, and not `.` or `..`
///
/// Discovery strips the base name and accepts only an all-digit remainder, so
/// names ending in a digit or containing dots still resolve unambiguously.
///
/// # Examples
///
/// ```
/// use seisvfio::core::validation::ExtentBaseName;
///
/// let base = ExtentBaseName::new("TraceFile").unwrap();
/// assert_eq!(base.as_str(), "TraceFile");
/// assert_eq!(ExtentBaseName::new("Trace7").unwrap().parse_index("Trace712"), Some(12));
///
/// assert!(ExtentBaseName::new("").is_err());
/// assert!(ExtentBaseName::new("dir/TraceFile").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtentBaseName(String);

impl ExtentBaseName {
    const PATTERN: &'static str = r"^[^/\\\x00]+$";

    const MAX_LENGTH: usize = 200;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(ExtentBaseName(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ExtentError::invalid("extent base name cannot be empty"));
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(ExtentError::invalid(format!(
                "extent base name too long (max {} characters)",
                Self::MAX_LENGTH
            )));
        }

        let re = Regex::new(Self::PATTERN).map_err(|e| ExtentError::invalid(e.to_string()))?;
        if !re.is_match(name) || name == "." || name == ".." {
            return Err(ExtentError::invalid(format!(
                "extent base name '{}' must be a plain file name",
                name
            )));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// File name of extent `index`
    pub fn extent_name(&self, index: usize) -> String {
        format!("{}{}", self.0, index)
    }

    /// Parse the extent index out of a discovered file name
    ///
    /// Returns `None` for names with another prefix, an extension, or a
    /// non-numeric suffix.
    pub fn parse_index(&self, file_name: &str) -> Option<usize> {
        let suffix = file_name.strip_prefix(self.0.as_str())?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }
}

impl AsRef<str> for ExtentBaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExtentBaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strip exactly one trailing separator (the root "/" is left alone)
pub fn strip_trailing_separator(path: &str) -> &str {
    if path.len() > 1 && (path.ends_with('/') || path.ends_with(std::path::MAIN_SEPARATOR)) {
        &path[..path.len() - 1]
    } else {
        path
    }
}

/// Drop the last `count` segments of a path
///
/// ```
/// use seisvfio::core::validation::truncate_segments;
/// use std::path::Path;
///
/// let root = truncate_segments(Path::new("/sec1/home/proj/sub/line.js"), 2);
/// assert_eq!(root, Path::new("/sec1/home/proj"));
/// ```
pub fn truncate_segments(path: &Path, count: usize) -> PathBuf {
    let mut truncated = path.to_path_buf();
    for _ in 0..count {
        if !truncated.pop() {
            break;
        }
    }
    truncated
}

/// The last `count` named segments of a path, as a relative path
///
/// Fewer segments are returned when the path is shorter.
///
/// ```
/// use seisvfio::core::validation::tail_segments;
/// use std::path::Path;
///
/// let tail = tail_segments(Path::new("/data/home/proj/sub/line.js"), 4);
/// assert_eq!(tail, Path::new("home/proj/sub/line.js"));
/// ```
pub fn tail_segments(path: &Path, count: usize) -> PathBuf {
    let named: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect();
    let skip = named.len().saturating_sub(count);
    named[skip..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_base_names() {
        assert!(ExtentBaseName::new("TraceFile").is_ok());
        assert!(ExtentBaseName::new("TraceHeaders").is_ok());
        assert!(ExtentBaseName::new("trace_file-").is_ok());
        assert!(ExtentBaseName::new("x").is_ok());
        assert!(ExtentBaseName::new("3D_Traces").is_ok());
        assert!(ExtentBaseName::new("Trace7").is_ok());
        assert!(ExtentBaseName::new("Trace.File").is_ok());
        assert!(ExtentBaseName::new("Trace File").is_ok());
    }

    #[test]
    fn test_invalid_base_names() {
        assert!(ExtentBaseName::new("").is_err());
        assert!(ExtentBaseName::new("dir/TraceFile").is_err());
        assert!(ExtentBaseName::new("dir\\TraceFile").is_err());
        assert!(ExtentBaseName::new("Trace\0File").is_err());
        assert!(ExtentBaseName::new(".").is_err());
        assert!(ExtentBaseName::new("..").is_err());
        assert!(ExtentBaseName::new("x".repeat(201)).is_err());
    }

    #[test]
    fn test_parse_index() {
        let base = ExtentBaseName::new("TraceFile").unwrap();
        assert_eq!(base.parse_index("TraceFile0"), Some(0));
        assert_eq!(base.parse_index("TraceFile17"), Some(17));
        assert_eq!(base.parse_index("TraceFile"), None);
        assert_eq!(base.parse_index("TraceFile.toml"), None);
        assert_eq!(base.parse_index("TraceFile3.lock"), None);
        assert_eq!(base.parse_index("TraceFileX"), None);
        assert_eq!(base.parse_index("TraceHeaders0"), None);
        assert_eq!(base.extent_name(12), "TraceFile12");

        let digits = ExtentBaseName::new("Line7_").unwrap();
        assert_eq!(digits.parse_index("Line7_3"), Some(3));
        let trailing = ExtentBaseName::new("Line7").unwrap();
        assert_eq!(trailing.parse_index("Line712"), Some(12));
        assert_eq!(trailing.parse_index("Line7"), None);
    }

    #[test]
    fn test_strip_trailing_separator() {
        assert_eq!(strip_trailing_separator("/data/a/"), "/data/a");
        assert_eq!(strip_trailing_separator("/data/a"), "/data/a");
        assert_eq!(strip_trailing_separator("/"), "/");
        assert_eq!(strip_trailing_separator("/data/a//"), "/data/a/");
    }

    #[test]
    fn test_segment_helpers() {
        let path = Path::new("/sec1/home/proj/sub/line.js");
        assert_eq!(truncate_segments(path, 2), Path::new("/sec1/home/proj"));
        assert_eq!(truncate_segments(Path::new("/a"), 3), Path::new("/"));

        assert_eq!(tail_segments(path, 4), Path::new("home/proj/sub/line.js"));
        assert_eq!(tail_segments(Path::new("/a/b"), 4), Path::new("a/b"));
    }
}
