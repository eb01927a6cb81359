//! Error types for extent storage operations

use std::path::PathBuf;
use thiserror::Error;

/// Extent storage result type
pub type Result<T> = std::result::Result<T, ExtentError>;

/// How a caller should react to an [`ExtentError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The call itself was wrong: fix the arguments or metadata, never retry as-is
    UserError,
    /// A single I/O attempt failed and descriptor state was reset; retrying is allowed
    Warning,
}

/// Extent storage errors
#[derive(Error, Debug)]
pub enum ExtentError {
    /// Invalid argument (non-positive sizes, bad names, bad layouts)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Logical position outside `[0, max_file_position]`
    #[error("Position {position} outside logical stream [0, {max}]")]
    PositionOutOfRange { position: u64, max: u64 },

    /// Span that does not resolve to an ordered extent range
    #[error("Invalid span: offset {offset}, length {length}")]
    InvalidSpan { offset: u64, length: u64 },

    /// Extent list used before `init` or `init_from_metadata`
    #[error("Extent list is not initialized")]
    NotInitialized,

    /// Missing or malformed metadata tag
    #[error("Malformed metadata: {0}")]
    Format(String),

    /// Metadata file is not valid TOML
    #[error("Metadata parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Metadata could not be encoded
    #[error("Metadata encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Opening an extent file failed
    #[error("Failed to open extent {path}: {source}")]
    ExtentOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing through the cache writer failed
    #[error("Failed to write extent {path}: {source}")]
    ExtentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading an extent file failed
    #[error("Failed to read extent {path}: {source}")]
    ExtentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtentError {
    /// Classify the error for retry decisions
    pub fn severity(&self) -> Severity {
        match self {
            ExtentError::ExtentOpen { .. }
            | ExtentError::ExtentWrite { .. }
            | ExtentError::ExtentRead { .. }
            | ExtentError::Io(_) => Severity::Warning,
            _ => Severity::UserError,
        }
    }

    /// True when a higher layer may retry the operation
    pub fn is_recoverable(&self) -> bool {
        self.severity() == Severity::Warning
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ExtentError::Format(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ExtentError::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_split() {
        assert_eq!(
            ExtentError::invalid("extent size must be positive").severity(),
            Severity::UserError
        );
        assert_eq!(
            ExtentError::PositionOutOfRange { position: 10, max: 5 }.severity(),
            Severity::UserError
        );

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = ExtentError::ExtentWrite {
            path: PathBuf::from("/data/TraceFile0"),
            source: io,
        };
        assert_eq!(err.severity(), Severity::Warning);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_display_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ExtentError::ExtentOpen {
            path: PathBuf::from("/data/TraceFile3"),
            source: io,
        };
        assert!(err.to_string().contains("/data/TraceFile3"));
    }
}
