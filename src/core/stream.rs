//! The two logical streams of a dataset and their fixed on-disk names

use serde::{Deserialize, Serialize};

/// A logical byte stream of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Trace samples
    TraceData,
    /// Trace headers
    TraceHeaders,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::TraceData, StreamKind::TraceHeaders];

    /// Extent base name
    pub const fn base_name(self) -> &'static str {
        match self {
            StreamKind::TraceData => "TraceFile",
            StreamKind::TraceHeaders => "TraceHeaders",
        }
    }

    /// Extent-manager metadata file in the dataset directory
    pub const fn metadata_file(self) -> &'static str {
        match self {
            StreamKind::TraceData => "TraceFile.toml",
            StreamKind::TraceHeaders => "TraceHeaders.toml",
        }
    }

    pub fn from_base_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.base_name() == name)
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.base_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_distinct_and_round_trip() {
        for kind in StreamKind::ALL {
            assert_eq!(StreamKind::from_base_name(kind.base_name()), Some(kind));
            assert!(kind.metadata_file().starts_with(kind.base_name()));
        }
        assert!(!StreamKind::TraceHeaders
            .base_name()
            .starts_with(StreamKind::TraceData.base_name()));
        assert_eq!(StreamKind::from_base_name("Other"), None);
    }
}
