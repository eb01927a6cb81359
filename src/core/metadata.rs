//! Key/value metadata blocks
//!
//! Folder lists and extent-manager scalars are persisted as named blocks of
//! string values. On disk each block is a TOML table:
//!
//! ```text
//! [ExtentManager]
//! EXTNAME = "TraceFile"
//! EXTSIZE = "1048576"
//! MAXFILE = "8"
//! MAXPOS = "8000000"
//! ```
//!
//! Hand-edited files may use bare integers; they are read back as strings.

use crate::error::{ExtentError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// A named block of string key/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    name: String,
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new(name: impl Into<String>) -> Self {
        ParameterSet {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Required string value; a missing tag is a format error
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            ExtentError::format(format!("block '{}' is missing tag {}", self.name, key))
        })
    }

    /// Required value parsed into `T`
    pub fn require_parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.require(key)?;
        raw.trim().parse().map_err(|_| {
            ExtentError::format(format!(
                "block '{}' tag {} has unparseable value '{}'",
                self.name, key, raw
            ))
        })
    }

    /// Read block `name` from a metadata file
    ///
    /// A missing file or a file without the block is a format error.
    pub fn read_from(path: &Path, name: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ExtentError::format(format!("cannot read metadata {}: {}", path.display(), e))
        })?;
        let document: toml::Table = toml::from_str(&text)?;

        let block = document
            .get(name)
            .and_then(toml::Value::as_table)
            .ok_or_else(|| {
                ExtentError::format(format!("{} has no block '{}'", path.display(), name))
            })?;

        let mut set = ParameterSet::new(name);
        for (key, value) in block {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(ExtentError::format(format!(
                        "block '{}' tag {} has unsupported value {}",
                        name, key, other
                    )))
                }
            };
            set.values.insert(key.clone(), value);
        }

        debug!("Read block {} ({} tags) from {}", name, set.len(), path.display());
        Ok(set)
    }

    /// Write this block as the sole content of a metadata file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut document = BTreeMap::new();
        document.insert(self.name.clone(), self.values.clone());
        let text = toml::to_string(&document)?;
        fs::write(path, text)?;

        debug!("Wrote block {} ({} tags) to {}", self.name, self.len(), path.display());
        Ok(())
    }
}
