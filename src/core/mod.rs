//! Extent storage core
//!
//! - [`folders`] - directories that hold extents, and their persistence
//! - [`extent`] - extent tables: layout, recovery and offset resolution
//! - [`io`] - segmented reads and writes through a write-behind cache
//! - [`metadata`] - key/value metadata blocks
//! - [`stream`] - the two logical streams of a dataset
//! - [`codec`] - frame codec collaborator
//! - [`validation`] - base-name rules and path helpers

pub mod codec;
pub mod extent;
pub mod folders;
pub mod integration_tests;
pub mod io;
pub mod metadata;
pub mod stream;
pub mod validation;
