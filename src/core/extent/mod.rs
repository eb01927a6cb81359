//! Extent tables and extent sizing

pub mod entry;
pub mod list;

pub use entry::{ExtentListEntry, PLACEHOLDER_SUFFIX};
pub use list::{ExtentList, MAX_EXTENTS};

use crate::error::{ExtentError, Result};

/// Nominal extent size for a stream of `file_length` bytes split `num_extents` ways
///
/// The even share is rounded up to a multiple of `frame_unit` so that, with
/// sequential frame-aligned writes, no frame straddles two extents.
///
/// ```
/// use seisvfio::core::extent::compute_extent_size;
///
/// // ceil(1000 / 3) = 334, next multiple of 64 is 384
/// assert_eq!(compute_extent_size(1000, 3, 64).unwrap(), 384);
/// ```
pub fn compute_extent_size(file_length: u64, num_extents: u64, frame_unit: u64) -> Result<u64> {
    if file_length == 0 || num_extents == 0 || frame_unit == 0 {
        return Err(ExtentError::invalid(format!(
            "extent sizing needs positive inputs (length {}, extents {}, frame unit {})",
            file_length, num_extents, frame_unit
        )));
    }

    let per_extent = file_length.div_ceil(num_extents);
    per_extent
        .div_ceil(frame_unit)
        .checked_mul(frame_unit)
        .ok_or_else(|| ExtentError::invalid("extent size overflows u64"))
}

/// Smallest extent count that holds `file_length` bytes at `extent_size` each
pub fn extents_needed(file_length: u64, extent_size: u64) -> Result<u64> {
    if file_length == 0 || extent_size == 0 {
        return Err(ExtentError::invalid(
            "extent count needs a positive length and extent size",
        ));
    }
    Ok(file_length.div_ceil(extent_size))
}
