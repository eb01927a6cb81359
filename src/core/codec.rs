//! Frame codec collaborator
//!
//! Compression itself lives outside this crate. The storage layer only needs
//! the encoded length to know how many bytes a frame occupies in its slot.

use crate::error::Result;

/// Encodes one frame into a scratch buffer
pub trait FrameCodec {
    /// Encode `frame` into `scratch` (cleared first) and return the encoded length
    fn encode(&self, frame: &[u8], scratch: &mut Vec<u8>) -> Result<usize>;
}

/// Stores frames as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl FrameCodec for Uncompressed {
    fn encode(&self, frame: &[u8], scratch: &mut Vec<u8>) -> Result<usize> {
        scratch.clear();
        scratch.extend_from_slice(frame);
        Ok(frame.len())
    }
}
