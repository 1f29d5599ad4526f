//! Errors raised while decoding a `.vox` buffer.
//!
//! Every error is fatal to the parse that raised it; nothing partially decoded is returned.

use thiserror::Error;

use crate::syntax::ChunkId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoxError {
    #[error("Expected magic \"VOX \", found {found:?}")]
    BadMagic { found: ChunkId },
    #[error("Unsupported vox version {version}")]
    UnsupportedVersion { version: u32 },
    #[error("Needed {needed} bytes at offset {offset}, only {remaining} remain")]
    TruncatedInput { offset: usize, needed: usize, remaining: usize },
    #[error("Malformed chunk {id:?} at offset {offset}: {reason}")]
    MalformedChunk { id: ChunkId, offset: usize, reason: &'static str },
    #[error("Unknown chunk {id:?} at offset {offset}")]
    UnknownChunk { id: ChunkId, offset: usize },
    #[error("Found {sizes} SIZE chunks but {voxels} XYZI chunks")]
    MismatchedChunkCount { sizes: usize, voxels: usize },
    #[error("Missing required chunk {id:?}")]
    MissingChunk { id: ChunkId },
    #[error("Chunk nesting deeper than {limit}")]
    DepthLimitExceeded { limit: usize },
    #[error("Allocating {requested} more bytes would exceed the limit of {limit}")]
    AllocationLimitExceeded { requested: usize, limit: usize },
}

pub type Result<T, E = VoxError> = std::result::Result<T, E>;
