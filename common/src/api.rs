//! Identifiers, constants, and the error type shared across the cache.

use std::io;

use thiserror::Error;

/// A unique identifier for a page in the backing file.
///
/// Valid identifiers are non-negative and are handed out in strictly
/// increasing order by the disk manager.
pub type PageId = i32;

/// Index of a slot in the in-memory frame array.
pub type FrameId = i32;

/// Sentinel meaning "no page".
pub const INVALID_PAGE_ID: PageId = -1;

/// The size of a single page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Errors surfaced by the cache and the disk manager.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Every frame is pinned; nothing can be evicted right now. The caller
    /// may retry after unpinning.
    #[error("no frame available: all frames are pinned")]
    NoFrameAvailable,

    /// An unrecoverable I/O error from the disk manager. The backing file's
    /// state is indeterminate; callers should treat the cache as poisoned.
    #[error("disk I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
