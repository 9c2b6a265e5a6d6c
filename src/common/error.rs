use thiserror::Error;

use super::types::{FrameId, PageId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Buffer pool is full, no free or evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Invalid frame ID: {0}")]
    InvalidFrameId(FrameId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Invalid B+Tree configuration: {0}")]
    InvalidTreeConfig(String),

    #[error("Unknown index page type tag {0}")]
    InvalidPageType(u32),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl StratumError {
    /// Pool exhaustion is a capacity condition; callers may retry once pages are released.
    pub fn is_transient(&self) -> bool {
        matches!(self, StratumError::BufferPoolFull)
    }
}

pub type Result<T> = std::result::Result<T, StratumError>;
