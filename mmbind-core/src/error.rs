//! Error type shared by every layer of the binding.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Mm2Result<T> = Result<T, Mm2Error>;

/// Errors raised while driving the alignment engine.
///
/// Every variant is fatal to the call that produced it. Nothing is retried
/// internally, and any transient buffer acquired along the failing path has
/// already been released by the time the caller sees the error.
#[derive(Debug, Error)]
pub enum Mm2Error {
    #[error("can't open index file: {}", path.display())]
    Open { path: PathBuf },

    #[error("can't close index: it is in use by {borrowers} borrower(s)")]
    InUse { borrowers: usize },

    #[error(
        "unexpected options struct size {actual} (expected {expected}); \
         the engine is probably a different version"
    )]
    VersionMismatch { expected: usize, actual: usize },

    #[error("engine could not allocate {0}")]
    Allocation(&'static str),

    #[error("malformed alignment result: {0}")]
    MalformedResult(String),

    #[error("{0} has been closed")]
    Closed(&'static str),

    #[error("reference id {id} out of range ({count} references)")]
    RefIdOutOfRange { id: usize, count: usize },

    #[error("sequence batch too large: {0}")]
    BatchTooLarge(String),

    #[error("engine initialization failed: {0}")]
    Initialization(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("engine produced no alignments for the batch")]
    AlignmentFailed,
}

impl Mm2Error {
    pub(crate) fn malformed<S: Into<String>>(detail: S) -> Self {
        Self::MalformedResult(detail.into())
    }
}
