//! Sparse-aware volume transfer engine.
//!
//! Copies a storage volume's contents between a local file and a
//! managed-storage backend while preserving holes: the source is
//! walked extent by extent, data extents are pumped through bounded
//! chunks, and holes are skipped on both sides instead of being
//! materialized as zero-filled bytes.
//!
//! The engine is synchronous; each chunk operation is a blocking call.
//! One transfer owns its two handles exclusively and releases both on
//! every exit path. Independent transfers can run on separate threads.
//!
//! The managed-storage side is abstracted behind [`VolumeBackend`];
//! see `volstream-dirpool` for a directory-of-files implementation.

mod backend;
mod orchestrator;
mod progress;
mod session;
mod stream;
mod transfer;

use std::io;

use volstream_sparse::ExtentError;

pub use backend::{VolumeBackend, VolumeInfo};
pub use orchestrator::run;
pub use progress::{LogProgress, NullProgress, ProgressSink, SpeedCalculator};
pub use session::{SessionState, TransferSession};
pub use stream::{FileSink, FileSource, SparseSink, SparseSource};
pub use transfer::{
    ALLOC_UNIT, Direction, TransferReport, create_and_upload, download, transfer, upload,
};

/// Default chunk size: 4 MiB.
///
/// Bounds a single read/write step inside a data extent. Larger chunks
/// reduce per-chunk overhead; [`TransferSession::with_chunk_size`]
/// overrides it.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Errors produced by the transfer engine.
///
/// Every variant aborts the current transfer; the engine performs no
/// retry beyond completing partial writes inside a chunk. Offsets are
/// logical byte positions within the stream being transferred.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Read, write or seek failure on either handle.
    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// The extent classifier reported a layout violating its own
    /// contract. A bug in the backend or the engine; never downgraded
    /// to an assumed data extent.
    #[error("extent classifier fault at offset {offset}: {reason}")]
    ClassifierFault { offset: u64, reason: &'static str },

    /// An offset or length falls outside the logical bounds.
    #[error("out of range: {context} ({value} exceeds limit {limit})")]
    Range {
        context: &'static str,
        value: u64,
        limit: u64,
    },

    /// Caller contract violation, detected before any handle is opened.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backend-reported failure while finishing or aborting the remote
    /// stream.
    #[error("remote stream error: {0}")]
    RemoteStream(String),

    /// Failure reported by the volume manager itself (lookup, create),
    /// surfaced unchanged.
    #[error("volume manager error: {0}")]
    Volume(String),
}

impl From<ExtentError> for TransferError {
    fn from(err: ExtentError) -> Self {
        match err {
            ExtentError::Io { offset, source } => TransferError::Io { offset, source },
            ExtentError::OutOfRange { offset, size } => TransferError::Range {
                context: "classifier offset",
                value: offset,
                limit: size,
            },
            ExtentError::Fault { offset, reason } => {
                TransferError::ClassifierFault { offset, reason }
            }
        }
    }
}
