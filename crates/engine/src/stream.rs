//! The chunked I/O capability traits and their local-file
//! implementations.
//!
//! A transfer pumps bytes from a [`SparseSource`] into a
//! [`SparseSink`]. On upload the source is a local file and the sink
//! is the backend's stream; on download the roles swap. Both sides
//! update a logical position so holes can be skipped without moving
//! bytes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use volstream_sparse::{Extent, classify};

use crate::TransferError;

/// Pull side of a transfer: yields extents and the bytes of data
/// extents, in increasing offset order.
pub trait SparseSource {
    /// Logical length of the stream in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classifies the maximal extent starting at the current position.
    /// Must not move the position.
    fn next_extent(&mut self) -> Result<Extent, TransferError>;

    /// Reads up to `buf.len()` bytes at the current position,
    /// advancing it. Returns fewer bytes only at end of data.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransferError>;

    /// Advances the position by `len` without reading.
    fn skip(&mut self, len: u64) -> Result<(), TransferError>;

    /// Signals successful completion to the owner of the stream.
    fn finish(&mut self) -> Result<(), TransferError> {
        Ok(())
    }

    /// Releases the stream after a failure. Must be infallible and
    /// safe to call after a failed `finish`.
    fn abort(&mut self) {}
}

/// Push side of a transfer.
pub trait SparseSink {
    /// Writes all of `data` at the current position, advancing it.
    /// Partial writes by the underlying transport are retried until
    /// the chunk is complete or a fatal error occurs.
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransferError>;

    /// Advances the position by `len` without writing. When `is_final`
    /// is true this skip reaches the logical end and the destination
    /// is truncated to exactly the position reached, materializing a
    /// trailing hole as a sparse tail.
    fn skip(&mut self, len: u64, is_final: bool) -> Result<(), TransferError>;

    /// Signals successful completion to the owner of the stream.
    fn finish(&mut self) -> Result<(), TransferError> {
        Ok(())
    }

    /// Releases the stream after a failure. Must be infallible and
    /// safe to call after a failed `finish`.
    fn abort(&mut self) {}
}

// ---------------------------------------------------------------------------
// Local file implementations
// ---------------------------------------------------------------------------

/// Local file acting as an upload source.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
    pos: u64,
}

impl FileSource {
    /// Opens `path` read-only.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path).map_err(|e| TransferError::Io {
            offset: 0,
            source: e,
        })?;
        Self::from_file(file)
    }

    /// Wraps an already opened file positioned at its start.
    pub fn from_file(file: File) -> Result<Self, TransferError> {
        let len = file
            .metadata()
            .map_err(|e| TransferError::Io {
                offset: 0,
                source: e,
            })?
            .len();
        Ok(Self { file, len, pos: 0 })
    }
}

impl SparseSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn next_extent(&mut self) -> Result<Extent, TransferError> {
        classify(&self.file, self.pos, self.len).map_err(TransferError::from)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransferError> {
        let n = self.file.read(buf).map_err(|e| TransferError::Io {
            offset: self.pos,
            source: e,
        })?;
        self.pos += n as u64;
        Ok(n)
    }

    fn skip(&mut self, len: u64) -> Result<(), TransferError> {
        self.file
            .seek(SeekFrom::Current(len as i64))
            .map_err(|e| TransferError::Io {
                offset: self.pos,
                source: e,
            })?;
        self.pos += len;
        Ok(())
    }

    // finish/abort: the descriptor closes on drop.
}

/// Local file acting as a download destination.
///
/// Created (or truncated) before the transfer starts; a trailing hole
/// is materialized by the final skip's truncation.
pub struct FileSink {
    file: File,
    pos: u64,
}

impl FileSink {
    /// Creates or truncates `path` for writing.
    pub fn create(path: &Path) -> Result<Self, TransferError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| TransferError::Io {
                offset: 0,
                source: e,
            })?;
        Ok(Self { file, pos: 0 })
    }

    /// Wraps an already opened, empty file.
    pub fn from_file(file: File) -> Self {
        Self { file, pos: 0 }
    }

    /// Bytes positioned so far (written or skipped).
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl SparseSink for FileSink {
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransferError> {
        // write_all retries partial writes until complete or error.
        self.file.write_all(data).map_err(|e| TransferError::Io {
            offset: self.pos,
            source: e,
        })?;
        self.pos += data.len() as u64;
        Ok(())
    }

    fn skip(&mut self, len: u64, is_final: bool) -> Result<(), TransferError> {
        self.file
            .seek(SeekFrom::Current(len as i64))
            .map_err(|e| TransferError::Io {
                offset: self.pos,
                source: e,
            })?;
        self.pos += len;
        if is_final {
            // Fix the file's size; the seeked-over region becomes a
            // sparse tail.
            self.file.set_len(self.pos).map_err(|e| TransferError::Io {
                offset: self.pos,
                source: e,
            })?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TransferError> {
        self.file.flush().map_err(|e| TransferError::Io {
            offset: self.pos,
            source: e,
        })
    }
}
