//! The volume-side upload stream.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use tracing::debug;
use volstream_engine::{SparseSink, TransferError};

/// Write stream into a volume file.
///
/// Holes are skipped with a relative seek; the final skip fixes the
/// file's size so a trailing hole stays unallocated. `finish` syncs
/// the file to disk, which is the directory pool's notion of
/// finalizing the remote stream.
pub struct VolumeWriter {
    file: File,
    pool: String,
    volume: String,
    pos: u64,
}

impl VolumeWriter {
    pub(crate) fn new(file: File, pool: &str, volume: &str) -> Self {
        Self {
            file,
            pool: pool.to_string(),
            volume: volume.to_string(),
            pos: 0,
        }
    }
}

impl SparseSink for VolumeWriter {
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransferError> {
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
            self.file.set_len(self.pos).map_err(|e| TransferError::Io {
                offset: self.pos,
                source: e,
            })?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TransferError> {
        self.file.sync_all().map_err(|e| {
            TransferError::RemoteStream(format!(
                "failed to finalize {}/{}: {e}",
                self.pool, self.volume
            ))
        })?;
        debug!(pool = %self.pool, volume = %self.volume, bytes = self.pos, "volume stream finished");
        Ok(())
    }

    fn abort(&mut self) {
        // The descriptor closes on drop; the partial content stays in
        // place and the volume must be treated as incomplete.
        debug!(pool = %self.pool, volume = %self.volume, bytes = self.pos, "volume stream aborted");
    }
}
