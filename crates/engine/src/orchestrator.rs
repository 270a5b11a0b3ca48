//! The transfer loop.

use std::io;

use tracing::trace;
use volstream_sparse::ExtentKind;

use crate::progress::ProgressSink;
use crate::session::{SessionState, TransferSession};
use crate::stream::{SparseSink, SparseSource};
use crate::TransferError;

/// Drives one transfer from start to finish.
///
/// Walks the source extent by extent in increasing offset order. Data
/// extents are pumped in `chunk_size`-bounded steps; holes are skipped
/// on both sides, with the final skip truncating the destination.
/// Each extent is fully consumed before the next is classified.
///
/// Both streams are released on every exit path: `finish` on success,
/// `abort` on failure. After a failure the progress sink receives no
/// further updates. A partially written destination is left in place;
/// the engine does not roll back.
pub fn run(
    session: &mut TransferSession,
    source: &mut dyn SparseSource,
    sink: &mut dyn SparseSink,
    progress: &mut dyn ProgressSink,
) -> Result<(), TransferError> {
    session.set_state(SessionState::Streaming);
    match stream_extents(session, source, sink, progress) {
        Ok(()) => {
            session.set_state(SessionState::Finishing);
            match sink.finish().and_then(|()| source.finish()) {
                Ok(()) => {
                    session.set_state(SessionState::Done);
                    Ok(())
                }
                Err(err) => {
                    sink.abort();
                    source.abort();
                    session.set_state(SessionState::Failed);
                    Err(err)
                }
            }
        }
        Err(err) => {
            // Release both ends even when the transfer dies mid-extent.
            sink.abort();
            source.abort();
            session.set_state(SessionState::Failed);
            Err(err)
        }
    }
}

fn stream_extents(
    session: &mut TransferSession,
    source: &mut dyn SparseSource,
    sink: &mut dyn SparseSink,
    progress: &mut dyn ProgressSink,
) -> Result<(), TransferError> {
    let len = source.len();
    let mut buf = vec![0u8; session.chunk_size()];
    let mut offset = 0u64;

    // A zero-length stream completes without a single chunk operation.
    while offset < len {
        let extent = source.next_extent()?;
        if extent.len == 0 {
            // Guards against a non-terminating loop on a broken
            // classifier.
            return Err(TransferError::ClassifierFault {
                offset,
                reason: "zero-length extent",
            });
        }
        let end = (offset + extent.len).min(len);

        match extent.kind {
            ExtentKind::Data => {
                trace!(offset, len = end - offset, "data extent");
                let mut remaining = end - offset;
                while remaining > 0 {
                    let want = remaining.min(buf.len() as u64) as usize;
                    let n = source.read_chunk(&mut buf[..want])?;
                    if n == 0 {
                        // The source shrank underneath us.
                        return Err(TransferError::Io {
                            offset: end - remaining,
                            source: io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "source ended inside a data extent",
                            ),
                        });
                    }
                    sink.write_chunk(&buf[..n])?;
                    remaining -= n as u64;
                    session.add(n as u64);
                    progress.update(session.transferred(), session.expected_total());
                }
            }
            ExtentKind::Hole => {
                let hole = end - offset;
                let is_final = end >= len;
                trace!(offset, len = hole, is_final, "hole extent");
                source.skip(hole)?;
                sink.skip(hole, is_final)?;
                session.add(hole);
                progress.update(session.transferred(), session.expected_total());
            }
        }
        offset = end;
    }

    Ok(())
}
