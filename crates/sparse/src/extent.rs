use std::fs::File;

use crate::ExtentError;
use crate::seek::{seek_data, seek_hole, seek_set};

/// Kind of a contiguous file region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentKind {
    /// Physically stored bytes.
    Data,
    /// Unallocated region that reads as zeros.
    Hole,
}

/// A maximal contiguous run of one kind starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub kind: ExtentKind,
    pub offset: u64,
    pub len: u64,
}

impl Extent {
    /// First offset past this extent.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    pub fn is_data(&self) -> bool {
        self.kind == ExtentKind::Data
    }
}

/// Classifies the region at `offset` within a file of `logical_size`
/// bytes.
///
/// Returns the maximal extent starting exactly at `offset`. The
/// descriptor's cursor is restored to `offset` before returning, on
/// success and on error, so classification is side-effect-free.
///
/// Three cases, from the `SEEK_DATA` result:
/// 1. next data == `offset`: a data extent, ending at the next hole.
///    Every file ends in a (possibly zero-length) trailing hole, so a
///    missing hole is a kernel contract violation and reported as
///    [`ExtentError::Fault`].
/// 2. next data > `offset`: a hole extent up to that data.
/// 3. no next data (ENXIO): the trailing hole, up to `logical_size`.
pub fn classify(file: &File, offset: u64, logical_size: u64) -> Result<Extent, ExtentError> {
    if offset >= logical_size {
        return Err(ExtentError::OutOfRange {
            offset,
            size: logical_size,
        });
    }

    let result = classify_at(file, offset, logical_size);
    let restore = seek_set(file, offset);
    match (result, restore) {
        (Err(err), _) => Err(err),
        (Ok(_), Err(err)) => Err(ExtentError::Io {
            offset,
            source: err,
        }),
        (Ok(mut extent), Ok(_)) => {
            // A data run may extend past the caller's logical end.
            extent.len = extent.len.min(logical_size - offset);
            Ok(extent)
        }
    }
}

fn classify_at(file: &File, offset: u64, logical_size: u64) -> Result<Extent, ExtentError> {
    let io_err = |source| ExtentError::Io { offset, source };

    let Some(data) = seek_data(file, offset).map_err(io_err)? else {
        // Case 3: no data at or after `offset`, so the remainder of
        // the stream is one trailing hole.
        return Ok(Extent {
            kind: ExtentKind::Hole,
            offset,
            len: logical_size - offset,
        });
    };

    if data > offset {
        // Case 2: inside a hole, next data starts at `data`.
        return Ok(Extent {
            kind: ExtentKind::Hole,
            offset,
            len: data - offset,
        });
    }
    if data < offset {
        return Err(ExtentError::Fault {
            offset,
            reason: "seek to next data moved backward",
        });
    }

    // Case 1: inside data. The run ends at the next hole.
    let Some(hole) = seek_hole(file, data).map_err(io_err)? else {
        return Err(ExtentError::Fault {
            offset,
            reason: "no trailing hole after data",
        });
    };
    if hole == data {
        return Err(ExtentError::Fault {
            offset,
            reason: "offset reported as both data and hole",
        });
    }
    if hole < data {
        return Err(ExtentError::Fault {
            offset,
            reason: "seek to next hole moved backward",
        });
    }

    Ok(Extent {
        kind: ExtentKind::Data,
        offset,
        len: hole - offset,
    })
}

/// Iterator over the full extent run of `[0, logical_size)`.
///
/// Yields non-overlapping extents in increasing offset order; adjacent
/// extents alternate kind. Stops after the first error.
pub struct Extents<'a> {
    file: &'a File,
    logical_size: u64,
    offset: u64,
}

impl<'a> Extents<'a> {
    pub fn new(file: &'a File, logical_size: u64) -> Self {
        Self {
            file,
            logical_size,
            offset: 0,
        }
    }
}

impl Iterator for Extents<'_> {
    type Item = Result<Extent, ExtentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.logical_size {
            return None;
        }
        match classify(self.file, self.offset, self.logical_size) {
            Ok(extent) => {
                self.offset = extent.end();
                Some(Ok(extent))
            }
            Err(err) => {
                self.offset = self.logical_size;
                Some(Err(err))
            }
        }
    }
}
