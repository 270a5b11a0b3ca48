//! Extent classification for sparse files.
//!
//! A sparse file is a sequence of maximal runs of two kinds: data
//! extents, which are physically stored, and holes, which read as
//! zeros without occupying space. This crate walks that structure
//! through the kernel's `SEEK_DATA`/`SEEK_HOLE` positioning
//! primitives, so a transfer engine can copy the data and skip the
//! holes instead of materializing them.
//!
//! Linux only.

mod extent;
mod seek;

use std::fs::File;
use std::io;
use std::path::Path;

pub use extent::{Extent, ExtentKind, Extents, classify};

/// Errors from extent classification.
#[derive(Debug, thiserror::Error)]
pub enum ExtentError {
    /// A positioning seek on the descriptor failed.
    #[error("seek failed at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// The requested offset lies at or beyond the logical size.
    #[error("offset {offset} is beyond the logical size {size}")]
    OutOfRange { offset: u64, size: u64 },

    /// The kernel reported an extent layout that violates the
    /// data/hole contract. Always fatal; callers must not treat this
    /// as data or as a zero-length hole.
    #[error("extent map fault at offset {offset}: {reason}")]
    Fault { offset: u64, reason: &'static str },
}

/// Checks whether the filesystem holding `dir` reports unwritten
/// regions as holes.
///
/// Some filesystems (and some container mounts) report every offset
/// as data, which makes hole classification trivially correct but
/// useless. Callers that want to assert on hole layout, or avoid
/// reading gigabytes of zeros, can probe first.
pub fn probe_hole_support(dir: &Path) -> io::Result<bool> {
    const PROBE_LEN: u64 = 1 << 20;

    let path = dir.join(format!(".sparse-probe-{}", std::process::id()));
    let file = File::create(&path)?;
    file.set_len(PROBE_LEN)?;
    let sparse = matches!(
        classify(&file, 0, PROBE_LEN),
        Ok(extent) if extent.kind == ExtentKind::Hole
    );
    drop(file);
    let _ = std::fs::remove_file(&path);
    Ok(sparse)
}
