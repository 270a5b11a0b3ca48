//! Wrappers over the sparse positioning primitives.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

fn lseek(file: &File, offset: u64, whence: libc::c_int) -> io::Result<u64> {
    // SAFETY: plain lseek on a borrowed, valid descriptor; no memory
    // is passed to the kernel.
    let pos = unsafe { libc::lseek(file.as_raw_fd(), offset as libc::off_t, whence) };
    if pos < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(pos as u64)
    }
}

/// Position of the next data region at or after `offset`, or `None`
/// when no data exists there (ENXIO: `offset` is in the trailing hole
/// or at end of file).
pub(crate) fn seek_data(file: &File, offset: u64) -> io::Result<Option<u64>> {
    match lseek(file, offset, libc::SEEK_DATA) {
        Ok(pos) => Ok(Some(pos)),
        Err(err) if err.raw_os_error() == Some(libc::ENXIO) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Position of the next hole at or after `offset`, or `None` on ENXIO.
pub(crate) fn seek_hole(file: &File, offset: u64) -> io::Result<Option<u64>> {
    match lseek(file, offset, libc::SEEK_HOLE) {
        Ok(pos) => Ok(Some(pos)),
        Err(err) if err.raw_os_error() == Some(libc::ENXIO) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Moves the cursor to an absolute offset.
pub(crate) fn seek_set(file: &File, offset: u64) -> io::Result<u64> {
    lseek(file, offset, libc::SEEK_SET)
}
