//! Direction adapters and the create-and-upload helper.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::VolumeBackend;
use crate::orchestrator::run;
use crate::progress::ProgressSink;
use crate::session::TransferSession;
use crate::stream::{FileSink, FileSource, SparseSource};
use crate::TransferError;

/// Granularity of volume capacities created by
/// [`create_and_upload`]: 1 MiB.
pub const ALLOC_UNIT: u64 = 1024 * 1024;

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local file into the volume.
    Upload,
    /// Volume into a local file.
    Download,
}

impl FromStr for Direction {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("upload") {
            Ok(Direction::Upload)
        } else if s.eq_ignore_ascii_case("download") {
            Ok(Direction::Download)
        } else {
            Err(TransferError::InvalidArgument(format!(
                "unsupported direction: {s:?}"
            )))
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReport {
    pub direction: Direction,
    /// Logical bytes consumed, holes included.
    pub bytes_transferred: u64,
    /// The progress denominator that was used.
    pub expected_total: u64,
}

/// Copies between a local file and a volume in the given direction.
pub fn transfer<B: VolumeBackend + ?Sized>(
    backend: &B,
    pool: &str,
    volume: &str,
    local_path: &Path,
    direction: Direction,
    progress: &mut dyn ProgressSink,
) -> Result<TransferReport, TransferError> {
    match direction {
        Direction::Upload => upload(backend, pool, volume, local_path, progress),
        Direction::Download => download(backend, pool, volume, local_path, progress),
    }
}

/// Uploads a local file into an existing volume.
///
/// The expected total is the local file's size. A volume whose
/// reported capacity is smaller than the file fails with a range
/// error before either handle is opened.
pub fn upload<B: VolumeBackend + ?Sized>(
    backend: &B,
    pool: &str,
    volume: &str,
    local_path: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<TransferReport, TransferError> {
    let size = local_file_size(local_path)?;
    let volinfo = backend.volume_info(pool, volume)?;
    if volinfo.capacity < size {
        return Err(TransferError::Range {
            context: "local file exceeds volume capacity",
            value: size,
            limit: volinfo.capacity,
        });
    }

    let mut source = FileSource::open(local_path)?;
    let mut sink = backend.open_upload_stream(pool, volume)?;
    let mut session = TransferSession::new(Direction::Upload, size, size);

    info!(pool, volume, path = %local_path.display(), size, "uploading volume");
    run(&mut session, &mut source, sink.as_mut(), progress)?;
    info!(
        pool,
        volume,
        bytes = session.transferred(),
        elapsed_ms = session.elapsed().as_millis() as u64,
        "upload completed"
    );

    Ok(TransferReport {
        direction: Direction::Upload,
        bytes_transferred: session.transferred(),
        expected_total: session.expected_total(),
    })
}

/// Downloads a volume into a local file, creating or truncating it.
///
/// The expected total is the volume's reported allocation if positive,
/// else its capacity: a wholly sparse volume is still sized to its
/// nominal capacity so the destination file ends up pre-sized
/// correctly.
pub fn download<B: VolumeBackend + ?Sized>(
    backend: &B,
    pool: &str,
    volume: &str,
    local_path: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<TransferReport, TransferError> {
    let volinfo = backend.volume_info(pool, volume)?;
    let expected = if volinfo.allocation > 0 {
        volinfo.allocation
    } else {
        volinfo.capacity
    };

    // Destination first: its creation failing must not cost a remote
    // stream.
    let mut sink = FileSink::create(local_path)?;
    let mut source = backend.open_download_stream(pool, volume)?;
    let len = source.len();
    let mut session = TransferSession::new(Direction::Download, len, expected);

    info!(pool, volume, path = %local_path.display(), len, expected, "downloading volume");
    run(&mut session, source.as_mut(), &mut sink, progress)?;
    info!(
        pool,
        volume,
        bytes = session.transferred(),
        elapsed_ms = session.elapsed().as_millis() as u64,
        "download completed"
    );

    Ok(TransferReport {
        direction: Direction::Download,
        bytes_transferred: session.transferred(),
        expected_total: session.expected_total(),
    })
}

/// Creates a volume sized to hold `local_path` (rounded up to
/// [`ALLOC_UNIT`]) and uploads the file into it.
///
/// If creation fails, the failure is surfaced unchanged and the
/// upload is not attempted.
pub fn create_and_upload<B: VolumeBackend + ?Sized>(
    backend: &B,
    pool: &str,
    volume: &str,
    volume_path: &Path,
    local_path: &Path,
    progress: &mut dyn ProgressSink,
) -> Result<TransferReport, TransferError> {
    let size = local_file_size(local_path)?;
    let capacity = size.div_ceil(ALLOC_UNIT) * ALLOC_UNIT;

    info!(
        pool,
        volume,
        size,
        capacity,
        "creating volume sized for local file"
    );
    backend.create_volume(pool, volume, capacity, volume_path)?;
    upload(backend, pool, volume, local_path, progress)
}

fn local_file_size(path: &Path) -> Result<u64, TransferError> {
    Ok(std::fs::metadata(path)
        .map_err(|e| TransferError::Io {
            offset: 0,
            source: e,
        })?
        .len())
}
