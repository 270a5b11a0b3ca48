//! Interface to the external volume manager.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stream::{SparseSink, SparseSource};
use crate::TransferError;

/// Reported sizes of a managed volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    /// Nominal logical size in bytes.
    pub capacity: u64,
    /// Physically allocated bytes. May be zero for a wholly sparse
    /// volume, and may exceed `capacity` on some backends.
    pub allocation: u64,
}

/// The managed-storage side of a transfer.
///
/// The engine only defines the algorithm for walking volume bytes
/// sparsely; what a volume *is* and how its stream moves bytes is the
/// backend's business. Streams returned here are owned exclusively by
/// one transfer. Dropping a stream without `finish` must release its
/// resources (the engine relies on this for its error paths).
pub trait VolumeBackend {
    /// Looks up capacity and allocation of an existing volume.
    fn volume_info(&self, pool: &str, volume: &str) -> Result<VolumeInfo, TransferError>;

    /// Creates a volume of `capacity` bytes. `path` is the backend's
    /// target location hint; backends that derive the location
    /// themselves may ignore it.
    fn create_volume(
        &self,
        pool: &str,
        name: &str,
        capacity: u64,
        path: &Path,
    ) -> Result<(), TransferError>;

    /// Opens the volume's stream for writing (upload destination).
    fn open_upload_stream(
        &self,
        pool: &str,
        volume: &str,
    ) -> Result<Box<dyn SparseSink>, TransferError>;

    /// Opens the volume's stream for reading (download source).
    fn open_download_stream(
        &self,
        pool: &str,
        volume: &str,
    ) -> Result<Box<dyn SparseSource>, TransferError>;
}
