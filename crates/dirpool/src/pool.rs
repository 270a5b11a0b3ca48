//! Pool and volume bookkeeping.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use volstream_engine::{
    FileSource, SparseSink, SparseSource, TransferError, VolumeBackend, VolumeInfo,
};

use crate::stream::VolumeWriter;

/// A named volume and its sizes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub name: String,
    #[serde(flatten)]
    pub info: VolumeInfo,
}

/// Volume manager over a directory tree: `<root>/<pool>/<volume>`.
#[derive(Debug)]
pub struct DirPool {
    root: PathBuf,
}

impl DirPool {
    /// Opens an existing root directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(TransferError::Volume(format!(
                "pool root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Creates a pool directory if it does not exist yet.
    pub fn create_pool(&self, pool: &str) -> Result<(), TransferError> {
        validate_name("pool", pool)?;
        std::fs::create_dir_all(self.root.join(pool)).map_err(|e| {
            TransferError::Volume(format!("failed to create pool {pool}: {e}"))
        })
    }

    /// Lists the volumes of a pool, sorted by name.
    pub fn list_volumes(&self, pool: &str) -> Result<Vec<VolumeRecord>, TransferError> {
        validate_name("pool", pool)?;
        let dir = self.root.join(pool);
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| TransferError::Volume(format!("failed to read pool {pool}: {e}")))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| TransferError::Volume(format!("failed to read pool {pool}: {e}")))?;
            let meta = entry.metadata().map_err(|e| {
                TransferError::Volume(format!("failed to stat volume entry: {e}"))
            })?;
            if !meta.is_file() {
                continue;
            }
            records.push(VolumeRecord {
                name: entry.file_name().to_string_lossy().into_owned(),
                info: VolumeInfo {
                    capacity: meta.len(),
                    allocation: meta.blocks() * 512,
                },
            });
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Deletes a volume: truncates its content, then removes the file.
    pub fn delete_volume(&self, pool: &str, volume: &str) -> Result<(), TransferError> {
        let path = self.existing_volume_path(pool, volume)?;
        // Drop the content reference before unlinking, so the space is
        // reclaimed even while another descriptor is open.
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| TransferError::Volume(format!("failed to wipe volume {volume}: {e}")))?;
        file.set_len(0)
            .map_err(|e| TransferError::Volume(format!("failed to wipe volume {volume}: {e}")))?;
        drop(file);
        std::fs::remove_file(&path)
            .map_err(|e| TransferError::Volume(format!("failed to delete volume {volume}: {e}")))?;
        info!(pool, volume, "volume deleted");
        Ok(())
    }

    fn volume_path(&self, pool: &str, volume: &str) -> Result<PathBuf, TransferError> {
        validate_name("pool", pool)?;
        validate_name("volume", volume)?;
        Ok(self.root.join(pool).join(volume))
    }

    fn existing_volume_path(&self, pool: &str, volume: &str) -> Result<PathBuf, TransferError> {
        let path = self.volume_path(pool, volume)?;
        if !path.is_file() {
            return Err(TransferError::Volume(format!(
                "volume not found: {pool}/{volume}"
            )));
        }
        Ok(path)
    }
}

impl VolumeBackend for DirPool {
    fn volume_info(&self, pool: &str, volume: &str) -> Result<VolumeInfo, TransferError> {
        let path = self.existing_volume_path(pool, volume)?;
        let meta = std::fs::metadata(&path)
            .map_err(|e| TransferError::Volume(format!("failed to stat {pool}/{volume}: {e}")))?;
        Ok(VolumeInfo {
            capacity: meta.len(),
            allocation: meta.blocks() * 512,
        })
    }

    fn create_volume(
        &self,
        pool: &str,
        name: &str,
        capacity: u64,
        path: &Path,
    ) -> Result<(), TransferError> {
        let target = self.volume_path(pool, name)?;
        if !path.as_os_str().is_empty() && path != target {
            // Directory pools derive the location from the pool root;
            // the caller's hint is informational.
            debug!(pool, name, hint = %path.display(), "ignoring volume path hint");
        }
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&target)
            .map_err(|e| TransferError::Volume(format!("failed to create volume {name}: {e}")))?;
        file.set_len(capacity)
            .map_err(|e| TransferError::Volume(format!("failed to size volume {name}: {e}")))?;
        info!(pool, name, capacity, "volume created");
        Ok(())
    }

    fn open_upload_stream(
        &self,
        pool: &str,
        volume: &str,
    ) -> Result<Box<dyn SparseSink>, TransferError> {
        let path = self.existing_volume_path(pool, volume)?;
        // Uploading replaces the volume's content.
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                TransferError::RemoteStream(format!(
                    "failed to open upload stream for {pool}/{volume}: {e}"
                ))
            })?;
        Ok(Box::new(VolumeWriter::new(file, pool, volume)))
    }

    fn open_download_stream(
        &self,
        pool: &str,
        volume: &str,
    ) -> Result<Box<dyn SparseSource>, TransferError> {
        let path = self.existing_volume_path(pool, volume)?;
        let file = File::open(&path).map_err(|e| {
            TransferError::RemoteStream(format!(
                "failed to open download stream for {pool}/{volume}: {e}"
            ))
        })?;
        Ok(Box::new(FileSource::from_file(file)?))
    }
}

/// Pool and volume names are single path components.
fn validate_name(kind: &str, name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidArgument(format!("empty {kind} name")));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(TransferError::InvalidArgument(format!(
            "invalid {kind} name: {name:?}"
        )));
    }
    Ok(())
}
