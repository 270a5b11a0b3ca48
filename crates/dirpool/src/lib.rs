//! Directory-of-files volume backend.
//!
//! A pool is a subdirectory of a root directory; a volume is a raw,
//! possibly sparse, file inside it. Capacity is the file's byte
//! length, allocation is the space its blocks actually occupy. This is
//! the simplest backend that exercises the whole engine: upload and
//! download streams walk the volume file with the same extent
//! classification the engine applies to local files.
//!
//! Linux only (inherits the `volstream-sparse` requirements).

mod pool;
mod stream;

pub use pool::{DirPool, VolumeRecord};
pub use stream::VolumeWriter;
