//! Disk-backed binary store
//!
//! Blobs live under `<root>/entries/`, one file per stored version, and the
//! metadata index is snapshotted to `<root>/index.json` after every write.
//! On open the index is reconciled against the blobs actually present.
//!
//! Two backends are provided:
//! - **tokio::fs backend**: portable async file I/O for real deployments
//! - **memory backend**: keeps everything in a map, used for the `memory`
//!   storage mode and in tests

pub use self::error::DiskCacheError;
pub use self::memory_backend::MemoryBackend;
pub use self::store::{DiskStore, DiskToolsStorage};
pub use self::tokio_backend::TokioFsBackend;

pub mod backend;
mod error;
mod index;
pub mod memory_backend;
mod store;
pub mod tokio_backend;
mod utils;
