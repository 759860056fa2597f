// Tooldepot agent binary distribution library

pub mod config;
pub mod constants;
pub mod digest;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod remote;
pub mod request_coalescing;
pub mod resolver;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod transfer;
pub mod version;

pub use error::ToolsError;
