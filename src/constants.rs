// Constants module - centralized default values for configuration
//
// Defaults used by the config layer and the request handlers live here so
// that tests and config parsing agree on the same numbers.

// =============================================================================
// Server defaults
// =============================================================================

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 17070;

/// Default scope (model identifier) embedded in retrieval URLs
pub const DEFAULT_SCOPE: &str = "controller";

/// Default maximum upload size (512 MB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

// =============================================================================
// Storage defaults
// =============================================================================

/// Default root directory for the disk store
pub const DEFAULT_STORAGE_DIR: &str = "/var/lib/tooldepot";

/// Sub-directory holding blob files
pub const ENTRIES_DIR: &str = "entries";

/// Index file name inside the storage root
pub const INDEX_FILE: &str = "index.json";

/// Index snapshot format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

// =============================================================================
// Remote index defaults
// =============================================================================

/// Default timeout for remote index and artifact requests in seconds
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Transfer
// =============================================================================

/// Media type of agent binary tarballs
pub const TOOLS_CONTENT_TYPE: &str = "application/x-tar-gz";

/// Read buffer size when streaming artifacts to clients (64 KB)
pub const TRANSFER_CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// Version compatibility
// =============================================================================

/// Major version of the legacy series compatibility window
pub const LEGACY_WINDOW_MAJOR: u32 = 2;

/// Highest minor version inside the legacy series compatibility window
pub const LEGACY_WINDOW_MAX_MINOR: u32 = 8;

// =============================================================================
// Logging
// =============================================================================

/// Filter used when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "tooldepot=info";
