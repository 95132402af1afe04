//! Transfer protocol constants
//!
//! The wire format is a bare byte stream: no magic number, no header, no
//! length prefix. End of file is the sender closing its write half.

// Port the group owner listens on
pub const DEFAULT_PORT: u16 = 8988;

// Copy loop chunk size on both sides
pub const CHUNK_SIZE: usize = 1024;

// Timeouts
pub const CONNECT_TIMEOUT_MS: u64 = 5000;

// Destination naming: <prefix><unix millis>.<extension>
pub const FILE_PREFIX: &str = "wifip2pshared-";
pub const FILE_EXTENSION: &str = "jpg";

// Progress is reported once every N chunks (and once at the end)
pub const PROGRESS_EVERY_CHUNKS: u64 = 64;

// Output directory used when the platform has no download directory
pub const FALLBACK_OUTPUT_DIR: &str = "./received";
