//! Constants for the download module (timeouts, filename limits).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large lossless files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Longest filename we write, in bytes (most filesystems cap at 255).
pub const MAX_FILENAME_BYTES: usize = 200;

/// Suffix of the in-progress file a transfer streams into.
pub const PARTIAL_SUFFIX: &str = ".part";
