// Common utilities shared across acquisition, analysis and reporting

pub mod audit;
pub mod hash;
pub mod path_security;

// Re-exports for convenience
pub use hash::{sha256_file, sha256_path, VerificationStatus};
pub use path_security::{safe_join, sanitize_filename, PathSecurityError};

// Shared constants
pub const BUFFER_SIZE: usize = 1024 * 1024; // 1MB read buffer for evidence hashing
