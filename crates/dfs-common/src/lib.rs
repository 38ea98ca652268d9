//! DFS Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all DFS components:
//! - Error types
//! - The `OwnerId` that names a lock-cache process and routes callbacks to it
//! - Network helpers
//! - The shutdown signal shared by servers and their `Stop` RPCs

pub mod error;
pub mod owner;
pub mod shutdown;
pub mod utils;

// Re-exports for convenience
pub use error::{DfsError, Result};
pub use owner::OwnerId;
pub use shutdown::ShutdownSignal;
pub use utils::{local_ip, random_suffix};

/// Length of the random suffix appended to every owner id
pub const OWNER_SUFFIX_LEN: usize = 8;

/// Suffix that marks a logical name as a directory
pub const DIRECTORY_SUFFIX: char = '/';

/// Returns true when the logical name denotes a directory (`a/b/`)
pub fn is_directory_name(name: &str) -> bool {
    name.ends_with(DIRECTORY_SUFFIX)
}
