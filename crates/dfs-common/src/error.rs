//! Error types for DFS
//!
//! `DfsError` is the application-level error shared by every crate in the
//! workspace. Transport-specific errors live next to the code that talks to
//! the network and convert into this type where they cross crate boundaries.

/// Application-specific error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DfsError {
    #[error("invalid owner id '{0}'")]
    InvalidOwnerId(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("network error: {0}")]
    NetworkError(String),
}

pub type Result<T> = std::result::Result<T, DfsError>;
