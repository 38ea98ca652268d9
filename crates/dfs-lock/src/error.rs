//! Callback delivery errors

use dfs_common::DfsError;

/// Error raised while delivering a revoke or retry callback to a lock cache
///
/// These never fail the Acquire/Release call that scheduled the callback; the
/// notifier loops log them and move on.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("{0}")]
    InvalidOwnerId(#[from] DfsError),
}
