//! DFS Lock Cache - client side of the lock protocol
//!
//! This crate provides:
//! - `LockCache`: per-name cached lock state that turns repeated use of the
//!   same lock by one process into zero extra RPCs until the authority
//!   revokes it, plus the background releaser loop
//! - `LockGuard`: RAII handle releasing the lock when dropped
//! - `LockServer`: the seam to the lock authority, with a gRPC implementation
//! - `CallbackEndpoint`: the tonic service receiving Revoke/Retry callbacks

#![allow(clippy::result_large_err)]

pub mod cache;
pub mod endpoint;
pub mod error;
pub mod server;

pub use cache::{CacheState, CacheStats, LockCache, LockGuard};
pub use endpoint::CallbackEndpoint;
pub use error::{ClientError, Result};
pub use server::{GrpcLockServer, LockServer};
