//! DFS Lock - the lock authority
//!
//! This crate provides:
//! - `LockAuthority`: one row per lock name holding the current holder, a FIFO
//!   waiter queue and per-owner sequence bookkeeping
//! - The revoke and retry notifier loops that call back into lock caches
//! - `CallbackNotifier`, the seam through which callbacks are delivered, and
//!   its gRPC implementation
//! - `LockGrpcService`, the tonic adapter exposing Acquire/Release/Stop

#![allow(clippy::result_large_err)]

pub mod authority;
pub mod error;
pub mod notifier;
pub mod service;

pub use authority::{AuthorityStats, LockAuthority};
pub use error::CallbackError;
pub use notifier::{CallbackNotifier, GrpcCallbackNotifier};
pub use service::LockGrpcService;
