//! DFS API - gRPC definitions
//!
//! This crate provides the generated messages, clients and servers for:
//! - `lock`: the lock authority
//! - `cache`: the revoke/retry callback endpoint hosted by lock caches
//! - `extent`: the extent storage service
//! - `frontend`: the front-end coordinator

pub mod lock {
    tonic::include_proto!("dfs.lock");
}

pub mod cache {
    tonic::include_proto!("dfs.cache");
}

pub mod extent {
    tonic::include_proto!("dfs.extent");
}

pub mod frontend {
    tonic::include_proto!("dfs.frontend");
}

pub mod model;

pub use model::*;
