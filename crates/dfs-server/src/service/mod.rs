//! gRPC services hosted only by the server binary

pub mod dfs;

pub use dfs::FrontendService;
