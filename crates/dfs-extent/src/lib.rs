//! DFS Extent - storage collaborator of the front-end
//!
//! Logical names map onto paths below a root directory. Names ending in `/`
//! are directories, everything else is a file.

pub mod error;
pub mod service;
pub mod store;

pub use error::ExtentError;
pub use service::ExtentGrpcService;
pub use store::ExtentStore;
