// Main library module for the DFS server binary
// Wires the lock authority, extent store and front-end coordinator into gRPC servers

pub mod metrics; // Metric descriptions
pub mod model; // Command line and configuration
pub mod service; // Front-end coordinator service
pub mod startup; // Logging, shutdown and gRPC server startup

pub use model::config::{Cli, Command, Configuration};
