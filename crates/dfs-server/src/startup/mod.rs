//! Application startup utilities module.

mod grpc;
mod logging;
mod shutdown;

pub use grpc::{
    FrontendOptions, RunningServer, bind, start_extent, start_frontend, start_lock_authority,
};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::install_signal_handlers;
