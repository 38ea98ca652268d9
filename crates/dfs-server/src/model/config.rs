//! Configuration management for the DFS server
//!
//! Values are layered lowest to highest: built-in defaults, the optional
//! config file, `DFS.*` environment variables, then command line flags.

use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, ConfigBuilder, Environment, builder::DefaultState};

use dfs_api::{
    DEFAULT_CALLBACK_CONNECT_TIMEOUT_MS, DEFAULT_EXTENT_PORT, DEFAULT_FRONTEND_PORT,
    DEFAULT_LOCK_PORT,
};
use dfs_common::DfsError;

use crate::startup::{LogRotation, LoggingConfig};

pub const LOCK_PORT: &str = "dfs.lock.port";
pub const EXTENT_PORT: &str = "dfs.extent.port";
pub const EXTENT_ROOT: &str = "dfs.extent.root";
pub const FRONTEND_PORT: &str = "dfs.frontend.port";
pub const FRONTEND_EXTENT_ADDR: &str = "dfs.frontend.extent_addr";
pub const FRONTEND_LOCK_ADDR: &str = "dfs.frontend.lock_addr";
pub const FRONTEND_ADVERTISE_HOST: &str = "dfs.frontend.advertise_host";
pub const SERVER_ADDRESS: &str = "dfs.server.address";
pub const CALLBACK_CONNECT_TIMEOUT_MS: &str = "dfs.callback.connect_timeout_ms";
pub const SHUTDOWN_GRACE_MS: &str = "dfs.shutdown.grace_ms";
pub const LOGS_PATH: &str = "dfs.logs.path";
pub const LOGS_LEVEL: &str = "dfs.logs.level";
pub const LOGS_CONSOLE: &str = "dfs.logs.console";
pub const LOGS_FILE: &str = "dfs.logs.file";
pub const LOGS_ROTATION: &str = "dfs.logs.rotation";

const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
const DEFAULT_SHUTDOWN_GRACE_MS: i64 = 2000;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "dfs", version, about = "Distributed file service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file; a missing file is not an error
    #[arg(short = 'c', long = "config", env = "DFS_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,

    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the lock authority
    Lock {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the extent service
    Extent {
        #[arg(long)]
        port: Option<u16>,
        /// Directory the extent service stores data under
        #[arg(long)]
        root: Option<String>,
    },
    /// Run the front-end coordinator and its lock callback endpoint
    Frontend {
        #[arg(long)]
        port: Option<u16>,
        /// Extent service address (host:port)
        #[arg(long = "extent")]
        extent_addr: Option<String>,
        /// Lock authority address (host:port)
        #[arg(long = "lock")]
        lock_addr: Option<String>,
    },
}

impl Command {
    pub fn role(&self) -> &'static str {
        match self {
            Command::Lock { .. } => "lock",
            Command::Extent { .. } => "extent",
            Command::Frontend { .. } => "frontend",
        }
    }
}

/// Application configuration loaded from defaults, file, environment and flags
#[derive(Clone, Debug)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new(cli: &Cli) -> Result<Self, DfsError> {
        let builder = Self::defaults()
            .map_err(config_error)?
            .add_source(config::File::with_name(&cli.config_file).required(false))
            .add_source(
                Environment::with_prefix("DFS")
                    .separator(".")
                    .keep_prefix(true)
                    .try_parsing(true),
            );

        let builder = Self::apply_overrides(builder, cli).map_err(config_error)?;
        let config = builder.build().map_err(config_error)?;

        Ok(Configuration { config })
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Config::builder()
            .set_default(SERVER_ADDRESS, "0.0.0.0")?
            .set_default(LOCK_PORT, i64::from(DEFAULT_LOCK_PORT))?
            .set_default(EXTENT_PORT, i64::from(DEFAULT_EXTENT_PORT))?
            .set_default(EXTENT_ROOT, "data/extent")?
            .set_default(FRONTEND_PORT, i64::from(DEFAULT_FRONTEND_PORT))?
            .set_default(
                FRONTEND_EXTENT_ADDR,
                format!("127.0.0.1:{}", DEFAULT_EXTENT_PORT),
            )?
            .set_default(FRONTEND_LOCK_ADDR, format!("127.0.0.1:{}", DEFAULT_LOCK_PORT))?
            .set_default(
                CALLBACK_CONNECT_TIMEOUT_MS,
                DEFAULT_CALLBACK_CONNECT_TIMEOUT_MS as i64,
            )?
            .set_default(SHUTDOWN_GRACE_MS, DEFAULT_SHUTDOWN_GRACE_MS)?
            .set_default(LOGS_LEVEL, "info")?
            .set_default(LOGS_CONSOLE, true)?
            .set_default(LOGS_FILE, true)?
            .set_default(LOGS_ROTATION, "daily")
    }

    fn apply_overrides(
        mut builder: ConfigBuilder<DefaultState>,
        cli: &Cli,
    ) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        if let Some(v) = &cli.log_level {
            builder = builder.set_override(LOGS_LEVEL, v.as_str())?;
        }

        match &cli.command {
            Command::Lock { port } => {
                if let Some(v) = port {
                    builder = builder.set_override(LOCK_PORT, i64::from(*v))?;
                }
            }
            Command::Extent { port, root } => {
                if let Some(v) = port {
                    builder = builder.set_override(EXTENT_PORT, i64::from(*v))?;
                }
                if let Some(v) = root {
                    builder = builder.set_override(EXTENT_ROOT, v.as_str())?;
                }
            }
            Command::Frontend {
                port,
                extent_addr,
                lock_addr,
            } => {
                if let Some(v) = port {
                    builder = builder.set_override(FRONTEND_PORT, i64::from(*v))?;
                }
                if let Some(v) = extent_addr {
                    builder = builder.set_override(FRONTEND_EXTENT_ADDR, v.as_str())?;
                }
                if let Some(v) = lock_addr {
                    builder = builder.set_override(FRONTEND_LOCK_ADDR, v.as_str())?;
                }
            }
        }

        Ok(builder)
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS)
            .unwrap_or("0.0.0.0".to_string())
    }

    pub fn lock_port(&self) -> Result<u16, DfsError> {
        self.port(LOCK_PORT)
    }

    pub fn extent_port(&self) -> Result<u16, DfsError> {
        self.port(EXTENT_PORT)
    }

    pub fn extent_root(&self) -> Result<String, DfsError> {
        self.config.get_string(EXTENT_ROOT).map_err(config_error)
    }

    pub fn frontend_port(&self) -> Result<u16, DfsError> {
        self.port(FRONTEND_PORT)
    }

    pub fn frontend_extent_addr(&self) -> Result<String, DfsError> {
        self.config
            .get_string(FRONTEND_EXTENT_ADDR)
            .map_err(config_error)
    }

    pub fn frontend_lock_addr(&self) -> Result<String, DfsError> {
        self.config
            .get_string(FRONTEND_LOCK_ADDR)
            .map_err(config_error)
    }

    /// Host put into the front-end's owner id; defaults to this machine's IPv4
    pub fn frontend_advertise_host(&self) -> Option<String> {
        self.config.get_string(FRONTEND_ADVERTISE_HOST).ok()
    }

    pub fn callback_connect_timeout(&self) -> Result<Duration, DfsError> {
        self.millis(CALLBACK_CONNECT_TIMEOUT_MS)
    }

    pub fn shutdown_grace(&self) -> Result<Duration, DfsError> {
        self.millis(SHUTDOWN_GRACE_MS)
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> Result<LoggingConfig, DfsError> {
        Ok(LoggingConfig::from_config(
            self.config.get_string(LOGS_PATH).ok(),
            self.config.get_bool(LOGS_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOGS_FILE).unwrap_or(true),
            self.config
                .get_string(LOGS_LEVEL)
                .unwrap_or("info".to_string()),
            self.log_rotation()?,
        ))
    }

    pub fn log_rotation(&self) -> Result<LogRotation, DfsError> {
        self.config
            .get_string(LOGS_ROTATION)
            .map_err(config_error)?
            .parse()
            .map_err(|e: String| DfsError::ConfigError(format!("{}: {}", LOGS_ROTATION, e)))
    }

    fn port(&self, key: &str) -> Result<u16, DfsError> {
        let value = self.config.get_int(key).map_err(config_error)?;
        u16::try_from(value)
            .map_err(|_| DfsError::ConfigError(format!("{} out of range: {}", key, value)))
    }

    fn millis(&self, key: &str) -> Result<Duration, DfsError> {
        let value = self.config.get_int(key).map_err(config_error)?;
        u64::try_from(value)
            .map(Duration::from_millis)
            .map_err(|_| DfsError::ConfigError(format!("{} must not be negative: {}", key, value)))
    }
}

fn config_error(e: config::ConfigError) -> DfsError {
    DfsError::ConfigError(e.to_string())
}
