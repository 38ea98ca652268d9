//! File-based logging with per-component files.
//!
//! Every process writes a root log plus one file per lock-protocol component,
//! rotated daily unless `dfs.logs.rotation` says otherwise:
//!
//! | Log File            | Component                        | Target Prefixes                    |
//! |---------------------|----------------------------------|------------------------------------|
//! | dfs.log             | Root logger (all components)     | (all)                              |
//! | lock-authority.log  | Lock authority and its loops     | dfs_lock::                         |
//! | lock-cache.log      | Lock cache and callback endpoint | dfs_lock_cache                     |
//! | extent.log          | Extent storage                   | dfs_extent                         |
//! | remote.log          | Remote/gRPC communication        | dfs_api, dfs_server::service       |
//!
//! [`Targets`] matches by string prefix, so the authority crate is routed as
//! `dfs_lock::` to keep `dfs_lock_cache` events out of its file.
//!
//! Log files are stored in `~/dfs/logs` by default.
//! Override with the `dfs.logs.path` config key.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const ROOT_LOG_FILE: &str = "dfs.log";

/// Internal definition for a component log file.
struct ComponentLogDef {
    /// Log file name (e.g. "lock-authority.log")
    file_name: &'static str,
    /// Target module prefixes routed to this file
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "lock-authority.log",
        targets: &["dfs_lock::"],
    },
    ComponentLogDef {
        file_name: "lock-cache.log",
        targets: &["dfs_lock_cache"],
    },
    ComponentLogDef {
        file_name: "extent.log",
        targets: &["dfs_extent"],
    },
    ComponentLogDef {
        file_name: "remote.log",
        targets: &["dfs_api", "dfs_server::service"],
    },
];

/// Log rotation policy
#[derive(Debug, Clone, Copy)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(LogRotation::Daily),
            "hourly" => Ok(LogRotation::Hourly),
            "never" => Ok(LogRotation::Never),
            other => Err(format!("unknown log rotation '{}'", other)),
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging configuration for the entire application.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Base log directory (default: `~/dfs/logs`)
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/dfs/logs", home))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: true,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from application configuration.
    pub fn from_config(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: String,
        rotation: LogRotation,
    ) -> Self {
        let log_dir = log_dir.map(PathBuf::from).unwrap_or_else(default_log_dir);
        let level = level.parse().unwrap_or(Level::INFO);

        Self {
            log_dir,
            console_output,
            console_level: level,
            file_logging,
            file_level: level,
            rotation,
        }
    }
}

fn component_targets(component: &ComponentLogDef, level: Level) -> Targets {
    component
        .targets
        .iter()
        .fold(Targets::new(), |targets, target| {
            targets.with_target(*target, LevelFilter::from_level(level))
        })
}

/// Guard that keeps the logging system alive.
///
/// Holds the file appender worker guards; dropping it flushes buffered output.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Initialize the logging system with console output and multi-file output.
///
/// `RUST_LOG` overrides the configured level for the console and the root
/// file. Component files use [`Targets`] filters to route events by target.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(root_filter);
        layers.push(Box::new(root_layer));

        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let targets = component_targets(component, config.file_level);

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_filter(targets);
            layers.push(Box::new(layer));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            "File logging initialized: {} (root) + {} component log files",
            ROOT_LOG_FILE,
            COMPONENT_LOGS.len()
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.console_output);
        assert!(config.file_logging);
        assert_eq!(config.console_level, Level::INFO);
        assert!(config.log_dir.ends_with("dfs/logs"));
    }

    #[test]
    fn test_logging_config_from_config() {
        let config = LoggingConfig::from_config(
            Some("/tmp/dfs-test-logs".to_string()),
            false,
            true,
            "debug".to_string(),
            LogRotation::Hourly,
        );
        assert_eq!(config.log_dir, PathBuf::from("/tmp/dfs-test-logs"));
        assert!(!config.console_output);
        assert_eq!(config.file_level, Level::DEBUG);
        assert!(matches!(config.rotation, LogRotation::Hourly));

        let config = LoggingConfig::from_config(
            None,
            true,
            false,
            "nonsense".to_string(),
            LogRotation::Daily,
        );
        assert_eq!(config.console_level, Level::INFO);
    }

    #[test]
    fn test_component_log_definitions() {
        for component in COMPONENT_LOGS {
            assert!(component.file_name.ends_with(".log"));
            assert!(!component.targets.is_empty());
            assert!(component.targets.iter().all(|t| t.starts_with("dfs_")));
        }
    }

    #[test]
    fn test_log_rotation_parse() {
        assert!(matches!("daily".parse::<LogRotation>(), Ok(LogRotation::Daily)));
        assert!(matches!("HOURLY".parse::<LogRotation>(), Ok(LogRotation::Hourly)));
        assert!(matches!("never".parse::<LogRotation>(), Ok(LogRotation::Never)));
        assert!("weekly".parse::<LogRotation>().is_err());
    }

    #[test]
    fn test_component_routing_by_target() {
        let file = |name: &str| {
            let component = COMPONENT_LOGS
                .iter()
                .find(|c| c.file_name == name)
                .unwrap();
            component_targets(component, Level::INFO)
        };

        let authority = file("lock-authority.log");
        assert!(authority.would_enable("dfs_lock::authority", &Level::INFO));
        assert!(authority.would_enable("dfs_lock::notifier", &Level::INFO));
        assert!(authority.would_enable("dfs_lock::service", &Level::INFO));
        assert!(!authority.would_enable("dfs_lock_cache::cache", &Level::INFO));
        assert!(!authority.would_enable("dfs_lock_cache::endpoint", &Level::INFO));

        let cache = file("lock-cache.log");
        assert!(cache.would_enable("dfs_lock_cache::cache", &Level::INFO));
        assert!(!cache.would_enable("dfs_lock::authority", &Level::INFO));

        let remote = file("remote.log");
        assert!(remote.would_enable("dfs_server::service::dfs", &Level::INFO));
        assert!(!remote.would_enable("dfs_server::startup::grpc", &Level::INFO));

        assert!(!authority.would_enable("dfs_lock::authority", &Level::DEBUG));
    }
}
