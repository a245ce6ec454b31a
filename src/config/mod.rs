//! Configuration module for pipeflow
//!
//! This module handles flow configuration including:
//! - Rhai safety limits applied to every pipe interpreter
//! - Logging setup (console plus optional rolling log files)
//! - The directory searched by non-`flow:` script imports
//!
//! # Files
//!
//! Configuration is stored as TOML:
//!
//! ```toml
//! script_dir = "scripts"
//!
//! [engine]
//! max_operations = 10000000
//! max_call_levels = 64
//!
//! [logging]
//! filter = "info,pipeflow=debug"
//! directory = "logs"
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pipeflow::config::{init_logging, FlowConfig};
//!
//! let config = FlowConfig::load("pipeflow.toml")?;
//! let _guard = init_logging(&config.logging)?;
//! let flow = Flow::builder().config(config).pipes(pipes).build();
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,pipeflow=debug";

/// Default file name prefix for rolling log files
pub const DEFAULT_LOG_FILE_PREFIX: &str = "pipeflow.log";

/// Default maximum number of operations a single script call may run
pub const DEFAULT_MAX_OPERATIONS: u64 = 10_000_000;

/// Default maximum length of script arrays and list proxies
pub const DEFAULT_MAX_ARRAY_SIZE: usize = 100_000;

/// Ceiling on list proxy lengths when `max_array_size` is unlimited
pub const MAX_LIST_LEN: usize = 1 << 24;

// ==================== Engine Limits ====================

/// Safety limits of the Rhai engine behind every pipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Maximum operations per call (0 = unlimited)
    pub max_operations: u64,

    /// Maximum function call nesting
    pub max_call_levels: usize,

    /// Maximum expression depth at global level
    pub max_expr_depth: usize,

    /// Maximum expression depth inside functions
    pub max_function_expr_depth: usize,

    /// Maximum length of a script string (0 = unlimited)
    pub max_string_size: usize,

    /// Maximum size of a Rhai array or list proxy (0 = unlimited arrays,
    /// proxies then stop at [`MAX_LIST_LEN`])
    pub max_array_size: usize,

    /// Maximum size of a Rhai object map (0 = unlimited)
    pub max_map_size: usize,

    /// Maximum number of modules a script may import
    pub max_modules: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 64,
            max_string_size: 1_000_000,
            max_array_size: DEFAULT_MAX_ARRAY_SIZE,
            max_map_size: 100_000,
            max_modules: 64,
        }
    }
}

// ==================== Logging ====================

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is not set
    pub filter: String,

    /// Emit ANSI colors on the console layer
    pub ansi: bool,

    /// Directory for daily rolling log files (disabled when unset)
    pub directory: Option<PathBuf>,

    /// File name prefix of the rolling log files
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            ansi: true,
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Returns the file writer's guard when a log directory is configured; log
/// lines still buffered are flushed when it is dropped, so keep it alive
/// for the lifetime of the program.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    let console = tracing_subscriber::fmt::layer().with_ansi(config.ansi);

    let (file, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Config(format!("Failed to create log directory: {}", e))
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install subscriber: {}", e)))?;

    Ok(guard)
}

// ==================== Flow Config ====================

/// Complete configuration of a flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Directory searched by non-`flow:` imports
    pub script_dir: Option<PathBuf>,

    /// Rhai engine limits
    pub engine: EngineLimits,

    /// Logging output
    pub logging: LoggingConfig,
}

impl FlowConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        let mut config = Self::from_toml_str(&content)?;

        // Relative script directories are relative to the config file
        if let (Some(dir), Some(parent)) = (&config.script_dir, path.parent()) {
            if dir.is_relative() {
                config.script_dir = Some(parent.join(dir));
            }
        }

        tracing::debug!("Loaded flow config from {:?}", path);
        Ok(config)
    }

    /// Load a configuration file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load flow config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Serialize the configuration to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save the configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.engine.max_operations, DEFAULT_MAX_OPERATIONS);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
        assert!(config.script_dir.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = FlowConfig::from_toml_str(
            r#"
                [engine]
                max_operations = 42

                [logging]
                ansi = false
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_operations, 42);
        assert_eq!(config.engine.max_call_levels, 64);
        assert!(!config.logging.ansi);
        assert_eq!(config.logging.file_prefix, DEFAULT_LOG_FILE_PREFIX);
    }

    #[test]
    fn test_invalid_toml() {
        let err = FlowConfig::from_toml_str("engine = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.toml");

        let mut config = FlowConfig::default();
        config.engine.max_modules = 3;
        config.script_dir = Some(PathBuf::from("scripts"));
        config.save(&path).unwrap();

        let loaded = FlowConfig::load(&path).unwrap();
        assert_eq!(loaded.engine, config.engine);
        assert_eq!(loaded.script_dir, Some(dir.path().join("scripts")));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = FlowConfig::load_or_default("/nonexistent/pipeflow.toml");
        assert_eq!(config, FlowConfig::default());
    }
}
