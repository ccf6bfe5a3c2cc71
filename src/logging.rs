//! Logging System
//!
//! Structured logging via the `tracing` crate with configurable level,
//! output format and optional file destination.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional log file path; stderr when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

/// Resolve the log file path with precedence: explicit path, KNOLL_LOG_FILE
/// env, config file, platform state directory default.
pub fn resolve_log_file_path(
    explicit: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, ApiError> {
    if let Some(p) = explicit {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    if let Ok(env_path) = std::env::var("KNOLL_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    let project_dirs = directories::ProjectDirs::from("", "knoll", "knoll").ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine platform state directory for log file".to_string(),
        )
    })?;
    let state_dir = project_dirs
        .state_dir()
        .or_else(|| Some(project_dirs.data_dir()))
        .ok_or_else(|| {
            ApiError::ConfigError("Platform state directory not available for log file".to_string())
        })?;
    Ok(state_dir.join("knoll.log"))
}

/// Initialize the global subscriber from configuration.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call once per
/// process; later calls fail with a configuration error.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ApiError> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let writer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ApiError::ConfigError(format!("Failed to create log directory: {}", e))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    ApiError::ConfigError(format!(
                        "Failed to open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            let file = std::sync::Arc::new(std::sync::Mutex::new(file));
            BoxMakeWriter::new(move || LockedFileWriter { file: file.clone() })
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = Registry::default().with(filter);
    let result = if config.format == "json" {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    };

    result.map_err(|e| ApiError::ConfigError(format!("Failed to initialize logging: {}", e)))
}

struct LockedFileWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl std::io::Write for LockedFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log writer poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log writer poisoned"))?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_has_highest_precedence() {
        let resolved = resolve_log_file_path(
            Some(PathBuf::from("/tmp/explicit.log")),
            Some(PathBuf::from("/tmp/config.log")),
        )
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/explicit.log"));
    }

    #[test]
    fn disabled_logging_initializes_nothing() {
        let config = LoggingConfig {
            enabled: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn config_path_used_when_no_explicit_path() {
        std::env::remove_var("KNOLL_LOG_FILE");
        let resolved =
            resolve_log_file_path(None, Some(PathBuf::from("/tmp/config.log"))).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/config.log"));
    }
}
