//! Configuration
//!
//! Layered configuration via the `config` crate: built-in defaults, an
//! optional TOML file (explicit path or the platform config directory), then
//! a `KNOLL`-prefixed environment overlay. Missing connection identifiers
//! are a fatal startup error; the picker cannot run without them.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_api_base_url() -> String {
    "https://api.stack-ai.com".to_string()
}

fn default_connection_provider() -> String {
    "gdrive".to_string()
}

fn default_knowledge_base_name() -> String {
    "New Knowledge Base".to_string()
}

fn default_knowledge_base_description() -> String {
    "Knowledge base created from the file picker".to_string()
}

/// Picker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token for the connector API. Supplied, never acquired.
    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub connection_id: String,

    #[serde(default)]
    pub organization_id: String,

    #[serde(default = "default_connection_provider")]
    pub connection_provider: String,

    #[serde(default = "default_knowledge_base_name")]
    pub knowledge_base_name: String,

    #[serde(default = "default_knowledge_base_description")]
    pub knowledge_base_description: String,

    /// Directory for the durable resource cache; platform data dir when
    /// unset.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            access_token: String::new(),
            connection_id: String::new(),
            organization_id: String::new(),
            connection_provider: default_connection_provider(),
            knowledge_base_name: default_knowledge_base_name(),
            knowledge_base_description: default_knowledge_base_description(),
            cache_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl PickerConfig {
    /// Load configuration. Precedence: defaults, then file, then `KNOLL__*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(File::from(p.to_path_buf()));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    builder = builder.add_source(
                        File::from(default_path).required(false),
                    );
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("KNOLL")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "knoll", "knoll")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Startup validation. The connection and organization identifiers and
    /// the access token have no usable defaults.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.access_token.is_empty() {
            return Err(ApiError::ConfigError("access token is not set".to_string()));
        }
        if self.connection_id.is_empty() {
            return Err(ApiError::ConfigError(
                "connection_id is not set".to_string(),
            ));
        }
        if self.organization_id.is_empty() {
            return Err(ApiError::ConfigError(
                "organization_id is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the cache directory, defaulting to the platform data dir.
    pub fn resolve_cache_path(&self) -> Result<PathBuf, ApiError> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "knoll", "knoll").ok_or_else(|| {
            ApiError::ConfigError(
                "Could not determine platform data directory for the cache".to_string(),
            )
        })?;
        Ok(dirs.data_dir().join("resource-cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PickerConfig {
        PickerConfig {
            access_token: "token".to_string(),
            connection_id: "conn-1".to_string(),
            organization_id: "org-1".to_string(),
            ..PickerConfig::default()
        }
    }

    #[test]
    fn validation_passes_with_identifiers_set() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_identifiers_are_fatal() {
        let mut config = valid_config();
        config.connection_id.clear();
        assert!(matches!(
            config.validate(),
            Err(ApiError::ConfigError(_))
        ));

        let mut config = valid_config();
        config.organization_id.clear();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.access_token.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_cache_path_wins() {
        let mut config = valid_config();
        config.cache_path = Some(PathBuf::from("/tmp/knoll-cache"));
        assert_eq!(
            config.resolve_cache_path().unwrap(),
            PathBuf::from("/tmp/knoll-cache")
        );
    }
}
