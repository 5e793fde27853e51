//! Configuration for the contract validator
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (contracts.toml)
//! - Environment variables (CONTRACTS__*)
//!
//! ## Example config file (contracts.toml):
//! ```toml
//! [validation]
//! enforce_envelope = true
//! report_all = false
//!
//! [logging]
//! filter = "message_contracts=debug"
//!
//! [output]
//! format = "compact"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the contract validator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Request validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Require the message envelope on new requests
    #[serde(default = "default_true")]
    pub enforce_envelope: bool,

    /// Report every incompatibility instead of the first one
    #[serde(default)]
    pub report_all: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enforce_envelope: true,
            report_all: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl OutputFormat {
    /// Render a value as JSON in this format
    pub fn render<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

impl ContractConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a file that must exist
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["contracts.toml", ".contracts.toml", "config/contracts.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "message-contracts", "contracts") {
            let xdg_config = dirs.config_dir().join("contracts.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CONTRACTS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContractConfig::default();
        assert!(config.validation.enforce_envelope);
        assert!(!config.validation.report_all);
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_serialize_config() {
        let toml_str = toml::to_string_pretty(&ContractConfig::default()).unwrap();
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("format = \"pretty\""));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts.toml");
        std::fs::write(
            &path,
            "[validation]\nreport_all = true\n\n[output]\nformat = \"compact\"\n",
        )
        .unwrap();

        let config = ContractConfig::load_from(Some(&path)).unwrap();
        assert!(config.validation.report_all);
        assert!(config.validation.enforce_envelope);
        assert_eq!(config.output.format, OutputFormat::Compact);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ContractConfig::default();
        config.validation.enforce_envelope = false;
        config.logging.filter = "message_contracts=debug".to_string();
        config.save(&path).unwrap();

        let loaded = ContractConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ContractConfig::load_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_compact_output() {
        let rendered = OutputFormat::Compact.render(&serde_json::json!({ "a": 1 })).unwrap();
        assert_eq!(rendered, r#"{"a":1}"#);
    }
}
