//! # Orbit Configuration
//!
//! Runtime settings for the database layer and document defaults.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ORBIT_DB_PATH=./data/orbit.db                                      │
//! │     ORBIT_MAX_CONNECTIONS=8                                            │
//! │     ORBIT_ALLOCATION_ATTEMPTS=5                                        │
//! │     ORBIT_DEFAULT_CURRENCY=EUR                                         │
//! │     ORBIT_DEFAULT_VAT=15                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     orbit.toml (path passed by the caller)                             │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./orbit.db, 5 connections, 5 attempts, USD, 0% VAT                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # orbit.toml
//! [database]
//! path = "./data/orbit.db"
//! max_connections = 5
//! allocation_attempts = 5
//!
//! [documents]
//! default_currency = "USD"
//! default_vat_percent = 15
//! auto_job_numbers = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::pool::DbConfig;
use crate::repository::document::NewDocument;
use crate::retry::DEFAULT_ALLOCATION_ATTEMPTS;
use orbit_core::validation::validate_currency;
use orbit_core::{DocumentKind, TaxRate, DEFAULT_CURRENCY};

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Attempts per number/code allocation before giving up with a conflict.
    #[serde(default = "default_allocation_attempts")]
    pub allocation_attempts: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./orbit.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_allocation_attempts() -> u32 {
    DEFAULT_ALLOCATION_ATTEMPTS
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            allocation_attempts: default_allocation_attempts(),
        }
    }
}

/// `[documents]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Whole-number VAT percentage applied when a document names none.
    #[serde(default)]
    pub default_vat_percent: u32,

    /// Issue an `INV_<year>_<n>` job number alongside every invoice.
    #[serde(default = "default_true")]
    pub auto_job_numbers: bool,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DocumentSettings {
    fn default() -> Self {
        DocumentSettings {
            default_currency: default_currency(),
            default_vat_percent: 0,
            auto_job_numbers: true,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Orbit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrbitConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub documents: DocumentSettings,
}

impl OrbitConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file, when `config_path` is given and exists
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `ORBIT_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ORBIT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("ORBIT_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("ORBIT_MAX_CONNECTIONS", &value)?;
        }

        if let Some(value) = lookup("ORBIT_ALLOCATION_ATTEMPTS") {
            self.database.allocation_attempts = parse_env("ORBIT_ALLOCATION_ATTEMPTS", &value)?;
        }

        if let Some(value) = lookup("ORBIT_DEFAULT_CURRENCY") {
            self.documents.default_currency = value.trim().to_uppercase();
        }

        if let Some(value) = lookup("ORBIT_DEFAULT_VAT") {
            self.documents.default_vat_percent = parse_env("ORBIT_DEFAULT_VAT", &value)?;
        }

        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.allocation_attempts == 0 {
            return Err(ConfigError::Invalid(
                "allocation_attempts must be greater than 0".into(),
            ));
        }

        validate_currency(&self.documents.default_currency)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        self.default_tax_rate()?;

        Ok(())
    }

    /// Default VAT rate for new documents.
    pub fn default_tax_rate(&self) -> Result<TaxRate, ConfigError> {
        TaxRate::from_percent(self.documents.default_vat_percent)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Database configuration derived from these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .allocation_attempts(self.database.allocation_attempts)
            .auto_job_numbers(self.documents.auto_job_numbers)
    }

    /// Starts a document carrying the configured currency and VAT.
    pub fn new_document(
        &self,
        kind: DocumentKind,
        company_id: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Result<NewDocument, ConfigError> {
        Ok(NewDocument::new(kind, company_id, created_by)
            .currency(self.documents.default_currency.clone())
            .tax_rate(self.default_tax_rate()?))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = OrbitConfig::default();
        assert_eq!(config.database.allocation_attempts, 5);
        assert_eq!(config.documents.default_currency, "USD");
        assert!(config.documents.auto_job_numbers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = OrbitConfig::from_toml_str(
            r#"
            [database]
            allocation_attempts = 8

            [documents]
            default_vat_percent = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.database.allocation_attempts, 8);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.default_tax_rate().unwrap().bps(), 1500);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = OrbitConfig::from_toml_str("[database]\nmax_connections = 2\n").unwrap();
        config
            .apply_env_overrides(env(&[
                ("ORBIT_MAX_CONNECTIONS", "9"),
                ("ORBIT_DEFAULT_CURRENCY", "eur"),
                ("ORBIT_DB_PATH", "/tmp/orbit-test.db"),
            ]))
            .unwrap();

        assert_eq!(config.database.max_connections, 9);
        assert_eq!(config.documents.default_currency, "EUR");
        assert_eq!(config.db_config().database_path, PathBuf::from("/tmp/orbit-test.db"));
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = OrbitConfig::default();
        let err = config
            .apply_env_overrides(env(&[("ORBIT_ALLOCATION_ATTEMPTS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = OrbitConfig::default();
        config.database.allocation_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = OrbitConfig::default();
        config.documents.default_vat_percent = 150;
        assert!(config.validate().is_err());

        let mut config = OrbitConfig::default();
        config.documents.default_currency = "dollars".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_new_document_defaults() {
        let mut config = OrbitConfig::default();
        config.documents.default_currency = "EUR".into();
        config.documents.default_vat_percent = 15;
        config.documents.auto_job_numbers = false;

        let doc = config
            .new_document(DocumentKind::Quotation, "company-1", "user-1")
            .unwrap();
        assert_eq!(doc.currency, "EUR");
        assert_eq!(doc.tax_rate.bps(), 1500);
        assert!(!config.db_config().auto_job_numbers);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&OrbitConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[documents]"));
    }
}
