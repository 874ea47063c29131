//! TOML-based engine configuration.
//!
//! Supports a config file (tabula.toml) with environment variable expansion
//! in string values.
//!
//! Example configuration:
//! ```toml
//! [assets]
//! schema_dir = "assets/schema"
//! enum_dir = "assets/enum"
//! i18n_dir = "assets/i18n"
//!
//! [database]
//! driver = "mysql"
//! connection_string = "${DATABASE_URL}"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Asset folder locations.
    pub assets: AssetSettings,

    /// Database connection configuration.
    pub database: DatabaseSettings,
}

/// Locations of the JSON asset folders.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetSettings {
    pub schema_dir: PathBuf,
    pub enum_dir: PathBuf,
    pub i18n_dir: PathBuf,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from("assets/schema"),
            enum_dir: PathBuf::from("assets/enum"),
            i18n_dir: PathBuf::from("assets/i18n"),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database driver name (e.g. "mysql", "postgres").
    pub driver: String,

    /// Connection string (supports `${ENV_VAR}` expansion).
    pub connection_string: String,
}

impl Settings {
    /// Load settings from a TOML file, expanding `${ENV_VAR}` references.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_str_expanded(&content)
    }

    /// Parse settings from a TOML string, expanding `${ENV_VAR}` references.
    pub fn from_str_expanded(content: &str) -> Result<Self, SettingsError> {
        let expanded = expand_env_vars(content)?;
        Ok(toml::from_str(&expanded)?)
    }
}

/// Expand `${VAR}` references against the process environment.
fn expand_env_vars(content: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                let value =
                    env::var(name).map_err(|_| SettingsError::MissingEnvVar(name.to_string()))?;
                result.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    result.push_str(rest);
    Ok(result)
}
