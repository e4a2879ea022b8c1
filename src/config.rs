//! Engine configuration, from files or environment variables.

use crate::database::DatabaseConfig;
use crate::error::{ConfigError, Result};
use crate::model::provider::DirectoryModelProvider;
use crate::version_store::DEFAULT_VERSION_TABLE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DATABASE: &str = "DATAMODEL_DATABASE";
pub const ENV_QUERY_TIMEOUT: &str = "DATAMODEL_QUERY_TIMEOUT";
pub const ENV_VERSION_TABLE: &str = "DATAMODEL_VERSION_TABLE";
pub const ENV_MODEL_ROOT: &str = "DATAMODEL_MODEL_ROOT";
pub const ENV_MODEL_NAME: &str = "DATAMODEL_MODEL_NAME";

/// Where the versioned model bundle lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSourceConfig {
    /// Directory containing `<name>.datamodel/`
    pub root: PathBuf,
    pub name: String,
}

impl ModelSourceConfig {
    pub fn provider(&self) -> DirectoryModelProvider {
        DirectoryModelProvider::new(&self.root, &self.name)
    }
}

/// Top-level configuration for a schema engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Name of the version table
    #[serde(default = "default_version_table")]
    pub version_table: String,

    #[serde(default)]
    pub model: Option<ModelSourceConfig>,
}

fn default_version_table() -> String {
    DEFAULT_VERSION_TABLE.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            version_table: default_version_table(),
            model: None,
        }
    }
}

impl EngineConfig {
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            database,
            ..Default::default()
        }
    }

    /// Load from a TOML or YAML file, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let config: EngineConfig = match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported configuration format '{}'",
                    other
                ))
                .into())
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `DATAMODEL_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup using the `DATAMODEL_*` variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = lookup(ENV_DATABASE)
            .ok_or_else(|| ConfigError::MissingEnvVar(ENV_DATABASE.to_string()))?;
        let mut config = EngineConfig::new(DatabaseConfig::sqlite(database));

        if let Some(raw) = lookup(ENV_QUERY_TIMEOUT) {
            config.database.query_timeout_seconds = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a number of seconds, got '{}'", ENV_QUERY_TIMEOUT, raw))
            })?;
        }
        if let Some(table) = lookup(ENV_VERSION_TABLE) {
            config.version_table = table;
        }

        config.model = match (lookup(ENV_MODEL_ROOT), lookup(ENV_MODEL_NAME)) {
            (Some(root), Some(name)) => Some(ModelSourceConfig {
                root: PathBuf::from(root),
                name,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar(ENV_MODEL_NAME.to_string()).into()),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar(ENV_MODEL_ROOT.to_string()).into()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.database.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database path must not be empty".to_string()));
        }
        if self.version_table.trim().is_empty() {
            return Err(ConfigError::Invalid("version table name must not be empty".to_string()));
        }
        if self.version_table.contains('"') || self.version_table.contains('\'') {
            return Err(ConfigError::Invalid(format!(
                "version table name {:?} must not contain quotes",
                self.version_table
            )));
        }
        if self.database.query_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("query timeout must be at least one second".to_string()));
        }
        if let Some(model) = &self.model {
            if model.name.trim().is_empty() {
                return Err(ConfigError::Invalid("model name must not be empty".to_string()));
            }
        }
        Ok(())
    }
}
