use jirafa_shared::growth::{GrowthStandards, TableError};
use serde::Deserialize;
use std::{env, fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt_secret: String,
    /// Parent accounts created (or re-keyed) at startup.
    #[serde(default)]
    pub users: Vec<UserConfig>,
    pub dev_cors_origin: Option<String>,
    pub listen_port: Option<u16>,
    /// YAML file replacing the built-in OMS/SAP reference tables.
    pub reference_tables: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub password_hash: String, // bcrypt hash
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Tables(TableError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML error: {}", e),
            ConfigError::Tables(e) => write!(f, "reference tables: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::Yaml(value)
    }
}

impl From<TableError> for ConfigError {
    fn from(value: TableError) -> Self {
        ConfigError::Tables(value)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        let cfg: AppConfig = serde_yaml::from_str(&text)?;
        Ok(cfg)
    }

    /// Reference tables to classify measurements with: the configured
    /// override file if any, otherwise the built-in ones.
    pub fn growth_standards(&self) -> Result<GrowthStandards, ConfigError> {
        match &self.reference_tables {
            Some(path) => load_tables(path),
            None => {
                let builtin = GrowthStandards::builtin();
                builtin.validate()?;
                Ok(builtin)
            }
        }
    }
}

fn load_tables<P: AsRef<Path>>(path: P) -> Result<GrowthStandards, ConfigError> {
    let text = fs::read_to_string(&path)?;
    // Deserialization validates row ordering and thresholds.
    Ok(serde_yaml::from_str(&text)?)
}
