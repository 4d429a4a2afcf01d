//! Configuration handling for dbvc

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    parse(&config_str)
}

/// Parse configuration from a TOML string
pub fn parse(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

    config.validate()?;
    Ok(config)
}

/// Represents the complete dbvc configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub database_type: Dialect,
    /// Tables whose row contents are versioned alongside the schema
    #[serde(default)]
    pub enums: Vec<String>,
    pub schema_file: Option<String>,
    pub cache_file: Option<String>,
    pub dirs: Option<DirsConfig>,
    pub logging: Option<LoggingConfig>,
    pub apply: Option<ApplyConfig>,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Output directories for generated data-access code
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DirsConfig {
    pub repos: Option<String>,
    pub models: Option<String>,
    pub typescript: Option<String>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub stdout: bool,
}

/// Apply runner settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ApplyConfig {
    #[serde(default)]
    pub dry_run: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.connection.database_name.trim().is_empty() {
            return Err(Error::Config(
                "connection.database_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the authoritative schema document, `<database>.schema.json` unless overridden
    pub fn schema_path(&self) -> PathBuf {
        match &self.schema_file {
            Some(file) => PathBuf::from(file),
            None => PathBuf::from(crate::schema::loader::schema_file_name(
                &self.connection.database_name,
            )),
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        match &self.cache_file {
            Some(file) => PathBuf::from(file),
            None => PathBuf::from(format!(
                "{}.signatures.json",
                self.connection.database_name
            )),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.apply.as_ref().map(|a| a.dry_run).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"
database_type = "mysql"
enums = ["Status", "Role"]

[connection]
host = "localhost:3306"
database_name = "shop"
username = "root"
password = "secret"

[logging]
level = "debug"
format = "json"
"#;

    #[test]
    fn parses_full_document() {
        let config = parse(CONFIG).unwrap();

        assert_eq!(config.database_type, Dialect::MySql);
        assert_eq!(config.enums, vec!["Status".to_string(), "Role".to_string()]);
        assert_eq!(config.connection.host, "localhost:3306");
        assert_eq!(config.schema_path(), PathBuf::from("shop.schema.json"));
        assert_eq!(config.cache_path(), PathBuf::from("shop.signatures.json"));

        let logging = config.logging.unwrap();
        assert_eq!(logging.level, "debug");
        assert!(logging.stdout);
        assert!(!config.apply.map(|a| a.dry_run).unwrap_or(false));
    }

    #[test]
    fn rejects_unknown_database_type() {
        let doc = CONFIG.replace("\"mysql\"", "\"oracle\"");
        assert!(matches!(parse(&doc), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_empty_database_name() {
        let doc = CONFIG.replace("\"shop\"", "\"\"");
        assert!(matches!(parse(&doc), Err(Error::Config(_))));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbvc.toml");
        std::fs::write(&path, CONFIG.replace("mysql", "sqlite")).unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.database_type, Dialect::Sqlite);
    }
}
