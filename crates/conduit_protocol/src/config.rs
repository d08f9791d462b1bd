//! Application configuration.
//!
//! Loaded once at startup from TOML and passed by reference through the
//! launch context; nothing in the pipeline reads configuration through
//! globals. Every field has a default so a minimal file (or none, for
//! tests) still resolves to a working configuration.

use crate::types::{EngineType, QueueKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    #[serde(default)]
    pub oidc: OidcConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Find an enabled database connection by name.
    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases
            .iter()
            .find(|db| db.enabled && db.connection_name == name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for db in &self.databases {
            if db.connection_name.is_empty() {
                return Err(ConfigError::Invalid(
                    "database connection_name cannot be empty".to_string(),
                ));
            }
            if db.queues.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "database {} declares no queues",
                    db.connection_name
                )));
            }
            if db.max_queries_per_request == 0 {
                return Err(ConfigError::Invalid(format!(
                    "database {} has max_queries_per_request of 0",
                    db.connection_name
                )));
            }
        }
        Ok(())
    }
}

/// Server identity and bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            name: default_server_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            api_prefix: default_api_prefix(),
        }
    }
}

/// One database connection with its queue layout and cached queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub connection_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub engine: EngineType,
    #[serde(default = "default_max_queries")]
    pub max_queries_per_request: usize,
    #[serde(default = "default_queues")]
    pub queues: Vec<QueueKind>,
    #[serde(default = "default_workers")]
    pub workers_per_queue: usize,
    #[serde(default = "default_timeout")]
    pub default_timeout_seconds: i64,
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,
}

/// A pre-registered query, addressable by integer reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub query_ref: i32,
    pub sql: String,
    #[serde(default = "default_queue_kind")]
    pub queue: QueueKind,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_websocket_port")]
    pub port: u16,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            enabled: false,
            port: default_websocket_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MdnsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub hostname: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub issuer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
}

fn default_server_name() -> String {
    "conduit".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_queries() -> usize {
    10
}

fn default_queues() -> Vec<QueueKind> {
    vec![QueueKind::Slow, QueueKind::Fast]
}

fn default_workers() -> usize {
    1
}

fn default_timeout() -> i64 {
    30
}

fn default_queue_kind() -> QueueKind {
    QueueKind::Slow
}

fn default_websocket_port() -> u16 {
    8081
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_resolves_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.name, "conduit");
        assert_eq!(config.server.port, 8080);
        assert!(config.databases.is_empty());
    }

    #[test]
    fn database_section_parses_with_queries() {
        let raw = r#"
            [[databases]]
            connection_name = "main"
            engine = "sqlite"
            max_queries_per_request = 5

            [[databases.queries]]
            query_ref = 1
            sql = "SELECT * FROM users WHERE id = :id"
            queue = "fast"
            public = true
            description = "User lookup"
        "#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        let db = config.database("main").unwrap();
        assert_eq!(db.engine, EngineType::Sqlite);
        assert_eq!(db.max_queries_per_request, 5);
        assert_eq!(db.queues, vec![QueueKind::Slow, QueueKind::Fast]);
        assert_eq!(db.queries.len(), 1);
        assert!(db.queries[0].public);
    }

    #[test]
    fn disabled_databases_are_not_found() {
        let raw = r#"
            [[databases]]
            connection_name = "dark"
            enabled = false
            engine = "postgres"
        "#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        assert!(config.database("dark").is_none());
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let raw = r#"
            [[databases]]
            connection_name = "main"
            engine = "sqlite"
            max_queries_per_request = 0
        "#;
        assert!(matches!(
            AppConfig::from_toml_str(raw),
            Err(ConfigError::Invalid(_))
        ));
    }
}
