use crate::errors::ConfigError;
use crate::keyspace::{Keyspace, DEFAULT_NAMESPACE};

use loadpool_store::RedisOptions;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

/// Settings of one pool member, loadable from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerLoadConfig {
    /// Shared store host
    #[serde(default = "default_host")]
    pub host: String,
    /// Shared store port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Root key prefix, isolates unrelated deployments sharing one store
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Type tag of the pool (required)
    #[serde(default)]
    pub pool_type: String,
    /// Period of the optional background refresh, in milliseconds
    #[serde(default)]
    pub refresh_interval_ms: Option<u64>,
    /// Redis AUTH password
    #[serde(default)]
    pub password: Option<String>,
    /// Redis logical database
    #[serde(default)]
    pub database: Option<u32>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl ServerLoadConfig {
    pub fn new(pool_type: &str) -> Self {
        ServerLoadConfig {
            host: default_host(),
            port: default_port(),
            namespace: default_namespace(),
            pool_type: pool_type.to_owned(),
            refresh_interval_ms: None,
            password: None,
            database: None,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_owned();
        self
    }

    /// Parses YAML without validating, for callers that still apply overrides.
    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_yaml(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_type.trim().is_empty() {
            return Err(ConfigError::MissingType);
        }
        Ok(())
    }

    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(&self.namespace, &self.pool_type)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms.map(Duration::from_millis)
    }

    pub fn redis_options(&self) -> RedisOptions {
        RedisOptions {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            database: self.database,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_fills_in_defaults() {
        let config = ServerLoadConfig::from_yaml_str("pool_type: SOCKET\n").unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert_eq!(config.namespace, "SLM");
        assert_eq!(config.refresh_interval(), None);
        assert_eq!(config.keyspace().snapshot_key(), "SLM:SOCKET:DATA");
    }

    #[test]
    fn yaml_overrides() {
        let yaml = r#"
host: redis.internal
port: 6380
namespace: staging
pool_type: WORKER
refresh_interval_ms: 1500
database: 2
"#;
        let config = ServerLoadConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.redis_options().host, "redis.internal");
        assert_eq!(config.redis_options().port, 6380);
        assert_eq!(config.redis_options().database, Some(2));
        assert_eq!(config.refresh_interval(), Some(Duration::from_millis(1500)));
        assert_eq!(config.keyspace().membership_key(), "staging:WORKER:SET");
    }

    #[test]
    fn missing_or_blank_type_is_rejected() {
        assert!(matches!(
            ServerLoadConfig::from_yaml_str("host: localhost\n"),
            Err(ConfigError::MissingType)
        ));
        assert!(matches!(
            ServerLoadConfig::new("  ").validate(),
            Err(ConfigError::MissingType)
        ));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            ServerLoadConfig::from_yaml_str("port: [not, a, port]\npool_type: X\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
