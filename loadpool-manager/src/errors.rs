use loadpool_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManagerError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing pool type: every pool member needs a non-empty type tag")]
    MissingType,

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Shared store error: {0}")]
    Store(#[from] StoreError),

    #[error("Load source error: {0}")]
    Source(String),

    #[error("Load source returned no entry for members: {missing:?}")]
    IncompleteSnapshot { missing: Vec<String> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
