//! Configuration types for rowscope.
//!
//! Scope configuration can be loaded from YAML files (typically
//! `scope.yaml`) and describes how row-level scoping is structured in the
//! database: which column carries the scope value per table, and which
//! tables are global (never scoped).

pub mod scope;

pub use scope::{ScopeConfig, TableScopeConfig};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
