//! Scope configuration for row-level filtering.
//!
//! This module defines the database-level structure of a scope: the column
//! that carries the scope value in each table, per-table overrides, and the
//! tables that are global (never filtered).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::ConfigError;

/// Configuration for one row scope.
///
/// This defines where a scope's filter column lives per table, separate from
/// how the scope value is obtained at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Registry key this scope is activated under.
    #[serde(default = "default_scope_key")]
    pub key: String,

    /// Default column name for scope filtering.
    /// Used when not overridden per-table.
    #[serde(default = "default_scope_column")]
    pub default_column: String,

    /// Per-table scope column configuration.
    #[serde(default)]
    pub tables: HashMap<String, TableScopeConfig>,

    /// Tables that are global (no scope filtering applied).
    #[serde(default)]
    pub global_tables: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            key: default_scope_key(),
            default_column: default_scope_column(),
            tables: HashMap::new(),
            global_tables: Vec::new(),
        }
    }
}

/// Per-table scope configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableScopeConfig {
    /// The column name used for scope filtering in this table.
    #[serde(default)]
    pub column: Option<String>,

    /// Whether this is a global table (no scope filtering).
    #[serde(default)]
    pub global: bool,
}

impl ScopeConfig {
    /// Load scope configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse scope configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Get the scope column for a given table.
    ///
    /// Returns the column name to use when filtering this table, or `None`
    /// if the table is global (no scope filtering).
    pub fn scope_column(&self, table_name: &str) -> Option<&str> {
        if self.global_tables.iter().any(|t| t == table_name) {
            return None;
        }

        if let Some(table_config) = self.tables.get(table_name) {
            if table_config.global {
                return None;
            }

            if let Some(col) = table_config.column.as_deref() {
                return Some(col);
            }
        }

        Some(&self.default_column)
    }

    /// Check if a table is global (no scope filtering).
    pub fn is_global_table(&self, table_name: &str) -> bool {
        if self.global_tables.iter().any(|t| t == table_name) {
            return true;
        }

        if let Some(table_config) = self.tables.get(table_name) {
            return table_config.global;
        }

        false
    }
}

// Default value functions
fn default_scope_key() -> String {
    "tenant".to_string()
}

fn default_scope_column() -> String {
    "tenant_id".to_string()
}
