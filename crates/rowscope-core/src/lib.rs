// Configuration types shared across rowscope crates
pub mod config;

// Re-export commonly used config types for convenience
pub use config::{ConfigError, ScopeConfig, TableScopeConfig};
