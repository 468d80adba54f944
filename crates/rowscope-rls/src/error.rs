//! Error types for the scope-injection crate.

use thiserror::Error;

/// Errors that can occur during scope injection.
///
/// Unsupported AST shapes are deliberately not represented here: they skip
/// injection for the affected construct only and are logged, never raised.
/// A defective scope rule, on the other hand, always aborts the whole call,
/// because silently producing an under-filtered query would look "safe"
/// while leaking rows.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// SQL parsing failed.
    #[error("failed to parse SQL: {0}")]
    ParseError(String),

    /// DDL statement is not allowed through a scoped boundary.
    #[error("DDL statement not allowed: {statement}")]
    DdlNotAllowed { statement: String },

    /// A scope rule produced a predicate that does not parse.
    #[error("scope rule {rule} produced a malformed predicate: {reason}")]
    MalformedRule { rule: String, reason: String },

    /// A scope rule was asked for a predicate but has no value to filter by.
    #[error("scope rule {rule} has no value for this call")]
    MissingScopeValue { rule: String },

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
