//! Scope rules.
//!
//! A scope rule decides which tables it filters and builds the boolean
//! predicate for one concrete table reference. Rules are registered once at
//! process start and shared immutably across calls; anything that varies per
//! request (such as the current tenant) is obtained through a value provider
//! at predicate-build time.

use std::sync::Arc;

use sqlparser::ast::{BinaryOperator, Expr, Ident, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use rowscope_core::ScopeConfig;

use crate::error::ScopeError;

/// A named row-visibility rule.
///
/// `includes` decides whether a table is subject to the rule at all;
/// `predicate` builds the filter for one table reference, or declines with
/// `Ok(None)`. Returning an error aborts the entire rewrite: a broken rule
/// must surface loudly rather than produce an under-filtered query.
pub trait ScopeRule: Send + Sync {
    /// Unique identifier, used by activation.
    fn key(&self) -> &str;

    /// Whether rows of `table` are filtered by this rule.
    fn includes(&self, table: &str) -> bool;

    /// The filter predicate for `table`, qualified by `alias` when present.
    fn predicate(&self, table: &str, alias: Option<&str>) -> Result<Option<Expr>, ScopeError>;
}

/// A literal value rendered into scope predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeValue {
    /// Quoted string literal (also used for UUIDs).
    Text(String),
    /// Numeric literal.
    Integer(i64),
}

impl ScopeValue {
    fn to_sql_value(&self) -> Value {
        match self {
            ScopeValue::Text(text) => Value::SingleQuotedString(text.clone()),
            ScopeValue::Integer(number) => Value::Number(number.to_string(), false),
        }
    }
}

type ValueProvider = dyn Fn() -> Option<ScopeValue> + Send + Sync;

/// Config-driven tenant isolation rule.
///
/// Filters every non-global table to `qualifier.column = value`, where the
/// column comes from [`ScopeConfig`] and the value from a per-call provider
/// (typically backed by request authentication). System catalog tables are
/// never filtered; schema introspection must keep working unmodified.
pub struct TenantScope {
    config: ScopeConfig,
    value: Arc<ValueProvider>,
}

impl TenantScope {
    /// Create a tenant scope over `config` with a per-call value provider.
    pub fn new(
        config: ScopeConfig,
        value: impl Fn() -> Option<ScopeValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            value: Arc::new(value),
        }
    }

    /// Convenience constructor for a fixed tenant value.
    pub fn with_value(config: ScopeConfig, value: ScopeValue) -> Self {
        Self::new(config, move || Some(value.clone()))
    }
}

impl ScopeRule for TenantScope {
    fn key(&self) -> &str {
        &self.config.key
    }

    fn includes(&self, table: &str) -> bool {
        !is_system_catalog_table(table) && self.config.scope_column(table).is_some()
    }

    fn predicate(&self, table: &str, alias: Option<&str>) -> Result<Option<Expr>, ScopeError> {
        if is_system_catalog_table(table) {
            return Ok(None);
        }
        let Some(column) = self.config.scope_column(table) else {
            return Ok(None);
        };
        let value = (self.value)().ok_or_else(|| ScopeError::MissingScopeValue {
            rule: self.config.key.clone(),
        })?;
        let qualifier = alias.unwrap_or(table);
        Ok(Some(Expr::BinaryOp {
            left: Box::new(Expr::CompoundIdentifier(vec![
                Ident::new(qualifier),
                Ident::new(column),
            ])),
            op: BinaryOperator::Eq,
            right: Box::new(Expr::Value(value.to_sql_value().into())),
        }))
    }
}

/// Rule backed by a raw SQL predicate template.
///
/// The template may reference `{table}` (the bare table name) and
/// `{qualifier}` (the alias when present, the table name otherwise). The
/// rendered predicate is parsed on every injection; a template that does not
/// parse aborts the rewrite with [`ScopeError::MalformedRule`].
pub struct SqlPredicateScope {
    key: String,
    tables: Vec<String>,
    template: String,
}

impl SqlPredicateScope {
    /// Create a template rule applying to an explicit table list.
    pub fn new(
        key: impl Into<String>,
        tables: impl IntoIterator<Item = impl Into<String>>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            tables: tables.into_iter().map(Into::into).collect(),
            template: template.into(),
        }
    }
}

impl ScopeRule for SqlPredicateScope {
    fn key(&self) -> &str {
        &self.key
    }

    fn includes(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    fn predicate(&self, table: &str, alias: Option<&str>) -> Result<Option<Expr>, ScopeError> {
        if !self.includes(table) {
            return Ok(None);
        }
        let qualifier = alias.unwrap_or(table);
        let rendered = self
            .template
            .replace("{table}", table)
            .replace("{qualifier}", qualifier);
        let expr = Parser::new(&PostgreSqlDialect {})
            .try_with_sql(&rendered)
            .and_then(|mut parser| parser.parse_expr())
            .map_err(|e| ScopeError::MalformedRule {
                rule: self.key.clone(),
                reason: e.to_string(),
            })?;
        Ok(Some(expr))
    }
}

/// Check if a table is a system catalog table that must not be scope-filtered.
///
/// Common system catalogs include pg_class, pg_namespace, pg_type,
/// pg_attribute, pg_proc, pg_tables, pg_index, pg_constraint, etc.
fn is_system_catalog_table(table_name: &str) -> bool {
    let table_lower = table_name.to_lowercase();

    if table_lower.starts_with("information_schema.") {
        return true;
    }

    table_lower.starts_with("pg_")
}
