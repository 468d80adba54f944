//! Scope predicate injection at the SQL text boundary.

use crate::error::ScopeError;
use crate::parser::SqlAnalyzer;
use crate::processor::ScopeProcessor;
use crate::registry::ScopeActivation;

/// Injects row-scope predicates into SQL statements.
///
/// This is the text-level boundary: SQL in, rewritten SQL out. The AST-level
/// engine behind it is [`ScopeProcessor`].
#[derive(Clone, Default)]
pub struct ScopeInjector {
    analyzer: SqlAnalyzer,
    processor: ScopeProcessor,
}

impl ScopeInjector {
    /// Create a new injector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `sql` under the given scope selection.
    ///
    /// The activation is consumed: rewriting and clearing the selection are
    /// a single step, so a selection cannot carry over to a later call. An
    /// empty selection or empty input passes through unchanged.
    pub fn inject(
        &self,
        sql: &str,
        scopes: ScopeActivation,
    ) -> Result<InjectionResult, ScopeError> {
        let mut statements = self.analyzer.parse(sql)?;

        if statements.is_empty() || scopes.is_empty() {
            return Ok(InjectionResult {
                original_sql: sql.to_string(),
                rewritten_sql: sql.to_string(),
                tables_scoped: vec![],
            });
        }

        // Never let DDL through a scoped boundary; it cannot be row-filtered.
        for statement in &statements {
            if self.analyzer.is_ddl(statement) {
                return Err(ScopeError::DdlNotAllowed {
                    statement: sql.to_string(),
                });
            }
        }

        let rules = scopes.into_rules();
        let mut tables_scoped = Vec::new();
        for statement in &mut statements {
            let report = self.processor.process_statement(statement, &rules)?;
            for table in report.tables_scoped {
                if !tables_scoped.contains(&table) {
                    tables_scoped.push(table);
                }
            }
        }

        let rewritten_sql = statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");

        Ok(InjectionResult {
            original_sql: sql.to_string(),
            rewritten_sql,
            tables_scoped,
        })
    }
}

/// Result of scope injection.
#[derive(Debug, Clone)]
pub struct InjectionResult {
    /// The original SQL statement.
    pub original_sql: String,
    /// The rewritten SQL with scope predicates.
    pub rewritten_sql: String,
    /// Tables that received an injected predicate.
    pub tables_scoped: Vec<String>,
}
