//! SQL parsing and statement classification.

use crate::error::ScopeError;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Parses SQL text into statements with the crate's dialect.
pub struct SqlAnalyzer {
    dialect: PostgreSqlDialect,
}

impl Clone for SqlAnalyzer {
    fn clone(&self) -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlAnalyzer {
    /// Create a new SQL analyzer.
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Parse a SQL string into statements.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, ScopeError> {
        Parser::parse_sql(&self.dialect, sql).map_err(|e| ScopeError::ParseError(e.to_string()))
    }

    /// Check if a statement is a DDL statement.
    pub fn is_ddl(&self, stmt: &Statement) -> bool {
        matches!(
            stmt,
            Statement::CreateTable { .. }
                | Statement::AlterTable { .. }
                | Statement::Drop { .. }
                | Statement::Truncate { .. }
                | Statement::CreateIndex { .. }
                | Statement::CreateView { .. }
        )
    }
}
