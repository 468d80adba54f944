//! Statement rewriting.
//!
//! The processor walks a parsed statement bottom-up and mutates it in place:
//! nested statements are rewritten first, join ON clauses next, and the
//! WHERE-level predicate is committed last, so an error anywhere aborts the
//! call before the top-level clause changes.
//!
//! The active scope frame travels as an explicit [`ScopeContext`] value
//! created at dispatch entry and threaded through the whole recursion.
//! Nested statements never receive an independent scope list; they always
//! inherit the enclosing call's frame.

mod inject;
mod joins;
mod scan;

use std::sync::Arc;

use sqlparser::ast::{
    Delete, FromTable, ObjectName, ObjectNamePart, Query, Select, SelectItem, SetExpr, Statement,
    TableAlias, TableFactor, TableWithJoins, Update,
};

use crate::error::ScopeError;
use crate::rules::ScopeRule;

/// Rewrites parsed statements so that every scoped table carries its filter
/// predicate.
///
/// The processor holds no state of its own; one instance may be shared
/// freely across concurrent callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeProcessor;

/// Outcome of rewriting a single statement.
#[derive(Debug, Clone, Default)]
pub struct RewriteReport {
    /// Tables that received an injected predicate, in injection order.
    pub tables_scoped: Vec<String>,
}

/// Per-call rewrite state: the active scope frame plus bookkeeping.
pub(crate) struct ScopeContext<'a> {
    rules: &'a [Arc<dyn ScopeRule>],
    scoped_tables: Vec<String>,
}

impl<'a> ScopeContext<'a> {
    fn new(rules: &'a [Arc<dyn ScopeRule>]) -> Self {
        Self {
            rules,
            scoped_tables: Vec::new(),
        }
    }

    pub(crate) fn rules(&self) -> &[Arc<dyn ScopeRule>] {
        self.rules
    }

    pub(crate) fn record_scoped(&mut self, table: &str) {
        if !self.scoped_tables.iter().any(|t| t == table) {
            self.scoped_tables.push(table.to_string());
        }
    }
}

/// A physical table reference surviving FROM/JOIN resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableRef {
    /// Full table name as written, possibly schema-qualified.
    pub(crate) name: String,
    /// Bare name with any qualification stripped.
    pub(crate) bare: String,
    /// Table alias, if present.
    pub(crate) alias: Option<String>,
}

impl TableRef {
    pub(crate) fn from_parts(name: &ObjectName, alias: Option<&TableAlias>) -> Self {
        let bare = name
            .0
            .last()
            .map(|part| match part {
                ObjectNamePart::Identifier(ident) => ident.value.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            bare,
            alias: alias.map(|a| a.name.value.clone()),
        }
    }
}

impl ScopeProcessor {
    /// Create a new processor.
    pub fn new() -> Self {
        Self
    }

    /// Rewrite one statement under the given active scope rules.
    ///
    /// An empty rule list is a no-op. INSERT statements and statement kinds
    /// other than SELECT/UPDATE/DELETE pass through unchanged.
    pub fn process_statement(
        &self,
        statement: &mut Statement,
        rules: &[Arc<dyn ScopeRule>],
    ) -> Result<RewriteReport, ScopeError> {
        if rules.is_empty() {
            return Ok(RewriteReport::default());
        }
        let mut ctx = ScopeContext::new(rules);
        match statement {
            Statement::Query(query) => self.process_query(query, &mut ctx)?,
            Statement::Insert(_) => {
                tracing::debug!("INSERT statements are not scope-filtered");
            }
            Statement::Update(update) => self.process_update(update, &mut ctx)?,
            Statement::Delete(delete) => self.process_delete(delete, &mut ctx)?,
            other => {
                tracing::debug!(statement = %other, "statement kind is not scope-filtered");
            }
        }
        Ok(RewriteReport {
            tables_scoped: ctx.scoped_tables,
        })
    }

    /// Rewrite a query: CTE bodies first, then the select body.
    pub(crate) fn process_query(
        &self,
        query: &mut Query,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        if let Some(with) = query.with.as_mut() {
            for cte in &mut with.cte_tables {
                self.process_query(&mut cte.query, ctx)?;
            }
        }
        self.process_set_expr(&mut query.body, ctx)
    }

    fn process_set_expr(
        &self,
        body: &mut SetExpr,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        match body {
            SetExpr::Select(select) => self.process_select(select, ctx),
            SetExpr::Query(inner) => self.process_query(inner, ctx),
            // Every member of a set operation is rewritten as if it were its
            // own top-level select, under the same frame.
            SetExpr::SetOperation { left, right, .. } => {
                self.process_set_expr(left, ctx)?;
                self.process_set_expr(right, ctx)
            }
            _ => Ok(()),
        }
    }

    fn process_select(
        &self,
        select: &mut Select,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        for item in &mut select.projection {
            if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item {
                self.scan_select_expr(expr, ctx)?;
            }
        }

        // Rewrite sub-selects embedded in the WHERE clause. This pass never
        // touches the outer WHERE itself.
        if let Some(selection) = select.selection.as_mut() {
            self.scan_expression(selection, ctx)?;
        }

        // Comma-separated FROM items each contribute their surviving tables
        // to the single WHERE-level injection below.
        let mut main_tables = Vec::new();
        for table_with_joins in &mut select.from {
            let TableWithJoins { relation, joins } = table_with_joins;
            let tables = self.resolve_from_item(relation, ctx)?;
            if joins.is_empty() {
                main_tables.extend(tables);
            } else {
                main_tables.extend(self.process_joins(tables, joins, ctx)?);
            }
        }

        if !main_tables.is_empty() {
            if let Some(filter) = self.build_scope_filter(&main_tables, ctx)? {
                let existing = select.selection.take();
                select.selection = Some(inject::merge_filter(existing, filter));
            }
        }
        Ok(())
    }

    /// Resolve a FROM item to the physical tables it contributes.
    ///
    /// Derived tables are rewritten recursively and contribute nothing;
    /// unsupported shapes are skipped and logged.
    pub(crate) fn resolve_from_item(
        &self,
        relation: &mut TableFactor,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<Vec<TableRef>, ScopeError> {
        match relation {
            TableFactor::Table { name, alias, .. } => {
                Ok(vec![TableRef::from_parts(name, alias.as_ref())])
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.process_join_group(table_with_joins, ctx),
            TableFactor::Derived { subquery, .. } => {
                self.process_query(subquery, ctx)?;
                Ok(Vec::new())
            }
            other => {
                tracing::warn!(from_item = %other, "unsupported FROM item, scope filter skipped");
                Ok(Vec::new())
            }
        }
    }

    fn process_update(
        &self,
        update: &mut Update,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        let target = match &update.table.relation {
            TableFactor::Table { name, alias, .. } => TableRef::from_parts(name, alias.as_ref()),
            other => {
                tracing::warn!(target = %other, "unsupported UPDATE target, scope filter skipped");
                return Ok(());
            }
        };
        if let Some(filter) = self.build_scope_filter(std::slice::from_ref(&target), ctx)? {
            let existing = update.selection.take();
            update.selection = Some(inject::merge_filter(existing, filter));
        }
        Ok(())
    }

    fn process_delete(
        &self,
        delete: &mut Delete,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        let tables = match &delete.from {
            FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
        };
        let targets: Vec<TableRef> = tables
            .iter()
            .filter_map(|table_with_joins| match &table_with_joins.relation {
                TableFactor::Table { name, alias, .. } => {
                    Some(TableRef::from_parts(name, alias.as_ref()))
                }
                _ => None,
            })
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        if let Some(filter) = self.build_scope_filter(&targets, ctx)? {
            let existing = delete.selection.take();
            delete.selection = Some(inject::merge_filter(existing, filter));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlAnalyzer;
    use crate::rules::{ScopeRule, SqlPredicateScope};
    use pretty_assertions::assert_eq;

    fn tenant_rule(tables: &[&str]) -> Arc<dyn ScopeRule> {
        Arc::new(SqlPredicateScope::new(
            "tenant",
            tables.iter().copied(),
            "{qualifier}.tenant_id = 5",
        ))
    }

    fn rewrite(sql: &str, rules: &[Arc<dyn ScopeRule>]) -> String {
        let mut statements = SqlAnalyzer::new().parse(sql).unwrap();
        let processor = ScopeProcessor::new();
        for statement in &mut statements {
            processor.process_statement(statement, rules).unwrap();
        }
        statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[test]
    fn test_select_without_where() {
        let out = rewrite("SELECT * FROM t", &[tenant_rule(&["t"])]);
        assert_eq!(out, "SELECT * FROM t WHERE t.tenant_id = 5");
    }

    #[test]
    fn test_existing_where_is_anded() {
        let out = rewrite("SELECT * FROM t WHERE a = 1", &[tenant_rule(&["t"])]);
        assert_eq!(out, "SELECT * FROM t WHERE a = 1 AND t.tenant_id = 5");
    }

    #[test]
    fn test_top_level_or_is_parenthesized() {
        let out = rewrite("SELECT * FROM t WHERE a = 1 OR b = 2", &[tenant_rule(&["t"])]);
        assert_eq!(
            out,
            "SELECT * FROM t WHERE (a = 1 OR b = 2) AND t.tenant_id = 5"
        );
    }

    #[test]
    fn test_alias_is_used_as_qualifier() {
        let out = rewrite("SELECT * FROM t AS o", &[tenant_rule(&["t"])]);
        assert_eq!(out, "SELECT * FROM t AS o WHERE o.tenant_id = 5");
    }

    #[test]
    fn test_unscoped_table_untouched() {
        let out = rewrite("SELECT * FROM other", &[tenant_rule(&["t"])]);
        assert_eq!(out, "SELECT * FROM other");
    }

    #[test]
    fn test_comma_join_combines_in_where() {
        let out = rewrite("SELECT * FROM a, b", &[tenant_rule(&["a", "b"])]);
        assert_eq!(
            out,
            "SELECT * FROM a, b WHERE a.tenant_id = 5 AND b.tenant_id = 5"
        );
    }

    #[test]
    fn test_update_where_is_extended() {
        let out = rewrite("UPDATE t SET x = 1 WHERE y = 2", &[tenant_rule(&["t"])]);
        assert_eq!(out, "UPDATE t SET x = 1 WHERE y = 2 AND t.tenant_id = 5");
    }

    #[test]
    fn test_delete_without_where() {
        let out = rewrite("DELETE FROM t", &[tenant_rule(&["t"])]);
        assert_eq!(out, "DELETE FROM t WHERE t.tenant_id = 5");
    }

    #[test]
    fn test_insert_passes_through() {
        let out = rewrite("INSERT INTO t (a) VALUES (1)", &[tenant_rule(&["t"])]);
        assert_eq!(out, "INSERT INTO t (a) VALUES (1)");
    }

    #[test]
    fn test_union_branches_are_independent() {
        let out = rewrite(
            "SELECT * FROM t UNION SELECT * FROM t",
            &[tenant_rule(&["t"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM t WHERE t.tenant_id = 5 UNION SELECT * FROM t WHERE t.tenant_id = 5"
        );
    }

    #[test]
    fn test_cte_body_is_rewritten() {
        let out = rewrite(
            "WITH c AS (SELECT * FROM t) SELECT * FROM c",
            &[tenant_rule(&["t"])],
        );
        assert_eq!(
            out,
            "WITH c AS (SELECT * FROM t WHERE t.tenant_id = 5) SELECT * FROM c"
        );
    }

    #[test]
    fn test_derived_table_is_rewritten_inside() {
        let out = rewrite(
            "SELECT * FROM (SELECT * FROM t) AS d",
            &[tenant_rule(&["t"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM (SELECT * FROM t WHERE t.tenant_id = 5) AS d"
        );
    }

    #[test]
    fn test_two_rules_are_and_combined() {
        let rules: Vec<Arc<dyn ScopeRule>> = vec![
            tenant_rule(&["t"]),
            Arc::new(SqlPredicateScope::new(
                "owner",
                ["t"],
                "{qualifier}.owner_id = 7",
            )),
        ];
        let out = rewrite("SELECT * FROM t", &rules);
        assert_eq!(
            out,
            "SELECT * FROM t WHERE t.tenant_id = 5 AND t.owner_id = 7"
        );
    }

    #[test]
    fn test_rewrite_is_not_idempotent() {
        let rules = [tenant_rule(&["t"])];
        let once = rewrite("SELECT * FROM t", &rules);
        let twice = rewrite(&once, &rules);
        assert_ne!(once, twice);
        assert_eq!(
            twice,
            "SELECT * FROM t WHERE t.tenant_id = 5 AND t.tenant_id = 5"
        );
    }

    #[test]
    fn test_empty_rule_list_is_noop() {
        let mut statements = SqlAnalyzer::new().parse("SELECT * FROM t").unwrap();
        let report = ScopeProcessor::new()
            .process_statement(&mut statements[0], &[])
            .unwrap();
        assert!(report.tables_scoped.is_empty());
        assert_eq!(statements[0].to_string(), "SELECT * FROM t");
    }

    #[test]
    fn test_report_lists_scoped_tables() {
        let mut statements = SqlAnalyzer::new().parse("SELECT * FROM a, b").unwrap();
        let report = ScopeProcessor::new()
            .process_statement(&mut statements[0], &[tenant_rule(&["a", "b"])])
            .unwrap();
        assert_eq!(report.tables_scoped, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_malformed_rule_aborts_call() {
        let rules: Vec<Arc<dyn ScopeRule>> = vec![Arc::new(SqlPredicateScope::new(
            "broken",
            ["t"],
            "{qualifier}.tenant_id = = 5",
        ))];
        let mut statements = SqlAnalyzer::new().parse("SELECT * FROM t").unwrap();
        let result = ScopeProcessor::new().process_statement(&mut statements[0], &rules);
        assert!(matches!(result, Err(ScopeError::MalformedRule { .. })));
        // The statement's WHERE clause was never committed.
        assert_eq!(statements[0].to_string(), "SELECT * FROM t");
    }

    #[test]
    fn test_schema_qualified_name_matches_bare_rule() {
        let out = rewrite("SELECT * FROM public.t", &[tenant_rule(&["t"])]);
        // The predicate qualifies by the bare name, the way the table is
        // addressable inside the statement.
        assert_eq!(out, "SELECT * FROM public.t WHERE t.tenant_id = 5");
    }
}
