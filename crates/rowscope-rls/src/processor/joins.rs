//! FROM/JOIN chain resolution.
//!
//! Walks a join list left to right and decides, per join, whether the scope
//! filter belongs in the ON clause or in the statement's WHERE clause. The
//! distinction is load-bearing for outer joins: filtering the preserved side
//! anywhere but after the join drops its NULL-padded rows and silently turns
//! the outer join into an inner join.

use sqlparser::ast::{Join, JoinConstraint, JoinOperator, TableFactor, TableWithJoins};

use super::inject;
use super::{ScopeContext, ScopeProcessor, TableRef};
use crate::error::ScopeError;

/// Join classification relevant to filter placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    /// ON and WHERE filtering are interchangeable; fold both sides into ON.
    Inner,
    /// The right side is preserved: it moves to the WHERE-level set, and only
    /// the left side may be filtered, in ON.
    Right,
    /// Left outer and everything else: filter the right side in ON only.
    Other,
}

fn classify(op: &JoinOperator) -> JoinKind {
    match op {
        JoinOperator::Join(_) | JoinOperator::Inner(_) => JoinKind::Inner,
        JoinOperator::Right(_) | JoinOperator::RightOuter(_) => JoinKind::Right,
        _ => JoinKind::Other,
    }
}

fn constraint_mut(op: &mut JoinOperator) -> Option<&mut JoinConstraint> {
    match op {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::CrossJoin(c)
        | JoinOperator::Semi(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::Anti(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c)
        | JoinOperator::StraightJoin(c) => Some(c),
        _ => None,
    }
}

impl ScopeProcessor {
    /// Walk `joins`, injecting ON-level filters in place, and return the
    /// tables that still need WHERE-level filtering.
    ///
    /// `main_tables` carries the tables contributed by the FROM item to the
    /// left of the chain.
    pub(crate) fn process_joins(
        &self,
        mut main_tables: Vec<TableRef>,
        joins: &mut [Join],
        ctx: &mut ScopeContext<'_>,
    ) -> Result<Vec<TableRef>, ScopeError> {
        // The table requiring WHERE-level filtering once the chain settles.
        let mut main_table: Option<TableRef> = None;
        // The physical table immediately to the left of the current join.
        let mut left_table: Option<TableRef> = None;
        if let [only] = main_tables.as_slice() {
            main_table = Some(only.clone());
            left_table = Some(only.clone());
        }

        for join in joins.iter_mut() {
            let join_tables = match &mut join.relation {
                TableFactor::Table { name, alias, .. } => {
                    Some(vec![TableRef::from_parts(name, alias.as_ref())])
                }
                TableFactor::NestedJoin {
                    table_with_joins, ..
                } => Some(self.process_join_group(table_with_joins, ctx)?),
                TableFactor::Derived { subquery, .. } => {
                    self.process_query(subquery, ctx)?;
                    None
                }
                other => {
                    tracing::warn!(join_item = %other, "unsupported JOIN item, scope filter skipped");
                    None
                }
            };

            // No physical table on the right side: nothing to target, and the
            // next join can no longer rely on a known left table.
            let Some(join_tables) = join_tables else {
                left_table = None;
                continue;
            };

            if matches!(join.join_operator, JoinOperator::CrossJoin(_)) {
                // Cartesian product: there is no ON clause to carry a filter,
                // and WHERE-level filtering is equivalent.
                left_table = join_tables.first().cloned();
                main_tables.extend(join_tables);
                continue;
            }

            let Some(join_table) = join_tables.first().cloned() else {
                left_table = None;
                continue;
            };

            let kind = classify(&join.join_operator);
            let on_targets: Vec<TableRef> = match kind {
                JoinKind::Right => {
                    main_table = Some(join_table.clone());
                    main_tables.clear();
                    left_table.iter().cloned().collect()
                }
                JoinKind::Inner => {
                    let targets = match main_table.take() {
                        Some(current) => vec![current, join_table.clone()],
                        None => vec![join_table.clone()],
                    };
                    main_tables.clear();
                    targets
                }
                JoinKind::Other => vec![join_table.clone()],
            };

            if let Some(current) = &main_table {
                if !main_tables.contains(current) {
                    main_tables.push(current.clone());
                }
            }

            let mut advanced = Some(join_table);
            match constraint_mut(&mut join.join_operator) {
                Some(JoinConstraint::On(on_expr)) => {
                    if !on_targets.is_empty() {
                        if let Some(filter) = self.build_scope_filter(&on_targets, ctx)? {
                            inject::merge_filter_into(on_expr, filter);
                        }
                    }
                    if let Some(current) = &main_table {
                        advanced = Some(current.clone());
                    }
                }
                _ if kind == JoinKind::Inner => {
                    // No ON clause to carry the filter; for an inner join the
                    // WHERE clause filters identically.
                    main_tables.extend(on_targets);
                }
                _ => {
                    for target in &on_targets {
                        if ctx.rules().iter().any(|rule| rule.includes(&target.bare)) {
                            tracing::warn!(
                                table = %target.name,
                                "outer join without ON clause, scope filter skipped"
                            );
                        }
                    }
                }
            }
            left_table = advanced;
        }

        Ok(main_tables)
    }

    /// Resolve a parenthesized join group, returning the tables it
    /// contributes to the enclosing statement's WHERE-level set.
    pub(crate) fn process_join_group(
        &self,
        group: &mut TableWithJoins,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<Vec<TableRef>, ScopeError> {
        // Unwrap redundant nesting like ((a JOIN b ON ..)).
        if group.joins.is_empty() {
            if let TableFactor::NestedJoin {
                table_with_joins, ..
            } = &mut group.relation
            {
                return self.process_join_group(table_with_joins, ctx);
            }
            return self.resolve_from_item(&mut group.relation, ctx);
        }
        let TableWithJoins { relation, joins } = group;
        let tables = self.resolve_from_item(relation, ctx)?;
        self.process_joins(tables, joins, ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

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
        for statement in &mut statements {
            ScopeProcessor::new()
                .process_statement(statement, rules)
                .unwrap();
        }
        statements[0].to_string()
    }

    #[test]
    fn test_left_join_filters_right_side_in_on() {
        let out = rewrite(
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id",
            &[tenant_rule(&["b"])],
        );
        // WHERE stays untouched: rows of a without a matching b row survive.
        assert_eq!(
            out,
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id AND b.tenant_id = 5"
        );
    }

    #[test]
    fn test_left_join_filters_preserved_side_in_where() {
        let out = rewrite(
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id",
            &[tenant_rule(&["a"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id WHERE a.tenant_id = 5"
        );
    }

    #[test]
    fn test_right_join_filters_left_side_in_on() {
        let out = rewrite(
            "SELECT * FROM a RIGHT JOIN b ON a.id = b.a_id",
            &[tenant_rule(&["a"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a RIGHT JOIN b ON a.id = b.a_id AND a.tenant_id = 5"
        );
    }

    #[test]
    fn test_right_join_moves_right_side_to_where() {
        let out = rewrite(
            "SELECT * FROM a RIGHT JOIN b ON a.id = b.a_id",
            &[tenant_rule(&["a", "b"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a RIGHT JOIN b ON a.id = b.a_id AND a.tenant_id = 5 WHERE b.tenant_id = 5"
        );
    }

    #[test]
    fn test_inner_join_folds_both_sides_into_on() {
        let out = rewrite(
            "SELECT * FROM a JOIN b ON a.id = b.a_id",
            &[tenant_rule(&["a", "b"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a JOIN b ON a.id = b.a_id AND a.tenant_id = 5 AND b.tenant_id = 5"
        );
    }

    #[test]
    fn test_inner_join_spelled_out() {
        let out = rewrite(
            "SELECT * FROM a INNER JOIN b ON a.id = b.a_id",
            &[tenant_rule(&["b"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a INNER JOIN b ON a.id = b.a_id AND b.tenant_id = 5"
        );
    }

    #[test]
    fn test_cross_join_filters_in_where() {
        let out = rewrite(
            "SELECT * FROM a CROSS JOIN b",
            &[tenant_rule(&["a", "b"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a CROSS JOIN b WHERE a.tenant_id = 5 AND b.tenant_id = 5"
        );
    }

    #[test]
    fn test_join_aliases_qualify_predicates() {
        let out = rewrite(
            "SELECT * FROM orders AS o LEFT JOIN users AS u ON o.user_id = u.id",
            &[tenant_rule(&["orders", "users"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM orders AS o LEFT JOIN users AS u ON o.user_id = u.id AND u.tenant_id = 5 WHERE o.tenant_id = 5"
        );
    }

    #[test]
    fn test_nested_join_group() {
        let out = rewrite(
            "SELECT * FROM a LEFT JOIN (b JOIN c ON b.id = c.b_id) ON a.id = b.a_id",
            &[tenant_rule(&["b", "c"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a LEFT JOIN (b JOIN c ON b.id = c.b_id AND b.tenant_id = 5 AND c.tenant_id = 5) ON a.id = b.a_id"
        );
    }

    #[test]
    fn test_derived_right_side_is_rewritten_not_targeted() {
        let out = rewrite(
            "SELECT * FROM a LEFT JOIN (SELECT * FROM b) AS d ON a.id = d.a_id",
            &[tenant_rule(&["a", "b"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a LEFT JOIN (SELECT * FROM b WHERE b.tenant_id = 5) AS d ON a.id = d.a_id WHERE a.tenant_id = 5"
        );
    }

    #[test]
    fn test_chained_left_joins_accumulate_where() {
        let out = rewrite(
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id LEFT JOIN c ON a.id = c.a_id",
            &[tenant_rule(&["a", "b", "c"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id AND b.tenant_id = 5 \
             LEFT JOIN c ON a.id = c.a_id AND c.tenant_id = 5 WHERE a.tenant_id = 5"
        );
    }

    #[test]
    fn test_inner_then_left_join() {
        // The inner join folds a and b into its ON clause; only c's preserved
        // counterpart remains for WHERE, and there is none.
        let out = rewrite(
            "SELECT * FROM a JOIN b ON a.id = b.a_id LEFT JOIN c ON b.id = c.b_id",
            &[tenant_rule(&["a", "b", "c"])],
        );
        assert_eq!(
            out,
            "SELECT * FROM a JOIN b ON a.id = b.a_id AND a.tenant_id = 5 AND b.tenant_id = 5 \
             LEFT JOIN c ON b.id = c.b_id AND c.tenant_id = 5"
        );
    }
}
