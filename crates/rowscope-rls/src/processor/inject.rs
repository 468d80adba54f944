//! Predicate injection.
//!
//! Builds the combined scope filter for a set of tables and merges it into
//! an existing boolean expression without disturbing operator precedence.

use sqlparser::ast::{BinaryOperator, Expr, Value};

use super::{ScopeContext, ScopeProcessor, TableRef};
use crate::error::ScopeError;

impl ScopeProcessor {
    /// Build the AND-combined filter for `tables` from the active scope
    /// frame.
    ///
    /// Per table, every active rule whose `includes` matches contributes its
    /// predicate, AND-combined in rule order; the per-table filters are then
    /// AND-combined in table order. A table no rule filters contributes
    /// nothing; returns `None` when nothing contributes.
    pub(crate) fn build_scope_filter(
        &self,
        tables: &[TableRef],
        ctx: &mut ScopeContext<'_>,
    ) -> Result<Option<Expr>, ScopeError> {
        let mut filters: Vec<Expr> = Vec::with_capacity(tables.len());
        for table in tables {
            let mut combined: Option<Expr> = None;
            for rule in ctx.rules() {
                if !rule.includes(&table.bare) {
                    continue;
                }
                let Some(predicate) = rule.predicate(&table.bare, table.alias.as_deref())? else {
                    continue;
                };
                combined = Some(match combined {
                    Some(acc) => and(acc, predicate),
                    None => predicate,
                });
            }
            if let Some(filter) = combined {
                ctx.record_scoped(&table.bare);
                filters.push(filter);
            }
        }
        Ok(filters.into_iter().reduce(and))
    }
}

/// Merge `filter` into an optional existing condition.
///
/// A top-level OR is parenthesized first: `a OR b AND p` would bind `p` to
/// `b` alone and leak the rows matched by `a`.
pub(crate) fn merge_filter(existing: Option<Expr>, filter: Expr) -> Expr {
    match existing {
        None => filter,
        Some(
            current @ Expr::BinaryOp {
                op: BinaryOperator::Or,
                ..
            },
        ) => and(Expr::Nested(Box::new(current)), filter),
        Some(current) => and(current, filter),
    }
}

/// In-place variant of [`merge_filter`] for conditions that are not
/// optional, such as a join's ON expression.
pub(crate) fn merge_filter_into(existing: &mut Expr, filter: Expr) {
    let current = std::mem::replace(existing, Expr::Value(Value::Null.into()));
    *existing = merge_filter(Some(current), filter);
}

fn and(left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOperator::And,
        right: Box::new(right),
    }
}
