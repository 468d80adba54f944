//! Nested-construct scanning.
//!
//! Finds sub-selects hidden inside expressions and function calls and routes
//! them back through the select-body recursion. This pass never injects into
//! the expression it walks; it only recurses into nested statements, which
//! inherit the enclosing call's active scopes.

use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, UnaryOperator,
};

use super::{ScopeContext, ScopeProcessor};
use crate::error::ScopeError;

impl ScopeProcessor {
    /// Scan a select-list expression. Only direct sub-selects and function
    /// calls are considered.
    pub(crate) fn scan_select_expr(
        &self,
        expr: &mut Expr,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        match expr {
            Expr::Subquery(query) => self.process_query(query, ctx),
            Expr::Function(func) => self.scan_function(func, ctx),
            _ => Ok(()),
        }
    }

    /// Scan a boolean expression (typically a WHERE clause) for embedded
    /// sub-selects: IN, EXISTS, comparison and scalar subqueries.
    pub(crate) fn scan_expression(
        &self,
        expr: &mut Expr,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        match expr {
            Expr::BinaryOp { left, right, .. } => {
                self.scan_expression(left, ctx)?;
                self.scan_expression(right, ctx)
            }
            Expr::InSubquery { subquery, .. } => self.process_query(subquery, ctx),
            Expr::Exists { subquery, .. } => self.process_query(subquery, ctx),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => self.scan_expression(expr, ctx),
            Expr::Nested(inner) => self.scan_expression(inner, ctx),
            Expr::Subquery(query) => self.process_query(query, ctx),
            Expr::Function(func) => self.scan_function(func, ctx),
            _ => Ok(()),
        }
    }

    /// Scan a function call's arguments, recursing into nested function
    /// calls and sub-selects alike.
    fn scan_function(
        &self,
        func: &mut Function,
        ctx: &mut ScopeContext<'_>,
    ) -> Result<(), ScopeError> {
        match &mut func.args {
            FunctionArguments::Subquery(query) => self.process_query(query, ctx),
            FunctionArguments::List(list) => {
                for arg in &mut list.args {
                    let Some(expr) = function_arg_expr_mut(arg) else {
                        continue;
                    };
                    match expr {
                        Expr::Subquery(query) => self.process_query(query, ctx)?,
                        Expr::Function(inner) => self.scan_function(inner, ctx)?,
                        _ => {}
                    }
                }
                Ok(())
            }
            FunctionArguments::None => Ok(()),
        }
    }
}

/// Extract the expression payload from a SQL function argument.
fn function_arg_expr_mut(arg: &mut FunctionArg) -> Option<&mut Expr> {
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
        | FunctionArg::Named {
            arg: FunctionArgExpr::Expr(expr),
            ..
        }
        | FunctionArg::ExprNamed {
            arg: FunctionArgExpr::Expr(expr),
            ..
        } => Some(expr),
        _ => None,
    }
}
