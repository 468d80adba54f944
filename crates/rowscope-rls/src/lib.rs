//! # rowscope-rls
//!
//! SQL statement rewriting for row-level scope enforcement.
//!
//! This crate provides functionality to:
//! - Parse SQL statements using `sqlparser`
//! - Walk a statement's FROM/JOIN chains, subqueries, CTEs and set
//!   operations
//! - Inject scope predicates (tenant, ownership, role filters) into the
//!   right boolean condition without application code writing scope-aware
//!   SQL
//!
//! ## How It Works
//!
//! Rowscope rewrites a statement before it reaches the database:
//!
//! **Before (from application):**
//! ```sql
//! SELECT * FROM orders WHERE status = 'pending'
//! ```
//!
//! **After (to the database):**
//! ```sql
//! SELECT * FROM orders WHERE status = 'pending' AND orders.tenant_id = 'client_a'
//! ```
//!
//! Where the predicate lands is decided per construct, because the choice is
//! correctness-critical for outer joins:
//!
//! | Construct | Behavior |
//! |-----------|----------|
//! | `SELECT`  | Predicate appended to `WHERE` |
//! | `UPDATE` / `DELETE` | Predicate appended to `WHERE` |
//! | `INSERT`  | Passed through unchanged |
//! | `INNER JOIN` | Both sides filtered in `ON` |
//! | `LEFT JOIN` | Right side filtered in `ON`, left side in `WHERE` |
//! | `RIGHT JOIN` | Left side filtered in `ON`, right side in `WHERE` |
//! | Subquery / CTE / `UNION` | Each nested select rewritten independently |
//!
//! Which scopes apply to a call is decided by activating registered
//! [`ScopeRule`]s; the resulting [`ScopeActivation`] is consumed by exactly
//! one rewrite, so a scope selection never leaks into an unrelated
//! statement.

pub mod error;
pub mod injector;
pub mod parser;
pub mod processor;
pub mod registry;
pub mod rules;

pub use error::ScopeError;
pub use injector::{InjectionResult, ScopeInjector};
pub use parser::SqlAnalyzer;
pub use processor::{RewriteReport, ScopeProcessor};
pub use registry::{ScopeActivation, ScopeRegistry};
pub use rules::{ScopeRule, ScopeValue, SqlPredicateScope, TenantScope};
