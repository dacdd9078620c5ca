//! Query engine: AST, planning, optimization and pull-based execution.
//!
//! A [`QueryAst`](ast::QueryAst) built through the [`QueryBuilder`] is
//! planned into an [`ExecutionPlan`] — a DAG of physical operators rooted at
//! a ProduceResults vertex — rewritten by the optimizer passes, and driven
//! to a [`ResultSet`] by the pull-based executor.

/// Abstract syntax tree of the query DSL.
pub mod ast;

/// Fluent query construction and validation.
pub mod builder;

/// Runtime filter tree and the pushdown extraction operations.
pub mod filter_tree;

/// Physical operators and the shared execution context.
pub mod ops;

/// Optimizer passes over the plan DAG.
pub mod optimizer;

/// Pattern graph derived from the match clause.
pub mod pattern;

/// Plan DAG construction and printing.
pub mod plan;

/// Materialized results and aggregation accumulators.
pub mod resultset;

/// Runtime values and their total order.
pub mod value;

mod executor;

pub use builder::QueryBuilder;
pub use optimizer::PlannerConfig;
pub use plan::{ExecutionPlan, ExplainNode, PlanExplain, PlanNodeId, StreamState};
pub use resultset::ResultSet;
pub use value::Value;
