#![forbid(unsafe_code)]

//! Embedded graph query engine.
//!
//! `quiver` plans pattern-matching queries over an in-memory property graph
//! into a DAG of physical operators and drives that DAG with a pull-based,
//! single-threaded protocol. Planning picks scan entry points, merges the
//! expansions converging on a shared pattern node into an edge-existence
//! check, and pushes filters down to the lowest position where their
//! bindings are available.
//!
//! ```
//! use quiver::{ExecutionPlan, Graph, PropertyValue, QueryBuilder};
//!
//! # fn main() -> quiver::Result<()> {
//! let mut graph = Graph::new();
//! let alice = graph.add_node(Some("actor"), [("age", PropertyValue::Int(37))]);
//! let heat = graph.add_node(Some("movie"), [("title", PropertyValue::from("Heat"))]);
//! graph.add_edge(alice, heat, "acted_in", Vec::<(&str, PropertyValue)>::new())?;
//!
//! let query = QueryBuilder::new()
//!     .node("x", Some("actor"))
//!     .out(Some("acted_in"))
//!     .node("y", Some("movie"))
//!     .select(["x", "y"])
//!     .build()?;
//!
//! let mut plan = ExecutionPlan::new(&graph, &query)?;
//! let results = plan.execute(&graph)?;
//! assert_eq!(results.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod query;
pub mod storage;
pub mod types;

pub use crate::error::{QuiverError, Result};
pub use crate::model::{Edge, Node, PropertyValue};
pub use crate::query::{ExecutionPlan, PlannerConfig, QueryBuilder, ResultSet, Value};
pub use crate::storage::Graph;
pub use crate::types::{EdgeId, LabelId, NodeId, RelTypeId};
