//! Execution plan: the operator DAG, its construction from a query AST,
//! and plan printing.
//!
//! Plan vertices live in an arena indexed by [`PlanNodeId`]; child and
//! parent edge lists are kept mutually consistent by the mutation helpers,
//! and the arena is the single owner of every operator. Construction builds
//! the initial DAG from the pattern graph; the optimizer passes in
//! [`optimizer`](crate::query::optimizer) then rewrite it in place.

use std::fmt;

use serde::Serialize;
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

use crate::error::{QuiverError, Result};
use crate::query::ast::{QueryAst, ReturnExpr};
use crate::query::filter_tree::{build_filter_tree, FilterNode};
use crate::query::ops::{
    AggColumn, AggSource, AggregateOp, AllNodeScan, ExpandAll, NodeByLabelScan, Op, OutputColumn,
    OutputExpr, ProduceResults, RelFilter,
};
use crate::query::optimizer::{self, PlannerConfig};
use crate::query::pattern::{PatternEdgeId, PatternGraph, PatternNodeId};
use crate::query::resultset::OrderSpec;
use crate::storage::Graph;

/// Handle of a plan vertex within its plan's arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PlanNodeId(pub(crate) usize);

/// Stream state of a plan vertex during execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamState {
    Uninitialized,
    Consuming,
    Depleted,
}

#[derive(Debug)]
pub(crate) struct PlanNode {
    pub(crate) op: Op,
    pub(crate) children: Vec<PlanNodeId>,
    pub(crate) parents: Vec<PlanNodeId>,
    pub(crate) state: StreamState,
}

/// Operator DAG rooted at a ProduceResults vertex.
#[derive(Debug)]
pub struct ExecutionPlan {
    pub(crate) nodes: Vec<PlanNode>,
    pub(crate) root: PlanNodeId,
    pub(crate) pattern: PatternGraph,
    pub(crate) filter_tree: Option<FilterNode>,
}

impl ExecutionPlan {
    /// Plans the query with all optimization passes enabled.
    pub fn new(graph: &Graph, ast: &QueryAst) -> Result<Self> {
        Self::with_config(graph, ast, PlannerConfig::default())
    }

    /// Plans the query with an explicit pass configuration.
    pub fn with_config(graph: &Graph, ast: &QueryAst, config: PlannerConfig) -> Result<Self> {
        let mut plan = Self::build(graph, ast)?;
        optimizer::optimize(&mut plan, graph, &config);
        debug!(nodes = plan.nodes.len(), "execution plan ready");
        Ok(plan)
    }

    /// Builds the initial DAG: ProduceResults on top, an Aggregate below it
    /// when the return clause aggregates, then one expand chain per pattern
    /// root (walking the first outgoing edge until the chain ends), or a
    /// direct scan for an isolated pattern node.
    fn build(graph: &Graph, ast: &QueryAst) -> Result<Self> {
        let pattern = PatternGraph::build(&ast.match_clause)?;
        let filter_tree = ast
            .where_clause
            .as_ref()
            .map(|clause| build_filter_tree(&clause.filter));
        let aggregated = ast.has_aggregation();

        let mut plan = ExecutionPlan {
            nodes: Vec::new(),
            root: PlanNodeId(0),
            pattern,
            filter_tree,
        };
        let root = plan.add_node(Op::ProduceResults(build_produce_results(ast, aggregated)?));
        plan.root = root;

        let mut ops: Vec<PlanNodeId> = vec![root];
        if aggregated {
            ops.push(plan.add_node(Op::Aggregate(build_aggregate(ast))));
        }

        for entry in plan.pattern.nodes_with_in_degree(0) {
            if plan.pattern.out_degree(entry) > 0 {
                // Walk the chain expanding from this pattern root and stash
                // the expands so the one nearest the root is consumed first.
                // The visited list stops the walk when the chain loops back
                // into itself.
                let mut reversed: Vec<PlanNodeId> = Vec::new();
                let mut visited = vec![entry];
                let mut src = entry;
                while let Some(edge_id) = plan.pattern.first_outgoing(src) {
                    let expand = build_expand_all(graph, &plan.pattern, edge_id);
                    reversed.push(plan.add_node(Op::ExpandAll(expand)));
                    let dest = plan.pattern.edge(edge_id).dest;
                    if visited.contains(&dest) {
                        break;
                    }
                    visited.push(dest);
                    src = dest;
                }
                while let Some(op) = reversed.pop() {
                    ops.push(op);
                }
            } else {
                // Hanging pattern node: scan it directly.
                let scan = build_scan(graph, &plan.pattern, entry);
                ops.push(plan.add_node(scan));
            }

            // Chain the accumulated operators, then reintroduce the root for
            // the next pattern root.
            if ops.len() > 1 {
                if let Some(first) = ops.pop() {
                    let mut prev = first;
                    while let Some(current) = ops.pop() {
                        plan.add_child(current, prev);
                        prev = current;
                    }
                }
                ops.push(root);
            }
        }

        Ok(plan)
    }

    pub fn root(&self) -> PlanNodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn operator(&self, id: PlanNodeId) -> &Op {
        &self.nodes[id.0].op
    }

    pub fn children(&self, id: PlanNodeId) -> &[PlanNodeId] {
        &self.nodes[id.0].children
    }

    pub fn parents(&self, id: PlanNodeId) -> &[PlanNodeId] {
        &self.nodes[id.0].parents
    }

    pub fn pattern(&self) -> &PatternGraph {
        &self.pattern
    }

    /// Stream state of a vertex, as left by the most recent execution.
    pub fn state(&self, id: PlanNodeId) -> StreamState {
        self.nodes[id.0].state
    }

    /// Remaining (un-pushed) filter tree; `None` once pushdown placed every
    /// predicate or the query had no where clause.
    pub fn residual_filter(&self) -> Option<&FilterNode> {
        self.filter_tree.as_ref()
    }

    pub(crate) fn add_node(&mut self, op: Op) -> PlanNodeId {
        let id = PlanNodeId(self.nodes.len());
        self.nodes.push(PlanNode {
            op,
            children: Vec::new(),
            parents: Vec::new(),
            state: StreamState::Uninitialized,
        });
        id
    }

    pub(crate) fn add_child(&mut self, parent: PlanNodeId, child: PlanNodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parents.push(parent);
    }

    pub(crate) fn contains_child(&self, parent: PlanNodeId, child: PlanNodeId) -> bool {
        self.nodes[parent.0].children.contains(&child)
    }

    pub(crate) fn remove_child(&mut self, parent: PlanNodeId, child: PlanNodeId) {
        self.nodes[parent.0].children.retain(|&c| c != child);
        self.nodes[child.0].parents.retain(|&p| p != parent);
    }

    /// Splices `only_child` between `parent` and all of its current
    /// children: the children move under `only_child`, which becomes the
    /// parent's sole child.
    pub(crate) fn push_in_between(&mut self, parent: PlanNodeId, only_child: PlanNodeId) {
        while let Some(&child) = self.nodes[parent.0].children.first() {
            self.add_child(only_child, child);
            self.remove_child(parent, child);
        }
        self.add_child(parent, only_child);
    }

    /// Swaps the operator of a vertex, dropping the old one.
    pub(crate) fn replace_op(&mut self, id: PlanNodeId, op: Op) {
        self.nodes[id.0].op = op;
    }

    /// Explain tree plus a hash that is a pure function of the printed
    /// plan, usable for caching and plan-shape assertions.
    pub fn explain(&self) -> PlanExplain {
        let rendered = self.to_string();
        let mut hasher = Xxh64::new(0);
        hasher.update(rendered.as_bytes());
        PlanExplain {
            root: self.explain_node(self.root),
            plan_hash: hasher.digest(),
        }
    }

    fn explain_node(&self, id: PlanNodeId) -> ExplainNode {
        ExplainNode {
            op: self.nodes[id.0].op.display_detail(),
            inputs: self.nodes[id.0]
                .children
                .iter()
                .map(|&child| self.explain_node(child))
                .collect(),
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: PlanNodeId, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{}",
            "",
            self.nodes[id.0].op.display_detail(),
            indent = depth * 2
        )?;
        for &child in &self.nodes[id.0].children {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionPlan {
    /// Pre-order rendering, two spaces of indentation per depth level.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, 0)
    }
}

/// Explain output: operator tree plus a deterministic plan hash.
#[derive(Clone, Debug, Serialize)]
pub struct PlanExplain {
    pub root: ExplainNode,
    pub plan_hash: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExplainNode {
    pub op: String,
    pub inputs: Vec<ExplainNode>,
}

fn build_produce_results(ast: &QueryAst, aggregated: bool) -> Result<ProduceResults> {
    let columns: Vec<OutputColumn> = ast
        .return_clause
        .elements
        .iter()
        .map(|element| {
            let expr = match &element.expr {
                ReturnExpr::Entity(alias) => OutputExpr::Entity(alias.clone()),
                ReturnExpr::Property(prop) => OutputExpr::Property(prop.clone()),
                ReturnExpr::Aggregation { .. } => OutputExpr::Computed,
            };
            OutputColumn {
                name: element.output_name(),
                expr,
            }
        })
        .collect();

    let order = match &ast.order_clause {
        Some(order) => {
            let mut indexes = Vec::with_capacity(order.columns.len());
            for column in &order.columns {
                let idx = columns
                    .iter()
                    .position(|output| &output.name == column)
                    .ok_or_else(|| {
                        QuiverError::invalid(format!(
                            "order by references unknown column '{column}'"
                        ))
                    })?;
                indexes.push(idx);
            }
            Some(OrderSpec {
                columns: indexes,
                direction: order.direction,
            })
        }
        None => None,
    };

    Ok(ProduceResults::new(
        columns,
        aggregated,
        ast.return_clause.distinct,
        ast.limit,
        order,
    ))
}

fn build_aggregate(ast: &QueryAst) -> AggregateOp {
    let columns = ast
        .return_clause
        .elements
        .iter()
        .map(|element| {
            let source = match &element.expr {
                ReturnExpr::Entity(alias) => AggSource::GroupEntity(alias.clone()),
                ReturnExpr::Property(prop) => AggSource::GroupProperty(prop.clone()),
                ReturnExpr::Aggregation { func, arg } => AggSource::Call {
                    func: *func,
                    arg: arg.clone(),
                },
            };
            AggColumn {
                name: element.output_name(),
                source,
            }
        })
        .collect();
    AggregateOp::new(columns)
}

fn build_expand_all(graph: &Graph, pattern: &PatternGraph, edge_id: PatternEdgeId) -> ExpandAll {
    let edge = pattern.edge(edge_id);
    let src = pattern.node(edge.src);
    let dest = pattern.node(edge.dest);
    ExpandAll::new(
        edge.src,
        edge_id,
        edge.dest,
        src.alias.clone(),
        edge.alias.clone(),
        dest.alias.clone(),
        edge.relation.clone(),
        RelFilter::resolve(graph, edge.relation.as_deref()),
    )
}

/// Scan operator for a pattern node: label scan when labeled, full scan
/// otherwise.
pub(crate) fn build_scan(graph: &Graph, pattern: &PatternGraph, node_id: PatternNodeId) -> Op {
    let node = pattern.node(node_id);
    match &node.label {
        Some(label) => Op::NodeByLabelScan(NodeByLabelScan::new(
            node.alias.clone(),
            label.clone(),
            graph.label_id(label),
        )),
        None => Op::AllNodeScan(AllNodeScan::new(node.alias.clone())),
    }
}
