//! Rewrite passes over a freshly built execution plan.
//!
//! Three passes run in order: entry-point resolution attaches scan leaves
//! under childless expands, expand merging rewrites one of the two expands
//! converging on an in-degree-2 pattern node into an edge-existence check,
//! and filter pushdown splices Filter vertices at the lowest position where
//! every referenced binding is available.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::query::filter_tree::{self, FilterNode};
use crate::query::ops::{ExpandInto, FilterOp, Op, OpType};
use crate::query::pattern::PatternNodeId;
use crate::query::plan::{build_scan, ExecutionPlan, PlanNodeId};
use crate::storage::Graph;

/// Optimizer pass toggles; all passes are on by default.
#[derive(Clone, Copy, Debug)]
pub struct PlannerConfig {
    pub resolve_entry_points: bool,
    pub merge_expands: bool,
    pub push_down_filters: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            resolve_entry_points: true,
            merge_expands: true,
            push_down_filters: true,
        }
    }
}

pub(crate) fn optimize(plan: &mut ExecutionPlan, graph: &Graph, config: &PlannerConfig) {
    if config.resolve_entry_points {
        resolve_entry_points(plan, graph);
    }
    if config.merge_expands {
        merge_expands(plan);
    }
    if config.push_down_filters {
        push_down_filters(plan);
    }
}

/// Attaches a scan child under every childless ExpandAll. The scanned
/// entry node is the expand's source: a label scan when the pattern node is
/// labeled, a full scan otherwise.
fn resolve_entry_points(plan: &mut ExecutionPlan, graph: &Graph) {
    let mut stack = vec![plan.root()];
    let mut leaves = Vec::new();
    while let Some(id) = stack.pop() {
        if plan.children(id).is_empty() && plan.operator(id).op_type() == OpType::ExpandAll {
            leaves.push(id);
        } else {
            stack.extend(plan.children(id).iter().copied());
        }
    }

    for id in leaves {
        let scan = match plan.operator(id) {
            Op::ExpandAll(expand) => build_scan(graph, plan.pattern(), expand.src_node()),
            _ => continue,
        };
        trace!(scan = %scan.display_detail(), "resolved entry point");
        let scan_node = plan.add_node(scan);
        plan.add_child(id, scan_node);
    }
}

/// For every pattern node with in-degree exactly 2, rewrites one of the two
/// ExpandAll vertices converging on it into an ExpandInto and re-links the
/// other chain beneath it, so both endpoints are produced independently and
/// the edge between them is verified rather than generated.
fn merge_expands(plan: &mut ExecutionPlan) {
    for target in plan.pattern().nodes_with_in_degree(2) {
        merge_at(plan, target);
    }
}

fn merge_at(plan: &mut ExecutionPlan, target: PatternNodeId) {
    // Locate both expands whose destination handle is the convergence node.
    // The walk follows child edges from the root; the first match is not
    // descended past, the second ends the search.
    let mut first: Option<PlanNodeId> = None;
    let mut second: Option<PlanNodeId> = None;
    let mut stack = vec![plan.root()];
    while let Some(current) = stack.pop() {
        if let Op::ExpandAll(expand) = plan.operator(current) {
            if expand.dest_node() == target {
                if first.is_none() {
                    first = Some(current);
                    continue;
                }
                second = Some(current);
                break;
            }
        }
        stack.extend(plan.children(current).iter().copied());
    }
    let (Some(a), Some(b)) = (first, second) else {
        return;
    };

    let replacement = match plan.operator(a) {
        Op::ExpandAll(expand) => {
            let (src, edge, dest, src_alias, edge_alias, dest_alias, relation_name, rel) =
                expand.parts();
            Op::ExpandInto(ExpandInto::new(
                src,
                edge,
                dest,
                src_alias,
                edge_alias,
                dest_alias,
                relation_name,
                rel,
            ))
        }
        _ => return,
    };
    debug!(detail = %replacement.display_detail(), "merging expands at convergence node");
    plan.replace_op(a, replacement);
    plan.add_child(a, b);

    // The rewritten vertex takes over b's remaining parents.
    for parent in plan.parents(b).to_vec() {
        if parent == a {
            continue;
        }
        if !plan.contains_child(parent, a) {
            plan.add_child(parent, a);
        }
        plan.remove_child(parent, b);
    }
}

/// Walks the plan bottom-up accumulating the bindings visible beneath each
/// vertex, and splices every applicable part of the filter tree directly
/// above the position where its bindings first become available.
fn push_down_filters(plan: &mut ExecutionPlan) {
    let mut tree = plan.filter_tree.take();
    if tree.is_some() {
        let root = plan.root();
        add_filters(plan, root, &mut tree);
    }
    plan.filter_tree = tree;
}

fn add_filters(
    plan: &mut ExecutionPlan,
    id: PlanNodeId,
    tree: &mut Option<FilterNode>,
) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let children = plan.children(id).to_vec();
    for child in children.into_iter().rev() {
        let saw = add_filters(plan, child, tree);
        if tree.is_none() {
            // Every predicate is placed; the traversal can stop.
            return seen;
        }
        seen.extend(saw);
    }

    let applicable = tree
        .as_ref()
        .is_some_and(|current| current.contains_applicable(&seen));
    if applicable {
        if let Some(min_tree) = filter_tree::extract_applicable(tree, &seen) {
            trace!(filter = %min_tree, "pushing filter");
            let filter = plan.add_node(Op::Filter(FilterOp::new(min_tree)));
            plan.push_in_between(id, filter);
        }
    }

    seen.extend(plan.operator(id).modifies().iter().cloned());
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::query::ast::{CompareOp, FilterExpr};
    use crate::query::builder::QueryBuilder;
    use crate::storage::Graph;

    fn movie_graph() -> Graph {
        let mut graph = Graph::new();
        let a1 = graph.add_node(Some("actor"), [("age", crate::model::PropertyValue::Int(40))]);
        let a2 = graph.add_node(Some("actor"), [("age", crate::model::PropertyValue::Int(50))]);
        let m1 = graph.add_node(Some("movie"), [("title", crate::model::PropertyValue::from("Heat"))]);
        graph
            .add_edge(a1, m1, "acted_in", Vec::<(&str, crate::model::PropertyValue)>::new())
            .expect("edge");
        graph
            .add_edge(a2, m1, "acted_in", Vec::<(&str, crate::model::PropertyValue)>::new())
            .expect("edge");
        graph
    }

    fn op_names(plan: &ExecutionPlan) -> Vec<String> {
        // Pre-order walk over operator names.
        fn walk(plan: &ExecutionPlan, id: PlanNodeId, out: &mut Vec<String>) {
            out.push(plan.operator(id).name().to_owned());
            for &child in plan.children(id) {
                walk(plan, child, out);
            }
        }
        let mut out = Vec::new();
        walk(plan, plan.root(), &mut out);
        out
    }

    #[test]
    fn entry_points_attach_label_scan_for_labeled_source() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", Some("actor"))
            .out(Some("acted_in"))
            .node("y", Some("movie"))
            .select(["y"])
            .build()?;
        let plan = ExecutionPlan::new(&graph, &ast)?;
        assert_eq!(
            op_names(&plan),
            vec!["ProduceResults", "ExpandAll", "NodeByLabelScan"]
        );
        Ok(())
    }

    #[test]
    fn entry_points_attach_full_scan_for_unlabeled_source() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", None)
            .out(None)
            .node("y", None)
            .select(["y"])
            .build()?;
        let plan = ExecutionPlan::new(&graph, &ast)?;
        assert_eq!(
            op_names(&plan),
            vec!["ProduceResults", "ExpandAll", "AllNodeScan"]
        );
        Ok(())
    }

    #[test]
    fn disabled_entry_points_leave_expand_leaves() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", Some("actor"))
            .out(Some("acted_in"))
            .node("y", Some("movie"))
            .select(["y"])
            .build()?;
        let config = PlannerConfig {
            resolve_entry_points: false,
            merge_expands: false,
            push_down_filters: false,
        };
        let plan = ExecutionPlan::with_config(&graph, &ast, config)?;
        assert_eq!(op_names(&plan), vec!["ProduceResults", "ExpandAll"]);
        Ok(())
    }

    #[test]
    fn convergence_rewrites_one_expand_into() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", Some("actor"))
            .out(Some("acted_in"))
            .node("y", Some("movie"))
            .inbound(Some("acted_in"))
            .node("z", Some("actor"))
            .select(["x", "z"])
            .build()?;
        let plan = ExecutionPlan::new(&graph, &ast)?;

        let root_children = plan.children(plan.root());
        assert_eq!(root_children.len(), 1);
        let merged = root_children[0];
        assert_eq!(plan.operator(merged).op_type(), OpType::ExpandInto);

        // The merged vertex coordinates two streams: the relinked scan and
        // the surviving expand chain.
        let streams = plan.children(merged);
        assert_eq!(streams.len(), 2);
        let types: Vec<OpType> = streams
            .iter()
            .map(|&id| plan.operator(id).op_type())
            .collect();
        assert!(types.contains(&OpType::NodeByLabelScan));
        assert!(types.contains(&OpType::ExpandAll));
        Ok(())
    }

    #[test]
    fn filter_on_source_lands_on_scan_side() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", Some("actor"))
            .out(Some("acted_in"))
            .node("y", Some("movie"))
            .filter(FilterExpr::cmp("x", "age", CompareOp::Gt, 30_i64))
            .select(["y"])
            .build()?;
        let plan = ExecutionPlan::new(&graph, &ast)?;
        assert_eq!(
            op_names(&plan),
            vec!["ProduceResults", "ExpandAll", "Filter", "NodeByLabelScan"]
        );
        assert!(plan.residual_filter().is_none());
        Ok(())
    }

    #[test]
    fn filter_on_destination_sits_above_expand() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", Some("actor"))
            .out(Some("acted_in"))
            .node("y", Some("movie"))
            .filter(FilterExpr::cmp("y", "title", CompareOp::Eq, "Heat"))
            .select(["y"])
            .build()?;
        let plan = ExecutionPlan::new(&graph, &ast)?;
        assert_eq!(
            op_names(&plan),
            vec!["ProduceResults", "Filter", "ExpandAll", "NodeByLabelScan"]
        );
        Ok(())
    }

    #[test]
    fn combined_and_keeps_single_filter() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", Some("actor"))
            .filter(
                FilterExpr::cmp("x", "age", CompareOp::Gt, 30_i64)
                    .and(FilterExpr::cmp("x", "name", CompareOp::Eq, "A")),
            )
            .select(["x"])
            .build()?;
        let plan = ExecutionPlan::new(&graph, &ast)?;
        assert_eq!(
            op_names(&plan),
            vec!["ProduceResults", "Filter", "NodeByLabelScan"]
        );
        let filter_id = plan.children(plan.root())[0];
        match plan.operator(filter_id) {
            Op::Filter(filter) => assert_eq!(filter.tree().predicate_count(), 2),
            other => panic!("expected filter, found {}", other.name()),
        }
        Ok(())
    }

    #[test]
    fn disabled_pushdown_retains_residual_filter() -> Result<()> {
        let graph = movie_graph();
        let ast = QueryBuilder::new()
            .node("x", Some("actor"))
            .filter(FilterExpr::cmp("x", "age", CompareOp::Gt, 30_i64))
            .select(["x"])
            .build()?;
        let config = PlannerConfig {
            push_down_filters: false,
            ..PlannerConfig::default()
        };
        let plan = ExecutionPlan::with_config(&graph, &ast, config)?;
        assert!(plan.residual_filter().is_some());
        assert_eq!(
            op_names(&plan),
            vec!["ProduceResults", "NodeByLabelScan"]
        );
        Ok(())
    }
}
