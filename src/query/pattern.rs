//! Pattern graph derived from the match clause.
//!
//! Nodes and edges live in index arenas; the indices are the stable handles
//! operators carry for the lifetime of a plan, and handle equality is
//! identity. Right-to-left links are normalized at build time so every
//! pattern edge points from source to destination.

use std::collections::HashMap;

use crate::error::{QuiverError, Result};
use crate::query::ast::{LinkDirection, LinkEntity, MatchClause, MatchEntity, NodeEntity};

/// Stable handle of a pattern node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PatternNodeId(pub(crate) usize);

/// Stable handle of a pattern edge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PatternEdgeId(pub(crate) usize);

#[derive(Clone, Debug)]
pub struct PatternNode {
    pub alias: String,
    pub label: Option<String>,
    pub outgoing: Vec<PatternEdgeId>,
    pub incoming: Vec<PatternEdgeId>,
}

#[derive(Clone, Debug)]
pub struct PatternEdge {
    pub alias: String,
    pub relation: Option<String>,
    pub src: PatternNodeId,
    pub dest: PatternNodeId,
}

#[derive(Clone, Debug, Default)]
pub struct PatternGraph {
    nodes: Vec<PatternNode>,
    edges: Vec<PatternEdge>,
    by_alias: HashMap<String, PatternNodeId>,
    anon_nodes: usize,
    anon_edges: usize,
}

impl PatternGraph {
    /// Builds the pattern graph from a match-clause walk.
    pub fn build(clause: &MatchClause) -> Result<Self> {
        let mut graph = PatternGraph::default();
        let mut prev_node: Option<PatternNodeId> = None;
        let mut pending_link: Option<LinkEntity> = None;

        for entity in &clause.entities {
            match entity {
                MatchEntity::Node(node) => {
                    let id = graph.intern_node(node)?;
                    if let Some(link) = pending_link.take() {
                        let prev = prev_node.ok_or_else(|| {
                            QuiverError::invalid("link without a preceding node")
                        })?;
                        match link.direction {
                            LinkDirection::LeftToRight => graph.add_edge(prev, id, &link),
                            LinkDirection::RightToLeft => graph.add_edge(id, prev, &link),
                        }
                    }
                    prev_node = Some(id);
                }
                MatchEntity::Link(link) => {
                    if prev_node.is_none() {
                        return Err(QuiverError::invalid("link without a preceding node"));
                    }
                    if pending_link.is_some() {
                        return Err(QuiverError::invalid("two consecutive links in match walk"));
                    }
                    pending_link = Some(link.clone());
                }
            }
        }

        if pending_link.is_some() {
            return Err(QuiverError::invalid("match walk ends on a dangling link"));
        }
        Ok(graph)
    }

    fn intern_node(&mut self, entity: &NodeEntity) -> Result<PatternNodeId> {
        if let Some(alias) = &entity.alias {
            if let Some(&id) = self.by_alias.get(alias) {
                // Repeated alias refers to the same pattern node; a label on
                // a later occurrence must agree with the first.
                if let Some(label) = &entity.label {
                    let existing = self.nodes[id.0].label.clone();
                    match existing {
                        Some(existing) if &existing != label => {
                            return Err(QuiverError::invalid(format!(
                                "alias '{alias}' declared with conflicting labels"
                            )));
                        }
                        Some(_) => {}
                        None => self.nodes[id.0].label = Some(label.clone()),
                    }
                }
                return Ok(id);
            }
        }

        let alias = match &entity.alias {
            Some(alias) => alias.clone(),
            None => {
                self.anon_nodes += 1;
                format!("anon_{}", self.anon_nodes)
            }
        };
        let id = PatternNodeId(self.nodes.len());
        self.by_alias.insert(alias.clone(), id);
        self.nodes.push(PatternNode {
            alias,
            label: entity.label.clone(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        Ok(id)
    }

    fn add_edge(&mut self, src: PatternNodeId, dest: PatternNodeId, link: &LinkEntity) {
        let alias = match &link.alias {
            Some(alias) => alias.clone(),
            None => {
                self.anon_edges += 1;
                format!("anon_r{}", self.anon_edges)
            }
        };
        let id = PatternEdgeId(self.edges.len());
        self.edges.push(PatternEdge {
            alias,
            relation: link.relation.clone(),
            src,
            dest,
        });
        self.nodes[src.0].outgoing.push(id);
        self.nodes[dest.0].incoming.push(id);
    }

    pub fn node(&self, id: PatternNodeId) -> &PatternNode {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: PatternEdgeId) -> &PatternEdge {
        &self.edges[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (PatternNodeId, &PatternNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (PatternNodeId(idx), node))
    }

    pub fn in_degree(&self, id: PatternNodeId) -> usize {
        self.nodes[id.0].incoming.len()
    }

    pub fn out_degree(&self, id: PatternNodeId) -> usize {
        self.nodes[id.0].outgoing.len()
    }

    /// Pattern nodes whose in-degree equals `degree`, in declaration order.
    pub fn nodes_with_in_degree(&self, degree: usize) -> Vec<PatternNodeId> {
        self.nodes()
            .filter(|(id, _)| self.in_degree(*id) == degree)
            .map(|(id, _)| id)
            .collect()
    }

    /// First outgoing edge of a node, the chain-walk step used by the
    /// planner.
    pub fn first_outgoing(&self, id: PatternNodeId) -> Option<PatternEdgeId> {
        self.nodes[id.0].outgoing.first().copied()
    }

    pub fn node_by_alias(&self, alias: &str) -> Option<PatternNodeId> {
        self.by_alias.get(alias).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::builder::QueryBuilder;

    fn pattern_of(builder: QueryBuilder) -> PatternGraph {
        let ast = builder.build().expect("valid query");
        PatternGraph::build(&ast.match_clause).expect("valid pattern")
    }

    #[test]
    fn chain_builds_linear_pattern() {
        let pattern = pattern_of(
            QueryBuilder::new()
                .node("x", Some("actor"))
                .out(Some("acted_in"))
                .node("y", Some("movie"))
                .select(["x"]),
        );
        assert_eq!(pattern.node_count(), 2);
        assert_eq!(pattern.edge_count(), 1);
        let x = pattern.node_by_alias("x").expect("x present");
        let y = pattern.node_by_alias("y").expect("y present");
        assert_eq!(pattern.out_degree(x), 1);
        assert_eq!(pattern.in_degree(y), 1);
        assert_eq!(pattern.nodes_with_in_degree(0), vec![x]);
    }

    #[test]
    fn right_to_left_link_swaps_endpoints() {
        let pattern = pattern_of(
            QueryBuilder::new()
                .node("y", Some("movie"))
                .inbound(Some("acted_in"))
                .node("x", Some("actor"))
                .select(["x"]),
        );
        let x = pattern.node_by_alias("x").expect("x present");
        let y = pattern.node_by_alias("y").expect("y present");
        let edge_id = pattern.first_outgoing(x).expect("x has outgoing edge");
        let edge = pattern.edge(edge_id);
        assert_eq!(edge.src, x);
        assert_eq!(edge.dest, y);
        assert_eq!(pattern.in_degree(y), 1);
    }

    #[test]
    fn convergence_gives_in_degree_two() {
        let pattern = pattern_of(
            QueryBuilder::new()
                .node("x", Some("actor"))
                .out(Some("acted_in"))
                .node("y", Some("movie"))
                .inbound(Some("acted_in"))
                .node("z", Some("actor"))
                .select(["x", "z"]),
        );
        let y = pattern.node_by_alias("y").expect("y present");
        assert_eq!(pattern.nodes_with_in_degree(2), vec![y]);
        let roots = pattern.nodes_with_in_degree(0);
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn anonymous_entities_get_unique_aliases() {
        let pattern = pattern_of(
            QueryBuilder::new()
                .node("x", None)
                .out(None)
                .anon_node(None)
                .select(["x"]),
        );
        assert_eq!(pattern.node_count(), 2);
        let aliases: Vec<_> = pattern.nodes().map(|(_, n)| n.alias.clone()).collect();
        assert_eq!(aliases[0], "x");
        assert!(aliases[1].starts_with("anon_"));
    }

    #[test]
    fn isolated_node_has_no_edges() {
        let pattern = pattern_of(QueryBuilder::new().node("x", Some("actor")).select(["x"]));
        let x = pattern.node_by_alias("x").expect("x present");
        assert_eq!(pattern.out_degree(x), 0);
        assert_eq!(pattern.in_degree(x), 0);
        assert_eq!(pattern.first_outgoing(x), None);
    }
}
