//! Expansion along outgoing edges of a bound source node.

use smallvec::{smallvec, SmallVec};

use crate::error::Result;
use crate::query::ops::{ExecContext, RelFilter, Signal};
use crate::query::pattern::{PatternEdgeId, PatternNodeId};
use crate::types::{EdgeId, NodeId};

/// For the node bound to its source alias, emits one binding per outgoing
/// edge matching the relation constraint, binding the edge and destination
/// aliases. Signals `Refresh` when the adjacency of the current source is
/// exhausted (or the source is not bound yet), so the executor re-drives
/// the child stream.
#[derive(Debug)]
pub struct ExpandAll {
    src_node: PatternNodeId,
    edge: PatternEdgeId,
    dest_node: PatternNodeId,
    src_alias: String,
    edge_alias: String,
    dest_alias: String,
    relation_name: Option<String>,
    rel: RelFilter,
    adjacency: Option<SmallVec<[(EdgeId, NodeId); 8]>>,
    pos: usize,
    modifies: SmallVec<[String; 2]>,
}

impl ExpandAll {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        src_node: PatternNodeId,
        edge: PatternEdgeId,
        dest_node: PatternNodeId,
        src_alias: impl Into<String>,
        edge_alias: impl Into<String>,
        dest_alias: impl Into<String>,
        relation_name: Option<String>,
        rel: RelFilter,
    ) -> Self {
        let edge_alias = edge_alias.into();
        let dest_alias = dest_alias.into();
        Self {
            src_node,
            edge,
            dest_node,
            src_alias: src_alias.into(),
            modifies: smallvec![edge_alias.clone(), dest_alias.clone()],
            edge_alias,
            dest_alias,
            relation_name,
            rel,
            adjacency: None,
            pos: 0,
        }
    }

    /// Pattern handle of the expansion source.
    pub fn src_node(&self) -> PatternNodeId {
        self.src_node
    }

    /// Pattern handle of the traversed pattern edge.
    pub fn pattern_edge(&self) -> PatternEdgeId {
        self.edge
    }

    /// Pattern handle of the expansion destination.
    pub fn dest_node(&self) -> PatternNodeId {
        self.dest_node
    }

    pub fn src_alias(&self) -> &str {
        &self.src_alias
    }

    pub fn dest_alias(&self) -> &str {
        &self.dest_alias
    }

    pub(crate) fn parts(
        &self,
    ) -> (
        PatternNodeId,
        PatternEdgeId,
        PatternNodeId,
        String,
        String,
        String,
        Option<String>,
        RelFilter,
    ) {
        (
            self.src_node,
            self.edge,
            self.dest_node,
            self.src_alias.clone(),
            self.edge_alias.clone(),
            self.dest_alias.clone(),
            self.relation_name.clone(),
            self.rel,
        )
    }

    pub fn modifies(&self) -> &[String] {
        &self.modifies
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        if self.adjacency.is_none() {
            let Some(src) = ctx.bindings().node(&self.src_alias) else {
                return Ok(Signal::Refresh);
            };
            let adjacency = match self.rel {
                RelFilter::Any => ctx.graph().hexastore().outgoing(src, None),
                RelFilter::Typed(rel) => ctx.graph().hexastore().outgoing(src, Some(rel)),
                RelFilter::Missing => SmallVec::new(),
            };
            self.adjacency = Some(adjacency);
            self.pos = 0;
        }

        let Some(adjacency) = &self.adjacency else {
            return Ok(Signal::Refresh);
        };
        if let Some(&(edge, dest)) = adjacency.get(self.pos) {
            self.pos += 1;
            ctx.bindings_mut().bind_edge(&self.edge_alias, edge);
            ctx.bindings_mut().bind_node(&self.dest_alias, dest);
            Ok(Signal::Ready)
        } else {
            Ok(Signal::Refresh)
        }
    }

    /// Clears the adjacency iterator so the next consume rebuilds it from
    /// the freshly bound source.
    pub(crate) fn reset(&mut self) {
        self.adjacency = None;
        self.pos = 0;
    }

    pub(crate) fn display_detail(&self) -> String {
        let relation = self
            .relation_name
            .as_deref()
            .map(|name| format!(":{name}"))
            .unwrap_or_default();
        format!(
            "ExpandAll ({})-[{}{}]->({})",
            self.src_alias, self.edge_alias, relation, self.dest_alias
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyValue;
    use crate::storage::Graph;

    fn no_props() -> Vec<(&'static str, PropertyValue)> {
        Vec::new()
    }

    #[test]
    fn emits_one_binding_per_outgoing_edge() -> Result<()> {
        let mut graph = Graph::new();
        let a = graph.add_node(Some("actor"), no_props());
        let m1 = graph.add_node(Some("movie"), no_props());
        let m2 = graph.add_node(Some("movie"), no_props());
        graph.add_edge(a, m1, "acted_in", no_props())?;
        graph.add_edge(a, m2, "acted_in", no_props())?;
        graph.add_edge(a, m1, "directed", no_props())?;

        let rel = RelFilter::resolve(&graph, Some("acted_in"));
        let mut op = ExpandAll::new(
            PatternNodeId(0),
            PatternEdgeId(0),
            PatternNodeId(1),
            "x",
            "r",
            "y",
            Some("acted_in".into()),
            rel,
        );

        let mut ctx = ExecContext::new(&graph);
        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);

        ctx.bindings_mut().bind_node("x", a);
        op.reset();
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(ctx.bindings().node("y"), Some(m1));
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(ctx.bindings().node("y"), Some(m2));
        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);
        Ok(())
    }

    #[test]
    fn missing_relation_type_matches_nothing() -> Result<()> {
        let mut graph = Graph::new();
        let a = graph.add_node(None, no_props());
        let b = graph.add_node(None, no_props());
        graph.add_edge(a, b, "knows", no_props())?;

        let rel = RelFilter::resolve(&graph, Some("ghost"));
        assert_eq!(rel, RelFilter::Missing);

        let mut op = ExpandAll::new(
            PatternNodeId(0),
            PatternEdgeId(0),
            PatternNodeId(1),
            "x",
            "r",
            "y",
            Some("ghost".into()),
            rel,
        );
        let mut ctx = ExecContext::new(&graph);
        ctx.bindings_mut().bind_node("x", a);
        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);
        Ok(())
    }
}
