//! Edge-existence check between two bound endpoints.

use smallvec::{smallvec, SmallVec};

use crate::error::Result;
use crate::query::ops::{ExecContext, RelFilter, Signal};
use crate::query::pattern::{PatternEdgeId, PatternNodeId};

/// Verifies that the specified edge exists between the nodes bound to the
/// source and destination aliases. Emits exactly one tuple per endpoint
/// combination when the edge is present, `Refresh` otherwise, which makes
/// the operator a join check over its independently produced child streams.
#[derive(Debug)]
pub struct ExpandInto {
    src_node: PatternNodeId,
    edge: PatternEdgeId,
    dest_node: PatternNodeId,
    src_alias: String,
    edge_alias: String,
    dest_alias: String,
    relation_name: Option<String>,
    rel: RelFilter,
    consumed: bool,
    modifies: SmallVec<[String; 2]>,
}

impl ExpandInto {
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
        Self {
            src_node,
            edge,
            dest_node,
            src_alias: src_alias.into(),
            modifies: smallvec![edge_alias.clone()],
            edge_alias,
            dest_alias: dest_alias.into(),
            relation_name,
            rel,
            consumed: false,
        }
    }

    /// Pattern handle of the destination (convergence) node.
    pub fn dest_node(&self) -> PatternNodeId {
        self.dest_node
    }

    pub fn src_node(&self) -> PatternNodeId {
        self.src_node
    }

    pub fn pattern_edge(&self) -> PatternEdgeId {
        self.edge
    }

    pub fn modifies(&self) -> &[String] {
        &self.modifies
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        if self.consumed {
            return Ok(Signal::Refresh);
        }
        let Some(src) = ctx.bindings().node(&self.src_alias) else {
            return Ok(Signal::Refresh);
        };
        let Some(dest) = ctx.bindings().node(&self.dest_alias) else {
            return Ok(Signal::Refresh);
        };

        let rel = match self.rel {
            RelFilter::Any => None,
            RelFilter::Typed(rel) => Some(rel),
            RelFilter::Missing => return Ok(Signal::Refresh),
        };
        match ctx.graph().hexastore().edge_between(src, dest, rel) {
            Some(edge) => {
                self.consumed = true;
                ctx.bindings_mut().bind_edge(&self.edge_alias, edge);
                Ok(Signal::Ready)
            }
            None => Ok(Signal::Refresh),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.consumed = false;
    }

    pub(crate) fn display_detail(&self) -> String {
        let relation = self
            .relation_name
            .as_deref()
            .map(|name| format!(":{name}"))
            .unwrap_or_default();
        format!(
            "ExpandInto ({})-[{}{}]->({})",
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
    fn confirms_edge_between_bound_endpoints() -> Result<()> {
        let mut graph = Graph::new();
        let a = graph.add_node(None, no_props());
        let b = graph.add_node(None, no_props());
        let c = graph.add_node(None, no_props());
        graph.add_edge(a, b, "knows", no_props())?;

        let rel = RelFilter::resolve(&graph, Some("knows"));
        let mut op = ExpandInto::new(
            PatternNodeId(0),
            PatternEdgeId(0),
            PatternNodeId(1),
            "x",
            "r",
            "y",
            Some("knows".into()),
            rel,
        );
        let mut ctx = ExecContext::new(&graph);

        ctx.bindings_mut().bind_node("x", a);
        ctx.bindings_mut().bind_node("y", b);
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        // The current combination was answered; a new one is required.
        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);

        op.reset();
        ctx.bindings_mut().bind_node("y", c);
        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);
        Ok(())
    }
}
