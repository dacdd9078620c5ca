//! Scan over the label index.

use smallvec::{smallvec, SmallVec};

use crate::error::Result;
use crate::query::ops::{ExecContext, Signal};
use crate::types::{LabelId, NodeId};

/// Binds each node carrying the given label, in id order. An unknown label
/// (absent from the store) yields an empty stream.
#[derive(Debug)]
pub struct NodeByLabelScan {
    alias: String,
    label_name: String,
    label: Option<LabelId>,
    cursor: Option<NodeId>,
    modifies: SmallVec<[String; 2]>,
}

impl NodeByLabelScan {
    pub fn new(alias: impl Into<String>, label_name: impl Into<String>, label: Option<LabelId>) -> Self {
        let alias = alias.into();
        Self {
            modifies: smallvec![alias.clone()],
            alias,
            label_name: label_name.into(),
            label,
            cursor: None,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    pub fn modifies(&self) -> &[String] {
        &self.modifies
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        let Some(label) = self.label else {
            return Ok(Signal::Depleted);
        };
        match ctx.graph().next_labeled_after(label, self.cursor) {
            Some(id) => {
                self.cursor = Some(id);
                ctx.bindings_mut().bind_node(&self.alias, id);
                Ok(Signal::Ready)
            }
            None => Ok(Signal::Depleted),
        }
    }

    /// Rewinds the label-index cursor.
    pub(crate) fn reset(&mut self) {
        self.cursor = None;
    }

    pub(crate) fn display_detail(&self) -> String {
        format!("NodeByLabelScan ({}:{})", self.alias, self.label_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyValue;
    use crate::storage::Graph;

    #[test]
    fn scans_only_labeled_nodes() -> Result<()> {
        let mut graph = Graph::new();
        let a = graph.add_node(Some("actor"), Vec::<(&str, PropertyValue)>::new());
        graph.add_node(Some("movie"), Vec::<(&str, PropertyValue)>::new());
        let b = graph.add_node(Some("actor"), Vec::<(&str, PropertyValue)>::new());

        let label = graph.label_id("actor");
        let mut ctx = ExecContext::new(&graph);
        let mut scan = NodeByLabelScan::new("x", "actor", label);

        assert_eq!(scan.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(ctx.bindings().node("x"), Some(a));
        assert_eq!(scan.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(ctx.bindings().node("x"), Some(b));
        assert_eq!(scan.consume(&mut ctx)?, Signal::Depleted);
        Ok(())
    }

    #[test]
    fn unknown_label_is_empty() -> Result<()> {
        let graph = Graph::new();
        let mut ctx = ExecContext::new(&graph);
        let mut scan = NodeByLabelScan::new("x", "ghost", None);
        assert_eq!(scan.consume(&mut ctx)?, Signal::Depleted);
        Ok(())
    }
}
