//! Full scan over every node in the store.

use smallvec::{smallvec, SmallVec};

use crate::error::Result;
use crate::query::ops::{ExecContext, Signal};
use crate::types::NodeId;

/// Binds each stored node to its alias, in id order.
#[derive(Debug)]
pub struct AllNodeScan {
    alias: String,
    cursor: Option<NodeId>,
    modifies: SmallVec<[String; 2]>,
}

impl AllNodeScan {
    pub fn new(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            modifies: smallvec![alias.clone()],
            alias,
            cursor: None,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn modifies(&self) -> &[String] {
        &self.modifies
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        match ctx.graph().next_node_after(self.cursor) {
            Some(id) => {
                self.cursor = Some(id);
                ctx.bindings_mut().bind_node(&self.alias, id);
                Ok(Signal::Ready)
            }
            None => Ok(Signal::Depleted),
        }
    }

    /// Rewinds the storage cursor.
    pub(crate) fn reset(&mut self) {
        self.cursor = None;
    }

    pub(crate) fn display_detail(&self) -> String {
        format!("AllNodeScan ({})", self.alias)
    }
}
