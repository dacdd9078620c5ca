//! Predicate gate over the current binding tuple.

use crate::error::Result;
use crate::query::filter_tree::FilterNode;
use crate::query::ops::{ExecContext, Signal};

/// Passes the current tuple through when its filter tree evaluates to true,
/// requests a replacement tuple otherwise.
#[derive(Debug)]
pub struct FilterOp {
    tree: FilterNode,
    consumed: bool,
}

impl FilterOp {
    pub fn new(tree: FilterNode) -> Self {
        Self {
            tree,
            consumed: false,
        }
    }

    pub fn tree(&self) -> &FilterNode {
        &self.tree
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        if self.consumed {
            return Ok(Signal::Refresh);
        }
        if !self.tree.aliases_bound(ctx) {
            return Ok(Signal::Refresh);
        }
        if self.tree.evaluate(ctx) {
            self.consumed = true;
            Ok(Signal::Ready)
        } else {
            Ok(Signal::Refresh)
        }
    }

    pub(crate) fn reset(&mut self) {
        self.consumed = false;
    }

    pub(crate) fn display_detail(&self) -> String {
        format!("Filter [{}]", self.tree)
    }
}
