//! Physical operators and the execution context they share.
//!
//! Each operator produces a stream of binding tuples through `consume`,
//! signalling with a three-valued [`Signal`]; hard failures travel through
//! the `Err` arm. `Refresh` means the operator has exhausted its current
//! input and needs the executor to re-drive its child streams; it is never
//! collapsed into `Depleted`, which is terminal. Operators communicate
//! through the shared [`Bindings`] table: each one reads the aliases it
//! depends on and writes the aliases it `modifies`.

mod aggregate;
mod all_node_scan;
mod expand_all;
mod expand_into;
mod filter;
mod node_by_label_scan;
mod produce_results;

pub use aggregate::{AggColumn, AggSource, AggregateOp};
pub use all_node_scan::AllNodeScan;
pub use expand_all::ExpandAll;
pub use expand_into::ExpandInto;
pub use filter::FilterOp;
pub use node_by_label_scan::NodeByLabelScan;
pub use produce_results::{OutputColumn, OutputExpr, ProduceResults};

use std::collections::HashMap;

use crate::error::Result;
use crate::model::PropertyValue;
use crate::query::filter_tree::PropertyResolver;
use crate::query::value::Value;
use crate::storage::Graph;
use crate::types::{EdgeId, NodeId, RelTypeId};

/// Outcome of a `consume` call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signal {
    /// A tuple was produced; the caller may consume again.
    Ready,
    /// Current input exhausted; new upstream data is required.
    Refresh,
    /// The stream is finished.
    Depleted,
}

/// Tag identifying an operator variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpType {
    AllNodeScan,
    NodeByLabelScan,
    ExpandAll,
    ExpandInto,
    Filter,
    Aggregate,
    ProduceResults,
}

/// Value bound to an alias during execution.
#[derive(Clone, Debug)]
pub enum BoundValue {
    Node(NodeId),
    Edge(EdgeId),
    Scalar(Value),
}

/// Alias-to-entity binding table shared by all operators of one execution.
#[derive(Debug, Default)]
pub struct Bindings {
    map: HashMap<String, BoundValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, alias: &str) -> Option<&BoundValue> {
        self.map.get(alias)
    }

    pub fn is_bound(&self, alias: &str) -> bool {
        self.map.contains_key(alias)
    }

    /// Node id bound to `alias`, if the alias is bound to a node.
    pub fn node(&self, alias: &str) -> Option<NodeId> {
        match self.map.get(alias) {
            Some(BoundValue::Node(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn bind_node(&mut self, alias: &str, id: NodeId) {
        self.map.insert(alias.to_owned(), BoundValue::Node(id));
    }

    pub fn bind_edge(&mut self, alias: &str, id: EdgeId) {
        self.map.insert(alias.to_owned(), BoundValue::Edge(id));
    }

    pub fn bind_scalar(&mut self, alias: &str, value: Value) {
        self.map.insert(alias.to_owned(), BoundValue::Scalar(value));
    }

    pub fn unbind(&mut self, alias: &str) {
        self.map.remove(alias);
    }

    /// Projects the binding of `alias` into a runtime value.
    pub fn value_of(&self, alias: &str) -> Option<Value> {
        match self.map.get(alias)? {
            BoundValue::Node(id) => Some(Value::Node(*id)),
            BoundValue::Edge(id) => Some(Value::Edge(*id)),
            BoundValue::Scalar(value) => Some(value.clone()),
        }
    }
}

/// Per-execution state handed to every `consume` call.
pub struct ExecContext<'g> {
    graph: &'g Graph,
    bindings: Bindings,
}

impl<'g> ExecContext<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            bindings: Bindings::new(),
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    /// Property of the entity bound to `alias`, if any.
    pub(crate) fn property_of(&self, alias: &str, property: &str) -> Option<PropertyValue> {
        match self.bindings.get(alias)? {
            BoundValue::Node(id) => self.graph.node_property(*id, property).cloned(),
            BoundValue::Edge(id) => self.graph.edge_property(*id, property).cloned(),
            BoundValue::Scalar(_) => None,
        }
    }
}

impl PropertyResolver for ExecContext<'_> {
    fn is_bound(&self, alias: &str) -> bool {
        self.bindings.is_bound(alias)
    }

    fn resolve(&self, alias: &str, property: &str) -> Option<PropertyValue> {
        self.property_of(alias, property)
    }
}

/// Relation-type constraint of an expand operator, resolved against the
/// graph at plan time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RelFilter {
    /// No type constraint.
    Any,
    /// Only edges of this type.
    Typed(RelTypeId),
    /// The named type does not exist in the graph; nothing can match.
    Missing,
}

impl RelFilter {
    pub(crate) fn resolve(graph: &Graph, relation: Option<&str>) -> Self {
        match relation {
            None => RelFilter::Any,
            Some(name) => match graph.rel_type_id(name) {
                Some(id) => RelFilter::Typed(id),
                None => RelFilter::Missing,
            },
        }
    }
}

/// Physical operator variants, dispatched by match.
#[derive(Debug)]
pub enum Op {
    AllNodeScan(AllNodeScan),
    NodeByLabelScan(NodeByLabelScan),
    ExpandAll(ExpandAll),
    ExpandInto(ExpandInto),
    Filter(FilterOp),
    Aggregate(AggregateOp),
    ProduceResults(ProduceResults),
}

impl Op {
    pub fn op_type(&self) -> OpType {
        match self {
            Op::AllNodeScan(_) => OpType::AllNodeScan,
            Op::NodeByLabelScan(_) => OpType::NodeByLabelScan,
            Op::ExpandAll(_) => OpType::ExpandAll,
            Op::ExpandInto(_) => OpType::ExpandInto,
            Op::Filter(_) => OpType::Filter,
            Op::Aggregate(_) => OpType::Aggregate,
            Op::ProduceResults(_) => OpType::ProduceResults,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::AllNodeScan(_) => "AllNodeScan",
            Op::NodeByLabelScan(_) => "NodeByLabelScan",
            Op::ExpandAll(_) => "ExpandAll",
            Op::ExpandInto(_) => "ExpandInto",
            Op::Filter(_) => "Filter",
            Op::Aggregate(_) => "Aggregate",
            Op::ProduceResults(_) => "ProduceResults",
        }
    }

    /// Aliases this operator binds, in binding order.
    pub fn modifies(&self) -> &[String] {
        match self {
            Op::AllNodeScan(op) => op.modifies(),
            Op::NodeByLabelScan(op) => op.modifies(),
            Op::ExpandAll(op) => op.modifies(),
            Op::ExpandInto(op) => op.modifies(),
            Op::Filter(_) | Op::ProduceResults(_) => &[],
            Op::Aggregate(op) => op.modifies(),
        }
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        match self {
            Op::AllNodeScan(op) => op.consume(ctx),
            Op::NodeByLabelScan(op) => op.consume(ctx),
            Op::ExpandAll(op) => op.consume(ctx),
            Op::ExpandInto(op) => op.consume(ctx),
            Op::Filter(op) => op.consume(ctx),
            Op::Aggregate(op) => op.consume(ctx),
            Op::ProduceResults(op) => op.consume(ctx),
        }
    }

    /// Re-arms the operator for another pass over its input. Idempotent.
    pub(crate) fn reset(&mut self) -> Result<()> {
        match self {
            Op::AllNodeScan(op) => op.reset(),
            Op::NodeByLabelScan(op) => op.reset(),
            Op::ExpandAll(op) => op.reset(),
            Op::ExpandInto(op) => op.reset(),
            Op::Filter(op) => op.reset(),
            Op::Aggregate(op) => op.reset(),
            Op::ProduceResults(op) => op.reset(),
        }
        Ok(())
    }

    /// Transition offered by the executor when this operator's input
    /// subtree depletes: blocking operators switch to emitting buffered
    /// output, everything else confirms depletion.
    pub(crate) fn flush(&mut self) -> Result<Signal> {
        match self {
            Op::Aggregate(op) => op.flush(),
            _ => Ok(Signal::Depleted),
        }
    }

    /// One-line operator rendering used by plan printing.
    pub fn display_detail(&self) -> String {
        match self {
            Op::AllNodeScan(op) => op.display_detail(),
            Op::NodeByLabelScan(op) => op.display_detail(),
            Op::ExpandAll(op) => op.display_detail(),
            Op::ExpandInto(op) => op.display_detail(),
            Op::Filter(op) => op.display_detail(),
            Op::Aggregate(_) => "Aggregate".to_owned(),
            Op::ProduceResults(_) => "ProduceResults".to_owned(),
        }
    }
}
