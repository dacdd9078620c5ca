//! In-memory property-graph store.
//!
//! Holds node and edge entities, interns label and relationship-type names,
//! maintains a label index with cardinality, and records every edge in a
//! six-permutation triple index ([`Hexastore`]) for adjacency scans. All
//! iteration orders are deterministic (id order, label-set order), which the
//! query engine relies on for reproducible results.

mod hexastore;

pub use hexastore::Hexastore;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use crate::error::{QuiverError, Result};
use crate::model::{Edge, Node, PropertyValue};
use crate::types::{EdgeId, LabelId, NodeId, RelTypeId};

#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    labels: Vec<String>,
    label_ids: HashMap<String, LabelId>,
    rel_types: Vec<String>,
    rel_type_ids: HashMap<String, RelTypeId>,
    label_index: BTreeMap<LabelId, BTreeSet<NodeId>>,
    hexastore: Hexastore,
    next_node: u64,
    next_edge: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a node with an optional label and the given properties.
    pub fn add_node<K, I>(&mut self, label: Option<&str>, props: I) -> NodeId
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PropertyValue)>,
    {
        self.next_node += 1;
        let id = NodeId(self.next_node);
        let label = label.map(|name| self.intern_label(name));
        let properties = props
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<BTreeMap<_, _>>();
        if let Some(label) = label {
            self.label_index.entry(label).or_default().insert(id);
        }
        self.nodes.insert(
            id,
            Node {
                id,
                label,
                properties,
            },
        );
        id
    }

    /// Creates a typed edge between two existing nodes and indexes it in the
    /// hexastore.
    pub fn add_edge<K, I>(
        &mut self,
        src: NodeId,
        dest: NodeId,
        relation: &str,
        props: I,
    ) -> Result<EdgeId>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PropertyValue)>,
    {
        if !self.nodes.contains_key(&src) || !self.nodes.contains_key(&dest) {
            return Err(QuiverError::NotFound("edge endpoint"));
        }
        self.next_edge += 1;
        let id = EdgeId(self.next_edge);
        let relation = self.intern_rel_type(relation);
        let properties = props
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<BTreeMap<_, _>>();
        self.edges.insert(
            id,
            Edge {
                id,
                relation,
                src,
                dest,
                properties,
            },
        );
        self.hexastore.insert(src, relation, dest, id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn node_property(&self, id: NodeId, name: &str) -> Option<&PropertyValue> {
        self.nodes.get(&id).and_then(|node| node.property(name))
    }

    pub fn edge_property(&self, id: EdgeId, name: &str) -> Option<&PropertyValue> {
        self.edges.get(&id).and_then(|edge| edge.property(name))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn label_id(&self, name: &str) -> Option<LabelId> {
        self.label_ids.get(name).copied()
    }

    pub fn label_name(&self, label: LabelId) -> Option<&str> {
        self.labels.get(label.0 as usize).map(String::as_str)
    }

    pub fn rel_type_id(&self, name: &str) -> Option<RelTypeId> {
        self.rel_type_ids.get(name).copied()
    }

    pub fn rel_type_name(&self, rel: RelTypeId) -> Option<&str> {
        self.rel_types.get(rel.0 as usize).map(String::as_str)
    }

    /// Number of nodes carrying the given label.
    pub fn label_cardinality(&self, label: LabelId) -> usize {
        self.label_index.get(&label).map_or(0, BTreeSet::len)
    }

    /// Cursor step over all nodes in id order; `after == None` starts from
    /// the beginning.
    pub fn next_node_after(&self, after: Option<NodeId>) -> Option<NodeId> {
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        self.nodes
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(&id, _)| id)
    }

    /// Cursor step over the label index in id order.
    pub fn next_labeled_after(&self, label: LabelId, after: Option<NodeId>) -> Option<NodeId> {
        let index = self.label_index.get(&label)?;
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        index.range((lower, Bound::Unbounded)).next().copied()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn hexastore(&self) -> &Hexastore {
        &self.hexastore
    }

    fn intern_label(&mut self, name: &str) -> LabelId {
        if let Some(&id) = self.label_ids.get(name) {
            return id;
        }
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(name.to_owned());
        self.label_ids.insert(name.to_owned(), id);
        id
    }

    fn intern_rel_type(&mut self, name: &str) -> RelTypeId {
        if let Some(&id) = self.rel_type_ids.get(name) {
            return id;
        }
        let id = RelTypeId(self.rel_types.len() as u32);
        self.rel_types.push(name.to_owned());
        self.rel_type_ids.insert(name.to_owned(), id);
        id
    }
}
