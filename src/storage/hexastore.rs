//! Six-permutation triple index over `(subject, predicate, object)`.
//!
//! Every edge is recorded as a triple `(src, relation, dest)` under all six
//! orderings, so any bound prefix can be answered with a range scan. The
//! expand operators use the `spo` and `sop` permutations; the remaining four
//! are kept so the index answers every access path the storage layer exposes.

use std::collections::BTreeSet;
use std::ops::Bound;

use smallvec::SmallVec;

use crate::types::{EdgeId, NodeId, RelTypeId};

/// Key layout: the three permuted triple components followed by the edge id,
/// so parallel edges between the same endpoints stay distinct.
type TripleKey = [u64; 4];

#[derive(Clone, Debug, Default)]
pub struct Hexastore {
    spo: BTreeSet<TripleKey>,
    sop: BTreeSet<TripleKey>,
    pso: BTreeSet<TripleKey>,
    pos: BTreeSet<TripleKey>,
    osp: BTreeSet<TripleKey>,
    ops: BTreeSet<TripleKey>,
}

fn scan<'a>(
    index: &'a BTreeSet<TripleKey>,
    prefix: &[u64],
) -> impl Iterator<Item = &'a TripleKey> + 'a {
    let mut lo = [0u64; 4];
    let mut hi = [u64::MAX; 4];
    lo[..prefix.len()].copy_from_slice(prefix);
    hi[..prefix.len()].copy_from_slice(prefix);
    index.range((Bound::Included(lo), Bound::Included(hi)))
}

impl Hexastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: NodeId, rel: RelTypeId, dest: NodeId, edge: EdgeId) {
        let (s, p, o, e) = (src.0, u64::from(rel.0), dest.0, edge.0);
        self.spo.insert([s, p, o, e]);
        self.sop.insert([s, o, p, e]);
        self.pso.insert([p, s, o, e]);
        self.pos.insert([p, o, s, e]);
        self.osp.insert([o, s, p, e]);
        self.ops.insert([o, p, s, e]);
    }

    pub fn len(&self) -> usize {
        self.spo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spo.is_empty()
    }

    /// Outgoing adjacency of `src`, ordered by relation then destination.
    /// With a relation filter the scan narrows to that predicate prefix.
    pub fn outgoing(
        &self,
        src: NodeId,
        rel: Option<RelTypeId>,
    ) -> SmallVec<[(EdgeId, NodeId); 8]> {
        let keys: SmallVec<[&TripleKey; 8]> = match rel {
            Some(rel) => scan(&self.spo, &[src.0, u64::from(rel.0)]).collect(),
            None => scan(&self.spo, &[src.0]).collect(),
        };
        keys.into_iter()
            .map(|&[_, _, o, e]| (EdgeId(e), NodeId(o)))
            .collect()
    }

    /// Incoming adjacency of `dest`, ordered by relation then source.
    pub fn incoming(
        &self,
        dest: NodeId,
        rel: Option<RelTypeId>,
    ) -> SmallVec<[(EdgeId, NodeId); 8]> {
        let keys: SmallVec<[&TripleKey; 8]> = match rel {
            Some(rel) => scan(&self.ops, &[dest.0, u64::from(rel.0)]).collect(),
            None => scan(&self.ops, &[dest.0]).collect(),
        };
        keys.into_iter()
            .map(|&[_, _, s, e]| (EdgeId(e), NodeId(s)))
            .collect()
    }

    /// First edge connecting `src` to `dest`, optionally restricted to one
    /// relation type. Probes the `sop` permutation so both endpoints form the
    /// scan prefix.
    pub fn edge_between(
        &self,
        src: NodeId,
        dest: NodeId,
        rel: Option<RelTypeId>,
    ) -> Option<EdgeId> {
        scan(&self.sop, &[src.0, dest.0])
            .find(|&&[_, _, p, _]| rel.map_or(true, |r| u64::from(r.0) == p))
            .map(|&[_, _, _, e]| EdgeId(e))
    }

    /// All `(src, dest, edge)` triples carrying the given relation type,
    /// ordered by source then destination.
    pub fn by_relation(&self, rel: RelTypeId) -> Vec<(NodeId, NodeId, EdgeId)> {
        scan(&self.pso, &[u64::from(rel.0)])
            .map(|&[_, s, o, e]| (NodeId(s), NodeId(o), EdgeId(e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Hexastore {
        let mut hx = Hexastore::new();
        hx.insert(NodeId(1), RelTypeId(7), NodeId(10), EdgeId(100));
        hx.insert(NodeId(1), RelTypeId(7), NodeId(11), EdgeId(101));
        hx.insert(NodeId(1), RelTypeId(8), NodeId(10), EdgeId(102));
        hx.insert(NodeId(2), RelTypeId(7), NodeId(10), EdgeId(103));
        hx
    }

    #[test]
    fn outgoing_orders_by_relation_then_dest() {
        let hx = store();
        let out: Vec<_> = hx.outgoing(NodeId(1), None).into_vec();
        assert_eq!(
            out,
            vec![
                (EdgeId(100), NodeId(10)),
                (EdgeId(101), NodeId(11)),
                (EdgeId(102), NodeId(10)),
            ]
        );
    }

    #[test]
    fn outgoing_narrows_by_relation() {
        let hx = store();
        let out: Vec<_> = hx.outgoing(NodeId(1), Some(RelTypeId(8))).into_vec();
        assert_eq!(out, vec![(EdgeId(102), NodeId(10))]);
    }

    #[test]
    fn incoming_mirrors_outgoing() {
        let hx = store();
        let inc: Vec<_> = hx.incoming(NodeId(10), Some(RelTypeId(7))).into_vec();
        assert_eq!(inc, vec![(EdgeId(100), NodeId(1)), (EdgeId(103), NodeId(2))]);
    }

    #[test]
    fn edge_between_probes_both_endpoints() {
        let hx = store();
        assert_eq!(
            hx.edge_between(NodeId(1), NodeId(10), Some(RelTypeId(7))),
            Some(EdgeId(100))
        );
        assert_eq!(
            hx.edge_between(NodeId(1), NodeId(10), Some(RelTypeId(8))),
            Some(EdgeId(102))
        );
        assert_eq!(hx.edge_between(NodeId(2), NodeId(11), None), None);
    }

    #[test]
    fn by_relation_spans_sources() {
        let hx = store();
        assert_eq!(
            hx.by_relation(RelTypeId(7)),
            vec![
                (NodeId(1), NodeId(10), EdgeId(100)),
                (NodeId(1), NodeId(11), EdgeId(101)),
                (NodeId(2), NodeId(10), EdgeId(103)),
            ]
        );
    }
}
