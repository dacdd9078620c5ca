//! Runtime boolean filter tree and the pushdown extraction operations.
//!
//! The where clause is lowered into this tree once per plan. The pushdown
//! pass splits it: any subtree whose predicates are fully answerable from
//! the bindings available at a plan position is extracted into a Filter
//! operator there, and removed from the remaining tree. AND nodes split
//! freely; an OR node only moves as a whole, otherwise extraction would
//! change its meaning. Every predicate ends up in exactly one Filter.

use std::collections::BTreeSet;
use std::fmt;

use crate::model::PropertyValue;
use crate::query::ast::{FilterExpr, LogicalOp, Predicate, PredicateRhs};

/// Resolves `alias.property` lookups against the current execution state.
pub(crate) trait PropertyResolver {
    fn is_bound(&self, alias: &str) -> bool;
    fn resolve(&self, alias: &str, property: &str) -> Option<PropertyValue>;
}

/// Node of the runtime filter tree.
#[derive(Clone, Debug)]
pub enum FilterNode {
    Predicate(Predicate),
    Condition {
        op: LogicalOp,
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
}

/// Lowers the where-clause expression into a runtime filter tree.
pub fn build_filter_tree(expr: &FilterExpr) -> FilterNode {
    match expr {
        FilterExpr::Predicate(pred) => FilterNode::Predicate(pred.clone()),
        FilterExpr::Condition { op, left, right } => FilterNode::Condition {
            op: *op,
            left: Box::new(build_filter_tree(left)),
            right: Box::new(build_filter_tree(right)),
        },
    }
}

impl FilterNode {
    /// Collects every alias referenced by predicates in this subtree.
    pub fn collect_aliases(&self, out: &mut BTreeSet<String>) {
        match self {
            FilterNode::Predicate(pred) => {
                out.insert(pred.lhs.alias.clone());
                if let PredicateRhs::Property(rhs) = &pred.rhs {
                    out.insert(rhs.alias.clone());
                }
            }
            FilterNode::Condition { left, right, .. } => {
                left.collect_aliases(out);
                right.collect_aliases(out);
            }
        }
    }

    /// Whether every alias referenced in this subtree is within `seen`.
    pub fn covered_by(&self, seen: &BTreeSet<String>) -> bool {
        match self {
            FilterNode::Predicate(pred) => {
                seen.contains(&pred.lhs.alias)
                    && match &pred.rhs {
                        PredicateRhs::Property(rhs) => seen.contains(&rhs.alias),
                        PredicateRhs::Constant(_) => true,
                    }
            }
            FilterNode::Condition { left, right, .. } => {
                left.covered_by(seen) && right.covered_by(seen)
            }
        }
    }

    /// Whether some extractable subtree is fully answerable from `seen`.
    pub fn contains_applicable(&self, seen: &BTreeSet<String>) -> bool {
        if self.covered_by(seen) {
            return true;
        }
        match self {
            FilterNode::Condition {
                op: LogicalOp::And,
                left,
                right,
            } => left.contains_applicable(seen) || right.contains_applicable(seen),
            _ => false,
        }
    }

    pub fn predicate_count(&self) -> usize {
        match self {
            FilterNode::Predicate(_) => 1,
            FilterNode::Condition { left, right, .. } => {
                left.predicate_count() + right.predicate_count()
            }
        }
    }

    /// Whether every referenced alias currently has a binding.
    pub(crate) fn aliases_bound<R: PropertyResolver>(&self, resolver: &R) -> bool {
        match self {
            FilterNode::Predicate(pred) => {
                resolver.is_bound(&pred.lhs.alias)
                    && match &pred.rhs {
                        PredicateRhs::Property(rhs) => resolver.is_bound(&rhs.alias),
                        PredicateRhs::Constant(_) => true,
                    }
            }
            FilterNode::Condition { left, right, .. } => {
                left.aliases_bound(resolver) && right.aliases_bound(resolver)
            }
        }
    }

    /// Evaluates the tree against the current bindings. Missing properties
    /// and type-mismatched comparisons are false.
    pub(crate) fn evaluate<R: PropertyResolver>(&self, resolver: &R) -> bool {
        match self {
            FilterNode::Predicate(pred) => evaluate_predicate(pred, resolver),
            FilterNode::Condition {
                op: LogicalOp::And,
                left,
                right,
            } => left.evaluate(resolver) && right.evaluate(resolver),
            FilterNode::Condition {
                op: LogicalOp::Or,
                left,
                right,
            } => left.evaluate(resolver) || right.evaluate(resolver),
        }
    }
}

fn evaluate_predicate<R: PropertyResolver>(pred: &Predicate, resolver: &R) -> bool {
    let Some(lhs) = resolver.resolve(&pred.lhs.alias, &pred.lhs.property) else {
        return false;
    };
    let rhs = match &pred.rhs {
        PredicateRhs::Constant(value) => value.clone(),
        PredicateRhs::Property(prop) => {
            let Some(value) = resolver.resolve(&prop.alias, &prop.property) else {
                return false;
            };
            value
        }
    };
    match lhs.partial_cmp_value(&rhs) {
        Some(ord) => pred.op.matches(ord),
        None => false,
    }
}

/// Removes every subtree of `tree` covered by `seen` and returns their
/// conjunction. Removal and extraction are one step, so predicates are
/// neither lost nor duplicated; AND nodes left with a single child collapse
/// into that child.
pub fn extract_applicable(
    tree: &mut Option<FilterNode>,
    seen: &BTreeSet<String>,
) -> Option<FilterNode> {
    let current = tree.take()?;
    let (extracted, remaining) = split(current, seen);
    *tree = remaining;
    extracted
}

fn split(node: FilterNode, seen: &BTreeSet<String>) -> (Option<FilterNode>, Option<FilterNode>) {
    if node.covered_by(seen) {
        return (Some(node), None);
    }
    match node {
        FilterNode::Condition {
            op: LogicalOp::And,
            left,
            right,
        } => {
            let (left_extracted, left_remaining) = split(*left, seen);
            let (right_extracted, right_remaining) = split(*right, seen);
            (
                merge_and(left_extracted, right_extracted),
                merge_and(left_remaining, right_remaining),
            )
        }
        other => (None, Some(other)),
    }
}

fn merge_and(a: Option<FilterNode>, b: Option<FilterNode>) -> Option<FilterNode> {
    match (a, b) {
        (Some(left), Some(right)) => Some(FilterNode::Condition {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }),
        (Some(node), None) | (None, Some(node)) => Some(node),
        (None, None) => None,
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Predicate(pred) => {
                write!(f, "{} {} ", pred.lhs, pred.op.symbol())?;
                match &pred.rhs {
                    PredicateRhs::Constant(PropertyValue::String(s)) => write!(f, "\"{s}\""),
                    PredicateRhs::Constant(PropertyValue::Bool(v)) => write!(f, "{v}"),
                    PredicateRhs::Constant(PropertyValue::Int(v)) => write!(f, "{v}"),
                    PredicateRhs::Constant(PropertyValue::Float(v)) => write!(f, "{v}"),
                    PredicateRhs::Property(prop) => write!(f, "{prop}"),
                }
            }
            FilterNode::Condition { op, left, right } => {
                let name = match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                write!(f, "({left} {name} {right})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::CompareOp;
    use std::collections::HashMap;

    struct MapResolver {
        props: HashMap<(String, String), PropertyValue>,
    }

    impl MapResolver {
        fn new(entries: &[(&str, &str, PropertyValue)]) -> Self {
            let props = entries
                .iter()
                .map(|(a, p, v)| (((*a).to_owned(), (*p).to_owned()), v.clone()))
                .collect();
            Self { props }
        }
    }

    impl PropertyResolver for MapResolver {
        fn is_bound(&self, alias: &str) -> bool {
            self.props.keys().any(|(a, _)| a == alias)
        }

        fn resolve(&self, alias: &str, property: &str) -> Option<PropertyValue> {
            self.props
                .get(&(alias.to_owned(), property.to_owned()))
                .cloned()
        }
    }

    fn seen(aliases: &[&str]) -> BTreeSet<String> {
        aliases.iter().map(|a| (*a).to_owned()).collect()
    }

    fn age_gt(alias: &str, value: i64) -> FilterExpr {
        FilterExpr::cmp(alias, "age", CompareOp::Gt, value)
    }

    #[test]
    fn and_subtrees_extract_independently() {
        let expr = age_gt("x", 30).and(age_gt("y", 10));
        let mut tree = Some(build_filter_tree(&expr));

        let extracted = extract_applicable(&mut tree, &seen(&["x"])).expect("x side extracted");
        assert_eq!(extracted.predicate_count(), 1);
        let remaining = tree.as_ref().expect("y side remains");
        assert_eq!(remaining.predicate_count(), 1);

        let rest = extract_applicable(&mut tree, &seen(&["x", "y"])).expect("y side extracted");
        assert_eq!(rest.predicate_count(), 1);
        assert!(tree.is_none());
    }

    #[test]
    fn or_subtree_extracts_only_as_a_whole() {
        let expr = age_gt("x", 30).or(age_gt("y", 10));
        let mut tree = Some(build_filter_tree(&expr));

        assert!(!tree
            .as_ref()
            .expect("tree present")
            .contains_applicable(&seen(&["x"])));
        assert!(extract_applicable(&mut tree, &seen(&["x"])).is_none());
        assert!(tree.is_some());

        let whole = extract_applicable(&mut tree, &seen(&["x", "y"])).expect("whole OR extracted");
        assert_eq!(whole.predicate_count(), 2);
        assert!(tree.is_none());
    }

    #[test]
    fn combined_and_stays_together_when_fully_covered() {
        let expr = age_gt("x", 30).and(FilterExpr::cmp("x", "name", CompareOp::Eq, "A"));
        let mut tree = Some(build_filter_tree(&expr));
        let extracted = extract_applicable(&mut tree, &seen(&["x"])).expect("whole AND extracted");
        assert_eq!(extracted.predicate_count(), 2);
        assert!(tree.is_none());
    }

    #[test]
    fn evaluates_constants_and_varying_predicates() {
        let resolver = MapResolver::new(&[
            ("x", "age", PropertyValue::Int(42)),
            ("y", "age", PropertyValue::Int(40)),
        ]);

        let gt = build_filter_tree(&age_gt("x", 30));
        assert!(gt.evaluate(&resolver));

        let varying = build_filter_tree(&FilterExpr::cmp_props(
            crate::query::ast::PropertyRef::new("x", "age"),
            CompareOp::Gt,
            crate::query::ast::PropertyRef::new("y", "age"),
        ));
        assert!(varying.evaluate(&resolver));

        let missing = build_filter_tree(&age_gt("z", 0));
        assert!(!missing.evaluate(&resolver));
    }

    #[test]
    fn type_mismatch_is_false() {
        let resolver = MapResolver::new(&[("x", "age", PropertyValue::from("old"))]);
        let tree = build_filter_tree(&age_gt("x", 30));
        assert!(!tree.evaluate(&resolver));
    }

    #[test]
    fn short_circuit_connectives() {
        let resolver = MapResolver::new(&[("x", "age", PropertyValue::Int(42))]);
        let either = build_filter_tree(&age_gt("x", 100).or(age_gt("x", 30)));
        assert!(either.evaluate(&resolver));
        let both = build_filter_tree(&age_gt("x", 100).and(age_gt("x", 30)));
        assert!(!both.evaluate(&resolver));
    }
}
