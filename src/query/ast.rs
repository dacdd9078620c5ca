//! High-level abstract syntax tree for the graph query DSL.
//!
//! A query is a match clause (an ordered walk of node and link entities),
//! an optional where clause (a boolean tree over property predicates), a
//! return clause (entities, properties, or aggregation calls), and optional
//! order/limit clauses. The structures here are produced by the
//! [`QueryBuilder`](crate::query::builder::QueryBuilder) and lowered by the
//! planner; there is no text parser at this layer.

use std::cmp::Ordering;
use std::fmt;

use crate::model::PropertyValue;

/// Traversal direction of a link entity within the match clause.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkDirection {
    /// `(a)-[..]->(b)`: the link runs from the preceding to the following node.
    LeftToRight,
    /// `(a)<-[..]-(b)`: the link runs from the following to the preceding node.
    RightToLeft,
}

/// Node entity in the match clause.
#[derive(Clone, Debug, Default)]
pub struct NodeEntity {
    /// Binding alias; anonymous nodes get one synthesized during planning.
    pub alias: Option<String>,
    /// Optional label constraint.
    pub label: Option<String>,
}

/// Link (relationship) entity in the match clause.
#[derive(Clone, Debug)]
pub struct LinkEntity {
    /// Binding alias for the matched edge.
    pub alias: Option<String>,
    /// Optional relationship-type constraint.
    pub relation: Option<String>,
    /// Direction relative to the surrounding node entities.
    pub direction: LinkDirection,
}

/// One element of the match clause walk.
#[derive(Clone, Debug)]
pub enum MatchEntity {
    Node(NodeEntity),
    Link(LinkEntity),
}

/// Ordered walk of alternating node and link entities.
#[derive(Clone, Debug, Default)]
pub struct MatchClause {
    pub entities: Vec<MatchEntity>,
}

/// Comparison operator usable in predicates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Whether an ordering between two comparable values satisfies the
    /// operator.
    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord.is_eq(),
            CompareOp::Ne => !ord.is_eq(),
            CompareOp::Lt => ord.is_lt(),
            CompareOp::Le => ord.is_le(),
            CompareOp::Gt => ord.is_gt(),
            CompareOp::Ge => ord.is_ge(),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Reference to `alias.property`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PropertyRef {
    pub alias: String,
    pub property: String,
}

impl PropertyRef {
    pub fn new(alias: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.property)
    }
}

/// Right-hand side of a predicate: a constant or another property.
#[derive(Clone, Debug)]
pub enum PredicateRhs {
    Constant(PropertyValue),
    Property(PropertyRef),
}

/// Single comparison over bound entities.
#[derive(Clone, Debug)]
pub struct Predicate {
    pub lhs: PropertyRef,
    pub op: CompareOp,
    pub rhs: PredicateRhs,
}

/// Boolean connective in the where clause.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Boolean expression tree of the where clause.
#[derive(Clone, Debug)]
pub enum FilterExpr {
    Predicate(Predicate),
    Condition {
        op: LogicalOp,
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },
}

impl FilterExpr {
    /// Predicate comparing `alias.property` against a constant.
    pub fn cmp(
        alias: impl Into<String>,
        property: impl Into<String>,
        op: CompareOp,
        value: impl Into<PropertyValue>,
    ) -> Self {
        FilterExpr::Predicate(Predicate {
            lhs: PropertyRef::new(alias, property),
            op,
            rhs: PredicateRhs::Constant(value.into()),
        })
    }

    /// Predicate comparing two properties of (possibly different) bindings.
    pub fn cmp_props(lhs: PropertyRef, op: CompareOp, rhs: PropertyRef) -> Self {
        FilterExpr::Predicate(Predicate {
            lhs,
            op,
            rhs: PredicateRhs::Property(rhs),
        })
    }

    pub fn and(self, other: FilterExpr) -> Self {
        FilterExpr::Condition {
            op: LogicalOp::And,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: FilterExpr) -> Self {
        FilterExpr::Condition {
            op: LogicalOp::Or,
            left: Box::new(self),
            right: Box::new(other),
        }
    }
}

/// Where clause wrapping the filter expression tree.
#[derive(Clone, Debug)]
pub struct WhereClause {
    pub filter: FilterExpr,
}

/// Aggregation function applicable in the return clause.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }
}

/// Argument of an aggregation call.
#[derive(Clone, Debug)]
pub enum AggArg {
    /// Whole entity, e.g. `count(x)`.
    Entity(String),
    /// Property of an entity, e.g. `sum(x.age)`.
    Property(PropertyRef),
}

impl AggArg {
    pub fn entity(alias: impl Into<String>) -> Self {
        AggArg::Entity(alias.into())
    }

    pub fn property(alias: impl Into<String>, property: impl Into<String>) -> Self {
        AggArg::Property(PropertyRef::new(alias, property))
    }

    /// Alias of the entity the argument reads.
    pub fn alias(&self) -> &str {
        match self {
            AggArg::Entity(alias) => alias,
            AggArg::Property(prop) => &prop.alias,
        }
    }
}

impl fmt::Display for AggArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggArg::Entity(alias) => write!(f, "{alias}"),
            AggArg::Property(prop) => write!(f, "{prop}"),
        }
    }
}

/// Expression of one return element.
#[derive(Clone, Debug)]
pub enum ReturnExpr {
    /// Whole bound entity.
    Entity(String),
    /// Property of a bound entity.
    Property(PropertyRef),
    /// Aggregation call.
    Aggregation { func: AggFunc, arg: AggArg },
}

/// Return element with an optional `AS` alias.
#[derive(Clone, Debug)]
pub struct ReturnElement {
    pub expr: ReturnExpr,
    pub alias: Option<String>,
}

impl ReturnElement {
    pub fn entity(alias: impl Into<String>) -> Self {
        Self {
            expr: ReturnExpr::Entity(alias.into()),
            alias: None,
        }
    }

    pub fn property(alias: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            expr: ReturnExpr::Property(PropertyRef::new(alias, property)),
            alias: None,
        }
    }

    pub fn aggregation(func: AggFunc, arg: AggArg) -> Self {
        Self {
            expr: ReturnExpr::Aggregation { func, arg },
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Output column name: the `AS` alias when present, otherwise derived
    /// from the expression.
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.expr {
            ReturnExpr::Entity(alias) => alias.clone(),
            ReturnExpr::Property(prop) => prop.to_string(),
            ReturnExpr::Aggregation { func, arg } => format!("{}({})", func.name(), arg),
        }
    }
}

/// Return clause: projection list plus the DISTINCT flag.
#[derive(Clone, Debug, Default)]
pub struct ReturnClause {
    pub elements: Vec<ReturnElement>,
    pub distinct: bool,
}

impl ReturnClause {
    pub fn has_aggregation(&self) -> bool {
        self.elements
            .iter()
            .any(|element| matches!(element.expr, ReturnExpr::Aggregation { .. }))
    }
}

/// Sort direction of the order clause.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Order clause: output column names and a shared direction.
#[derive(Clone, Debug)]
pub struct OrderClause {
    pub columns: Vec<String>,
    pub direction: SortDirection,
}

/// Top-level query expression.
#[derive(Clone, Debug, Default)]
pub struct QueryAst {
    pub match_clause: MatchClause,
    pub where_clause: Option<WhereClause>,
    pub return_clause: ReturnClause,
    pub order_clause: Option<OrderClause>,
    pub limit: Option<usize>,
}

impl QueryAst {
    pub fn has_aggregation(&self) -> bool {
        self.return_clause.has_aggregation()
    }
}
