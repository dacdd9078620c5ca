//! Fluent builder for programmatic query construction.
//!
//! The builder is the crate's query front end: it assembles the match walk,
//! filter tree and projection list, and validates the whole query at
//! [`build`](QueryBuilder::build) so the planner only ever sees well-formed
//! input.

use std::collections::HashSet;

use crate::error::{QuiverError, Result};
use crate::query::ast::{
    AggArg, AggFunc, FilterExpr, LinkDirection, LinkEntity, MatchClause, MatchEntity, NodeEntity,
    OrderClause, PredicateRhs, QueryAst, ReturnClause, ReturnElement, ReturnExpr, SortDirection,
};

/// Builds a [`QueryAst`] clause by clause.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    entities: Vec<MatchEntity>,
    filter: Option<FilterExpr>,
    returns: Vec<ReturnElement>,
    distinct: bool,
    order: Option<OrderClause>,
    limit: Option<usize>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node entity `(alias:label)` to the match walk.
    pub fn node(mut self, alias: &str, label: Option<&str>) -> Self {
        self.entities.push(MatchEntity::Node(NodeEntity {
            alias: Some(alias.to_owned()),
            label: label.map(str::to_owned),
        }));
        self
    }

    /// Appends an anonymous node entity `(:label)` or `()`.
    pub fn anon_node(mut self, label: Option<&str>) -> Self {
        self.entities.push(MatchEntity::Node(NodeEntity {
            alias: None,
            label: label.map(str::to_owned),
        }));
        self
    }

    /// Appends an outgoing link `-[:relation]->`.
    pub fn out(self, relation: Option<&str>) -> Self {
        self.link(None, relation, LinkDirection::LeftToRight)
    }

    /// Appends an aliased outgoing link `-[alias:relation]->`.
    pub fn out_as(self, alias: &str, relation: Option<&str>) -> Self {
        self.link(Some(alias), relation, LinkDirection::LeftToRight)
    }

    /// Appends an incoming link `<-[:relation]-`.
    pub fn inbound(self, relation: Option<&str>) -> Self {
        self.link(None, relation, LinkDirection::RightToLeft)
    }

    /// Appends an aliased incoming link `<-[alias:relation]-`.
    pub fn inbound_as(self, alias: &str, relation: Option<&str>) -> Self {
        self.link(Some(alias), relation, LinkDirection::RightToLeft)
    }

    fn link(mut self, alias: Option<&str>, relation: Option<&str>, direction: LinkDirection) -> Self {
        self.entities.push(MatchEntity::Link(LinkEntity {
            alias: alias.map(str::to_owned),
            relation: relation.map(str::to_owned),
            direction,
        }));
        self
    }

    /// Adds a filter expression; multiple calls combine with AND.
    pub fn filter(mut self, expr: FilterExpr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Returns whole entities by alias.
    pub fn select<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returns
            .extend(aliases.into_iter().map(|alias| ReturnElement::entity(alias.into())));
        self
    }

    /// Returns a single property.
    pub fn select_property(mut self, alias: &str, property: &str) -> Self {
        self.returns.push(ReturnElement::property(alias, property));
        self
    }

    /// Returns an aggregation call.
    pub fn select_agg(mut self, func: AggFunc, arg: AggArg) -> Self {
        self.returns.push(ReturnElement::aggregation(func, arg));
        self
    }

    /// Returns a fully specified element (e.g. with an `AS` alias).
    pub fn select_element(mut self, element: ReturnElement) -> Self {
        self.returns.push(element);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by<I, S>(mut self, columns: I, direction: SortDirection) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = Some(OrderClause {
            columns: columns.into_iter().map(Into::into).collect(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validates the accumulated clauses and produces the AST.
    pub fn build(self) -> Result<QueryAst> {
        self.validate_walk()?;
        let declared = self.declared_aliases()?;

        if self.returns.is_empty() {
            return Err(QuiverError::invalid("return clause must not be empty"));
        }
        for element in &self.returns {
            let alias = match &element.expr {
                ReturnExpr::Entity(alias) => alias.as_str(),
                ReturnExpr::Property(prop) => prop.alias.as_str(),
                ReturnExpr::Aggregation { arg, .. } => arg.alias(),
            };
            if !declared.contains(alias) {
                return Err(QuiverError::invalid(format!(
                    "return references undeclared alias '{alias}'"
                )));
            }
        }

        if let Some(filter) = &self.filter {
            check_filter_aliases(filter, &declared)?;
        }

        if let Some(order) = &self.order {
            let output: HashSet<String> =
                self.returns.iter().map(ReturnElement::output_name).collect();
            for column in &order.columns {
                if !output.contains(column) {
                    return Err(QuiverError::invalid(format!(
                        "order by references unknown column '{column}'"
                    )));
                }
            }
        }

        Ok(QueryAst {
            match_clause: MatchClause {
                entities: self.entities,
            },
            where_clause: self
                .filter
                .map(|filter| crate::query::ast::WhereClause { filter }),
            return_clause: ReturnClause {
                elements: self.returns,
                distinct: self.distinct,
            },
            order_clause: self.order,
            limit: self.limit,
        })
    }

    /// Links must sit between two node entities; a node entity may also
    /// start a new disconnected path component.
    fn validate_walk(&self) -> Result<()> {
        let mut after_link = false;
        let mut seen_node = false;
        for entity in &self.entities {
            match entity {
                MatchEntity::Node(_) => {
                    after_link = false;
                    seen_node = true;
                }
                MatchEntity::Link(_) => {
                    if !seen_node || after_link {
                        return Err(QuiverError::invalid(
                            "link must connect two node entities",
                        ));
                    }
                    after_link = true;
                }
            }
        }
        if after_link {
            return Err(QuiverError::invalid("match walk ends on a dangling link"));
        }
        Ok(())
    }

    fn declared_aliases(&self) -> Result<HashSet<String>> {
        let mut declared = HashSet::new();
        let mut labels: Vec<(String, String)> = Vec::new();
        for entity in &self.entities {
            match entity {
                MatchEntity::Node(node) => {
                    if let Some(alias) = &node.alias {
                        if let Some(label) = &node.label {
                            if labels
                                .iter()
                                .any(|(a, l)| a == alias && l != label)
                            {
                                return Err(QuiverError::invalid(format!(
                                    "alias '{alias}' declared with conflicting labels"
                                )));
                            }
                            labels.push((alias.clone(), label.clone()));
                        }
                        declared.insert(alias.clone());
                    }
                }
                MatchEntity::Link(link) => {
                    if let Some(alias) = &link.alias {
                        declared.insert(alias.clone());
                    }
                }
            }
        }
        Ok(declared)
    }
}

fn check_filter_aliases(expr: &FilterExpr, declared: &HashSet<String>) -> Result<()> {
    match expr {
        FilterExpr::Predicate(pred) => {
            if !declared.contains(pred.lhs.alias.as_str()) {
                return Err(QuiverError::invalid(format!(
                    "filter references undeclared alias '{}'",
                    pred.lhs.alias
                )));
            }
            if let PredicateRhs::Property(rhs) = &pred.rhs {
                if !declared.contains(rhs.alias.as_str()) {
                    return Err(QuiverError::invalid(format!(
                        "filter references undeclared alias '{}'",
                        rhs.alias
                    )));
                }
            }
            Ok(())
        }
        FilterExpr::Condition { left, right, .. } => {
            check_filter_aliases(left, declared)?;
            check_filter_aliases(right, declared)
        }
    }
}
