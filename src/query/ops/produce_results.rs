//! Root projection into the result set.

use crate::error::Result;
use crate::query::ast::PropertyRef;
use crate::query::ops::{ExecContext, Signal};
use crate::query::resultset::{OrderSpec, ResultSet};
use crate::query::value::Value;

/// How one output column obtains its value.
#[derive(Clone, Debug)]
pub enum OutputExpr {
    /// Whole bound entity.
    Entity(String),
    /// Property of a bound entity; a missing property projects null.
    Property(PropertyRef),
    /// Precomputed value bound under the column name (aggregated plans).
    Computed,
}

/// Named output column of the projection.
#[derive(Clone, Debug)]
pub struct OutputColumn {
    pub name: String,
    pub expr: OutputExpr,
}

/// Projects the return clause into the result set, one row per consumed
/// tuple. When the result set reaches its cap the operator reports
/// depletion, stopping the driver early.
#[derive(Debug)]
pub struct ProduceResults {
    columns: Vec<OutputColumn>,
    aggregated: bool,
    distinct: bool,
    limit: Option<usize>,
    order: Option<OrderSpec>,
    resultset: ResultSet,
    consumed: bool,
}

impl ProduceResults {
    pub(crate) fn new(
        columns: Vec<OutputColumn>,
        aggregated: bool,
        distinct: bool,
        limit: Option<usize>,
        order: Option<OrderSpec>,
    ) -> Self {
        let resultset = ResultSet::new(
            columns.iter().map(|column| column.name.clone()).collect(),
            distinct,
            limit,
            order.clone(),
        );
        Self {
            columns,
            aggregated,
            distinct,
            limit,
            order,
            resultset,
            consumed: false,
        }
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    /// Hands the accumulated result set over, leaving a fresh empty one so
    /// the plan can be executed again.
    pub(crate) fn take_results(&mut self) -> ResultSet {
        let fresh = ResultSet::new(
            self.columns.iter().map(|column| column.name.clone()).collect(),
            self.distinct,
            self.limit,
            self.order.clone(),
        );
        std::mem::replace(&mut self.resultset, fresh)
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        if self.consumed {
            return Ok(Signal::Refresh);
        }
        if self.resultset.is_full() {
            return Ok(Signal::Depleted);
        }

        let mut row = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = if self.aggregated {
                match ctx.bindings().value_of(&column.name) {
                    Some(value) => value,
                    None => return Ok(Signal::Refresh),
                }
            } else {
                match &column.expr {
                    OutputExpr::Entity(alias) => match ctx.bindings().value_of(alias) {
                        Some(value) => value,
                        None => return Ok(Signal::Refresh),
                    },
                    OutputExpr::Property(prop) => {
                        if !ctx.bindings().is_bound(&prop.alias) {
                            return Ok(Signal::Refresh);
                        }
                        ctx.property_of(&prop.alias, &prop.property)
                            .map(|pv| Value::from(&pv))
                            .unwrap_or(Value::Null)
                    }
                    OutputExpr::Computed => match ctx.bindings().value_of(&column.name) {
                        Some(value) => value,
                        None => return Ok(Signal::Refresh),
                    },
                }
            };
            row.push(value);
        }

        self.resultset.add_row(row);
        self.consumed = true;
        Ok(Signal::Ready)
    }

    pub(crate) fn reset(&mut self) {
        self.consumed = false;
    }
}
