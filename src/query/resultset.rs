//! Materialized query results and aggregation accumulators.
//!
//! Rows accumulate as the root operator produces them; DISTINCT is applied
//! on insert, ORDER BY and LIMIT at finalization. Without an order clause a
//! full result set (limit reached) reports itself so the driver can stop
//! pulling early.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::query::ast::{AggFunc, SortDirection};
use crate::query::value::{Value, ValueKey};

#[derive(Clone, Debug)]
pub(crate) struct OrderSpec {
    pub columns: Vec<usize>,
    pub direction: SortDirection,
}

/// Ordered rows of named columns.
#[derive(Debug, Serialize)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    #[serde(skip)]
    distinct: bool,
    #[serde(skip)]
    seen: HashSet<Vec<ValueKey>>,
    #[serde(skip)]
    limit: Option<usize>,
    #[serde(skip)]
    order: Option<OrderSpec>,
}

impl ResultSet {
    pub(crate) fn new(
        columns: Vec<String>,
        distinct: bool,
        limit: Option<usize>,
        order: Option<OrderSpec>,
    ) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            distinct,
            seen: HashSet::new(),
            limit,
            order,
        }
    }

    pub(crate) fn add_row(&mut self, row: Vec<Value>) {
        if self.distinct {
            let key: Vec<ValueKey> = row.iter().cloned().map(ValueKey::new).collect();
            if !self.seen.insert(key) {
                return;
            }
        }
        self.rows.push(row);
    }

    /// Whether the row cap is reached and no sort is pending. A sorted
    /// result needs every row before truncation, so it is never "full".
    pub(crate) fn is_full(&self) -> bool {
        self.order.is_none() && self.limit.is_some_and(|limit| self.rows.len() >= limit)
    }

    pub(crate) fn finalize(&mut self) {
        if let Some(order) = self.order.clone() {
            self.rows.sort_by(|a, b| {
                let mut ord = Ordering::Equal;
                for &idx in &order.columns {
                    ord = ValueKey::new(a[idx].clone()).cmp(&ValueKey::new(b[idx].clone()));
                    if ord != Ordering::Equal {
                        break;
                    }
                }
                match order.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            self.rows.truncate(limit);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Value at `(row, column)` addressed by column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// Running state of one aggregation call within one group.
#[derive(Clone, Debug)]
pub(crate) enum Accumulator {
    Count(u64),
    Sum { int: i64, float: f64, is_float: bool },
    Avg { sum: f64, count: u64 },
    Min(Option<ValueKey>),
    Max(Option<ValueKey>),
}

impl Accumulator {
    pub(crate) fn new(func: AggFunc) -> Self {
        match func {
            AggFunc::Count => Accumulator::Count(0),
            AggFunc::Sum => Accumulator::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            AggFunc::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggFunc::Min => Accumulator::Min(None),
            AggFunc::Max => Accumulator::Max(None),
        }
    }

    /// Folds one value in. Nulls never contribute; non-numeric values are
    /// ignored by the numeric accumulators.
    pub(crate) fn update(&mut self, value: &Value) {
        match self {
            Accumulator::Count(count) => {
                if !value.is_null() {
                    *count += 1;
                }
            }
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => match value {
                Value::Int(v) => *int += v,
                Value::Float(v) => {
                    *float += v;
                    *is_float = true;
                }
                _ => {}
            },
            Accumulator::Avg { sum, count } => match value {
                Value::Int(v) => {
                    *sum += *v as f64;
                    *count += 1;
                }
                Value::Float(v) => {
                    *sum += v;
                    *count += 1;
                }
                _ => {}
            },
            Accumulator::Min(best) => {
                if !value.is_null() {
                    let key = ValueKey::new(value.clone());
                    if best.as_ref().map_or(true, |current| key < *current) {
                        *best = Some(key);
                    }
                }
            }
            Accumulator::Max(best) => {
                if !value.is_null() {
                    let key = ValueKey::new(value.clone());
                    if best.as_ref().map_or(true, |current| key > *current) {
                        *best = Some(key);
                    }
                }
            }
        }
    }

    pub(crate) fn finalize(&self) -> Value {
        match self {
            Accumulator::Count(count) => Value::Int(*count as i64),
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => {
                if *is_float {
                    Value::Float(float + *int as f64)
                } else {
                    Value::Int(*int)
                }
            }
            Accumulator::Avg { sum, count } => {
                if *count == 0 {
                    Value::Null
                } else {
                    Value::Float(sum / *count as f64)
                }
            }
            Accumulator::Min(best) | Accumulator::Max(best) => best
                .as_ref()
                .map_or(Value::Null, |key| key.value().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(distinct: bool, limit: Option<usize>, order: Option<OrderSpec>) -> ResultSet {
        ResultSet::new(vec!["a".into(), "b".into()], distinct, limit, order)
    }

    #[test]
    fn distinct_deduplicates_rows() {
        let mut rs = set(true, None, None);
        rs.add_row(vec![Value::Int(1), Value::Int(2)]);
        rs.add_row(vec![Value::Int(1), Value::Int(2)]);
        rs.add_row(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(rs.len(), 2);
    }

    #[test]
    fn order_by_sorts_and_limit_truncates() {
        let mut rs = set(
            false,
            Some(2),
            Some(OrderSpec {
                columns: vec![0],
                direction: SortDirection::Descending,
            }),
        );
        rs.add_row(vec![Value::Int(1), Value::Int(10)]);
        rs.add_row(vec![Value::Int(3), Value::Int(30)]);
        rs.add_row(vec![Value::Int(2), Value::Int(20)]);
        assert!(!rs.is_full());
        rs.finalize();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.value(0, "a"), Some(&Value::Int(3)));
        assert_eq!(rs.value(1, "a"), Some(&Value::Int(2)));
    }

    #[test]
    fn unordered_limit_reports_full() {
        let mut rs = set(false, Some(1), None);
        assert!(!rs.is_full());
        rs.add_row(vec![Value::Int(1), Value::Int(2)]);
        assert!(rs.is_full());
    }

    #[test]
    fn count_skips_nulls() {
        let mut acc = Accumulator::new(AggFunc::Count);
        acc.update(&Value::Int(1));
        acc.update(&Value::Null);
        acc.update(&Value::Node(crate::types::NodeId(7)));
        assert_eq!(acc.finalize(), Value::Int(2));
    }

    #[test]
    fn sum_promotes_to_float_only_when_needed() {
        let mut ints = Accumulator::new(AggFunc::Sum);
        ints.update(&Value::Int(2));
        ints.update(&Value::Int(3));
        assert_eq!(ints.finalize(), Value::Int(5));

        let mut mixed = Accumulator::new(AggFunc::Sum);
        mixed.update(&Value::Int(2));
        mixed.update(&Value::Float(0.5));
        assert_eq!(mixed.finalize(), Value::Float(2.5));
    }

    #[test]
    fn avg_of_nothing_is_null() {
        let acc = Accumulator::new(AggFunc::Avg);
        assert_eq!(acc.finalize(), Value::Null);
    }

    #[test]
    fn min_max_track_extremes() {
        let mut min = Accumulator::new(AggFunc::Min);
        let mut max = Accumulator::new(AggFunc::Max);
        for v in [Value::Int(4), Value::Int(1), Value::Int(9), Value::Null] {
            min.update(&v);
            max.update(&v);
        }
        assert_eq!(min.finalize(), Value::Int(1));
        assert_eq!(max.finalize(), Value::Int(9));
    }
}
