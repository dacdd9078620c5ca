//! Grouping aggregation over the input stream.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::error::Result;
use crate::query::ast::{AggArg, AggFunc, PropertyRef};
use crate::query::ops::{ExecContext, Signal};
use crate::query::resultset::Accumulator;
use crate::query::value::{Value, ValueKey};

/// Input of one output column of the aggregation.
#[derive(Clone, Debug)]
pub enum AggSource {
    /// Grouping key: a whole bound entity.
    GroupEntity(String),
    /// Grouping key: a property of a bound entity.
    GroupProperty(PropertyRef),
    /// Aggregation call folded per group.
    Call { func: AggFunc, arg: AggArg },
}

/// One output column of the aggregation, bound under `name` when emitted.
#[derive(Clone, Debug)]
pub struct AggColumn {
    pub name: String,
    pub source: AggSource,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Accumulate,
    Emit,
}

/// Blocking operator: folds every input tuple into per-group accumulators
/// (answering `Refresh` to keep the executor pulling), then, once its input
/// subtree is depleted, flips to emitting one grouped row per consume.
/// Group iteration order follows the key order, so output is deterministic.
#[derive(Debug)]
pub struct AggregateOp {
    columns: Vec<AggColumn>,
    group_count: usize,
    groups: BTreeMap<Vec<ValueKey>, Vec<Accumulator>>,
    emit_rows: Vec<Vec<Value>>,
    emit_pos: usize,
    phase: Phase,
    finalized: bool,
    modifies: SmallVec<[String; 2]>,
}

impl AggregateOp {
    pub fn new(columns: Vec<AggColumn>) -> Self {
        let group_count = columns
            .iter()
            .filter(|column| !matches!(column.source, AggSource::Call { .. }))
            .count();
        let modifies = columns.iter().map(|column| column.name.clone()).collect();
        Self {
            columns,
            group_count,
            groups: BTreeMap::new(),
            emit_rows: Vec::new(),
            emit_pos: 0,
            phase: Phase::Accumulate,
            finalized: false,
            modifies,
        }
    }

    pub fn modifies(&self) -> &[String] {
        &self.modifies
    }

    fn fresh_accumulators(columns: &[AggColumn]) -> Vec<Accumulator> {
        columns
            .iter()
            .filter_map(|column| match &column.source {
                AggSource::Call { func, .. } => Some(Accumulator::new(*func)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn consume(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        match self.phase {
            Phase::Accumulate => self.accumulate(ctx),
            Phase::Emit => {
                if let Some(row) = self.emit_rows.get(self.emit_pos) {
                    for (column, value) in self.columns.iter().zip(row) {
                        ctx.bindings_mut().bind_scalar(&column.name, value.clone());
                    }
                    self.emit_pos += 1;
                    Ok(Signal::Ready)
                } else {
                    Ok(Signal::Refresh)
                }
            }
        }
    }

    /// Folds the current tuple into its group. An unbound referenced alias
    /// means no tuple has arrived yet.
    fn accumulate(&mut self, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        let mut key = Vec::with_capacity(self.group_count);
        let mut agg_values = Vec::new();
        for column in &self.columns {
            match &column.source {
                AggSource::GroupEntity(alias) => {
                    let Some(value) = ctx.bindings().value_of(alias) else {
                        return Ok(Signal::Refresh);
                    };
                    key.push(ValueKey::new(value));
                }
                AggSource::GroupProperty(prop) => {
                    if !ctx.bindings().is_bound(&prop.alias) {
                        return Ok(Signal::Refresh);
                    }
                    let value = ctx
                        .property_of(&prop.alias, &prop.property)
                        .map(|pv| Value::from(&pv))
                        .unwrap_or(Value::Null);
                    key.push(ValueKey::new(value));
                }
                AggSource::Call { arg, .. } => {
                    let value = match arg {
                        AggArg::Entity(alias) => {
                            let Some(value) = ctx.bindings().value_of(alias) else {
                                return Ok(Signal::Refresh);
                            };
                            value
                        }
                        AggArg::Property(prop) => {
                            if !ctx.bindings().is_bound(&prop.alias) {
                                return Ok(Signal::Refresh);
                            }
                            ctx.property_of(&prop.alias, &prop.property)
                                .map(|pv| Value::from(&pv))
                                .unwrap_or(Value::Null)
                        }
                    };
                    agg_values.push(value);
                }
            }
        }

        let columns = &self.columns;
        let accumulators = self
            .groups
            .entry(key)
            .or_insert_with(|| Self::fresh_accumulators(columns));
        for (accumulator, value) in accumulators.iter_mut().zip(&agg_values) {
            accumulator.update(value);
        }
        Ok(Signal::Refresh)
    }

    /// Input subtree depleted: finalize groups and switch to emitting.
    /// Subsequent flushes confirm depletion.
    pub(crate) fn flush(&mut self) -> Result<Signal> {
        if self.finalized {
            return Ok(Signal::Depleted);
        }
        self.finalized = true;

        // A pure aggregation over an empty input still produces one row
        // (count 0, null extremes).
        if self.groups.is_empty() && self.group_count == 0 && !self.columns.is_empty() {
            self.groups
                .insert(Vec::new(), Self::fresh_accumulators(&self.columns));
        }

        let mut rows = Vec::with_capacity(self.groups.len());
        for (key, accumulators) in &self.groups {
            let mut row = Vec::with_capacity(self.columns.len());
            let mut key_idx = 0;
            let mut acc_idx = 0;
            for column in &self.columns {
                match &column.source {
                    AggSource::GroupEntity(_) | AggSource::GroupProperty(_) => {
                        let value = key
                            .get(key_idx)
                            .map(|k| k.value().clone())
                            .unwrap_or(Value::Null);
                        key_idx += 1;
                        row.push(value);
                    }
                    AggSource::Call { .. } => {
                        let value = accumulators
                            .get(acc_idx)
                            .map(Accumulator::finalize)
                            .unwrap_or(Value::Null);
                        acc_idx += 1;
                        row.push(value);
                    }
                }
            }
            rows.push(row);
        }

        self.emit_rows = rows;
        self.emit_pos = 0;
        self.phase = Phase::Emit;
        if self.emit_rows.is_empty() {
            Ok(Signal::Depleted)
        } else {
            Ok(Signal::Ready)
        }
    }

    /// During accumulation a reset is a no-op (the groups are the whole
    /// point); once emitting, it rewinds so the groups re-emit.
    pub(crate) fn reset(&mut self) {
        if self.phase == Phase::Emit {
            self.emit_pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyValue;
    use crate::storage::Graph;
    use crate::types::NodeId;

    fn count_by_entity() -> AggregateOp {
        AggregateOp::new(vec![
            AggColumn {
                name: "y".into(),
                source: AggSource::GroupEntity("y".into()),
            },
            AggColumn {
                name: "count(x)".into(),
                source: AggSource::Call {
                    func: AggFunc::Count,
                    arg: AggArg::entity("x"),
                },
            },
        ])
    }

    #[test]
    fn accumulates_then_emits_groups() -> Result<()> {
        let graph = Graph::new();
        let mut ctx = ExecContext::new(&graph);
        let mut op = count_by_entity();

        // No input yet.
        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);

        for (x, y) in [(1, 10), (2, 10), (3, 11)] {
            ctx.bindings_mut().bind_node("x", NodeId(x));
            ctx.bindings_mut().bind_node("y", NodeId(y));
            assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);
        }

        assert_eq!(op.flush()?, Signal::Ready);
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(
            ctx.bindings().value_of("y"),
            Some(Value::Node(NodeId(10)))
        );
        assert_eq!(ctx.bindings().value_of("count(x)"), Some(Value::Int(2)));

        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(
            ctx.bindings().value_of("y"),
            Some(Value::Node(NodeId(11)))
        );
        assert_eq!(ctx.bindings().value_of("count(x)"), Some(Value::Int(1)));

        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);
        assert_eq!(op.flush()?, Signal::Depleted);

        // Reset while emitting rewinds the group cursor.
        op.reset();
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        Ok(())
    }

    #[test]
    fn global_aggregation_emits_zero_row_on_empty_input() -> Result<()> {
        let graph = Graph::new();
        let mut ctx = ExecContext::new(&graph);
        let mut op = AggregateOp::new(vec![AggColumn {
            name: "count(x)".into(),
            source: AggSource::Call {
                func: AggFunc::Count,
                arg: AggArg::entity("x"),
            },
        }]);

        assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);
        assert_eq!(op.flush()?, Signal::Ready);
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(ctx.bindings().value_of("count(x)"), Some(Value::Int(0)));
        Ok(())
    }

    #[test]
    fn groups_by_property_value() -> Result<()> {
        let mut graph = Graph::new();
        let a = graph.add_node(None, [("city", PropertyValue::from("rome"))]);
        let b = graph.add_node(None, [("city", PropertyValue::from("rome"))]);
        let c = graph.add_node(None, [("city", PropertyValue::from("oslo"))]);

        let mut op = AggregateOp::new(vec![
            AggColumn {
                name: "x.city".into(),
                source: AggSource::GroupProperty(PropertyRef::new("x", "city")),
            },
            AggColumn {
                name: "count(x)".into(),
                source: AggSource::Call {
                    func: AggFunc::Count,
                    arg: AggArg::entity("x"),
                },
            },
        ]);

        let mut ctx = ExecContext::new(&graph);
        for id in [a, b, c] {
            ctx.bindings_mut().bind_node("x", id);
            assert_eq!(op.consume(&mut ctx)?, Signal::Refresh);
        }
        assert_eq!(op.flush()?, Signal::Ready);

        // Keys iterate in order: "oslo" before "rome".
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(
            ctx.bindings().value_of("x.city"),
            Some(Value::String("oslo".into()))
        );
        assert_eq!(ctx.bindings().value_of("count(x)"), Some(Value::Int(1)));
        assert_eq!(op.consume(&mut ctx)?, Signal::Ready);
        assert_eq!(ctx.bindings().value_of("count(x)"), Some(Value::Int(2)));
        Ok(())
    }
}
