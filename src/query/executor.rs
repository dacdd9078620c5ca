//! Pull-based, single-threaded plan execution.
//!
//! The driver repeatedly advances the root; requests propagate down the
//! DAG. An operator answering `Refresh` is reset and its child streams are
//! re-driven: the first stream able to produce advances, streams to its
//! right that never produced are primed, and streams to its left are reset
//! recursively and re-driven from scratch, which makes sibling streams
//! behave as a product join. Depletion of a subtree gives the operator one
//! `flush` transition so blocking operators can start emitting buffered
//! output.

use tracing::debug;

use crate::error::{QuiverError, Result};
use crate::query::ops::{ExecContext, Op, Signal};
use crate::query::plan::{ExecutionPlan, PlanNodeId, StreamState};
use crate::query::resultset::ResultSet;
use crate::storage::Graph;

impl ExecutionPlan {
    /// Drives the plan to depletion and returns the materialized results.
    ///
    /// The graph must be the one the plan was built against; label and
    /// relation ids resolved at plan time are looked up in it. A stream
    /// coordination failure aborts the run with an error.
    pub fn execute(&mut self, graph: &Graph) -> Result<ResultSet> {
        let mut ctx = ExecContext::new(graph);
        self.reset_stream(self.root, &mut ctx)?;
        loop {
            match self.execute_node(self.root, &mut ctx)? {
                Signal::Ready => continue,
                Signal::Refresh | Signal::Depleted => break,
            }
        }

        match &mut self.nodes[self.root.0].op {
            Op::ProduceResults(produce) => {
                let mut results = produce.take_results();
                results.finalize();
                debug!(rows = results.len(), "query executed");
                Ok(results)
            }
            _ => Err(QuiverError::execution(
                "plan root is not a ProduceResults operator",
            )),
        }
    }

    fn execute_node(&mut self, id: PlanNodeId, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        loop {
            self.nodes[id.0].state = StreamState::Consuming;
            match self.nodes[id.0].op.consume(ctx)? {
                Signal::Ready => return Ok(Signal::Ready),
                Signal::Depleted => {
                    self.nodes[id.0].state = StreamState::Depleted;
                    return Ok(Signal::Depleted);
                }
                Signal::Refresh => {
                    // Current input exhausted: re-arm, then try to pull new
                    // data from the child streams and consume again.
                    self.nodes[id.0].op.reset()?;
                    match self.pull_from_streams(id, ctx)? {
                        Signal::Ready => continue,
                        _ => match self.nodes[id.0].op.flush()? {
                            Signal::Ready => continue,
                            _ => {
                                self.nodes[id.0].state = StreamState::Depleted;
                                return Ok(Signal::Depleted);
                            }
                        },
                    }
                }
            }
        }
    }

    /// Coordinates the child streams of `source` like an odometer: streams
    /// are assumed independent of each other.
    fn pull_from_streams(&mut self, source: PlanNodeId, ctx: &mut ExecContext<'_>) -> Result<Signal> {
        let streams = self.nodes[source.0].children.clone();

        // Advance the first stream able to produce.
        let mut advanced = None;
        for (idx, &stream) in streams.iter().enumerate() {
            if self.execute_node(stream, ctx)? == Signal::Ready {
                advanced = Some(idx);
                break;
            }
        }
        let Some(advanced) = advanced else {
            return Ok(Signal::Depleted);
        };

        // Prime streams to the right that have never produced.
        for &stream in &streams[advanced + 1..] {
            if self.nodes[stream.0].state == StreamState::Uninitialized
                && self.execute_node(stream, ctx)? != Signal::Ready
            {
                return Ok(Signal::Depleted);
            }
        }

        // Streams to the left already yielded their current values; re-drive
        // each from scratch, rightmost first, so the product continues.
        for &stream in streams[..advanced].iter().rev() {
            self.reset_stream(stream, ctx)?;
            if self.execute_node(stream, ctx)? != Signal::Ready {
                return Err(QuiverError::execution(
                    "re-driven stream failed to produce a tuple",
                ));
            }
        }

        Ok(Signal::Ready)
    }

    /// Recursively re-arms a subtree. The aliases the subtree binds are
    /// removed from the binding table as well, so a re-driven operator pulls
    /// fresh input instead of answering from the previous pass's bindings.
    fn reset_stream(&mut self, id: PlanNodeId, ctx: &mut ExecContext<'_>) -> Result<()> {
        self.nodes[id.0].op.reset()?;
        self.nodes[id.0].state = StreamState::Uninitialized;
        for alias in self.nodes[id.0].op.modifies().to_vec() {
            ctx.bindings_mut().unbind(&alias);
        }
        for child in self.nodes[id.0].children.clone() {
            self.reset_stream(child, ctx)?;
        }
        Ok(())
    }
}
