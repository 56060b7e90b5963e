//! The reduction driver.
//!
//! Traversal is an explicit stack of `(node, next input)` frames so deep
//! graphs never touch the native stack. A node is reduced once every input
//! it can reach has been finalized; after a change, its users (or the whole
//! graph, past the revisit threshold) get another look. The run ends when
//! the stack and revisit queue are empty and no reducer finalizer schedules
//! more work.

use super::config::ReducerConfig;
use super::editor::{Editor, StackEntry};
use super::state::NodeState;
use super::stats::ReduceStats;
use super::{Reducer, Reduction};
use crate::error::{ReduceError, Result};
use crate::ir::{Graph, NodeId};

/// Fixpoint driver for a list of [`Reducer`]s over one graph.
pub struct GraphReducer<'g> {
    /// Registered reducers, consulted in order.
    reducers: Vec<Box<dyn Reducer + 'g>>,
    editor: Editor<'g>,
    /// Arbitration calls in the current run.
    reductions: usize,
}

impl<'g> GraphReducer<'g> {
    pub fn new(graph: &'g mut Graph, config: ReducerConfig) -> Self {
        Self {
            reducers: Vec::new(),
            editor: Editor::new(graph, config),
            reductions: 0,
        }
    }

    /// Use an existing node as the target for unreachable exceptional paths.
    pub fn with_dead(mut self, dead: NodeId) -> Self {
        self.editor.set_dead(dead);
        self
    }

    /// Append a reducer. Earlier reducers get the first shot at each node.
    pub fn add_reducer<R: Reducer + 'g>(&mut self, reducer: R) {
        self.reducers.push(Box::new(reducer));
    }

    #[inline]
    pub fn reducer_count(&self) -> usize {
        self.reducers.len()
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        self.editor.graph()
    }

    #[inline]
    pub fn editor(&mut self) -> &mut Editor<'g> {
        &mut self.editor
    }

    #[inline]
    pub fn stats(&self) -> ReduceStats {
        self.editor.stats
    }

    #[inline]
    pub fn config(&self) -> &ReducerConfig {
        self.editor.config()
    }

    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Reduce everything reachable from the end node to a fixpoint.
    pub fn reduce_graph(&mut self) -> Result<()> {
        let end = self.editor.graph().end();
        self.reduce_node(end)
    }

    /// Reduce everything reachable from `node` to a fixpoint.
    ///
    /// On [`ReduceError::ReductionLimitExceeded`] the graph is left
    /// well-formed but only partially reduced.
    pub fn reduce_node(&mut self, node: NodeId) -> Result<()> {
        debug_assert!(self.editor.stack.is_empty(), "reducer re-entered");
        debug_assert!(self.editor.revisit.is_empty(), "stale revisit queue");
        tracing::debug!(root = %node, reducers = self.reducers.len(), "reduction started");

        self.reductions = 0;
        self.editor.reset_counters();
        self.editor.push(node);
        loop {
            if !self.editor.stack.is_empty() {
                self.reduce_top()?;
            } else if let Some(next) = self.editor.revisit.pop_front() {
                if self.editor.state(next) == NodeState::Revisit && self.editor.recurse(next) {
                    continue;
                }
                tracing::trace!(node = %next, "stale revisit dropped");
                self.editor.stats.stale_revisits += 1;
            } else if self.editor.update_and_get_revisit_all_nodes() {
                tracing::debug!("restarting reduction from the end node");
                self.editor.restart_pass();
            } else {
                for reducer in self.reducers.iter_mut() {
                    reducer.finalize(&mut self.editor);
                }
                self.editor.stats.finalize_rounds += 1;
                if self.editor.revisit.is_empty() {
                    break;
                }
            }
        }

        debug_assert!(self.editor.stack.is_empty());
        tracing::debug!(
            reductions = self.reductions,
            changes = self.editor.stats.changes(),
            restarts = self.editor.stats.whole_graph_restarts,
            "reduction finished"
        );
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    fn reduce_top(&mut self) -> Result<()> {
        let depth = self.editor.stack.len() - 1;
        let StackEntry {
            node, input_index, ..
        } = self.editor.stack[depth];
        debug_assert_eq!(self.editor.state(node), NodeState::OnStack);

        if self.editor.graph().is_dead(node) {
            self.editor.pop();
            return Ok(());
        }

        // Resume where the frame left off, wrapping around in case inputs
        // were rewritten underneath it.
        let count = self.editor.graph().node(node).inputs().len();
        let start = if input_index < count { input_index } else { 0 };
        if self.descend(depth, node, (start..count).chain(0..start)) {
            return Ok(());
        }

        if self.editor.graph().node(node).is_placeholder() {
            self.editor.pop();
            return Ok(());
        }

        if let Some(limit) = self.editor.config.max_reductions {
            if self.reductions >= limit {
                return Err(self.abort(limit, node));
            }
        }

        let max_id = self.editor.max_id();
        let replacement = match self.reduce(node) {
            Reduction::Unchanged => {
                if let Some(entry) = self.editor.pop() {
                    if entry.changed_in_place {
                        self.revisit_users_of(node);
                    }
                }
                return Ok(());
            }
            Reduction::Replaced(replacement) => replacement,
        };

        if replacement == node {
            // New inputs may need reducing before the node is final.
            self.editor.stack[depth].changed_in_place = true;
            let count = self.editor.graph().node(node).inputs().len();
            if self.descend(depth, node, 0..count) {
                return Ok(());
            }
            self.editor.pop();
            self.revisit_users_of(node);
        } else {
            self.editor.pop();
            self.editor.replace_with_max_id(node, replacement, max_id);
        }
        Ok(())
    }

    /// Push the first input in `indices` that still needs work, remembering
    /// where to resume. Returns whether anything was pushed.
    fn descend(
        &mut self,
        depth: usize,
        node: NodeId,
        indices: impl Iterator<Item = usize>,
    ) -> bool {
        for index in indices {
            let Some(input) = self.editor.graph().node(node).input(index) else {
                continue;
            };
            let input = self.editor.resolve_input(node, index, input);
            if input != node && self.editor.recurse(input) {
                self.editor.stack[depth].input_index = index + 1;
                return true;
            }
        }
        false
    }

    fn revisit_users_of(&mut self, node: NodeId) {
        // A pending whole-graph pass will reach the users anyway.
        if !self.editor.update_and_get_revisit_all_nodes() {
            self.editor.revisit_users(node);
        }
    }

    fn abort(&mut self, limit: usize, node: NodeId) -> ReduceError {
        tracing::error!(
            limit,
            node = %node,
            op = ?self.editor.graph().op(node),
            "reduction limit exceeded, abandoning run"
        );
        self.editor.abandon();
        self.editor.reset_counters();
        ReduceError::ReductionLimitExceeded { limit, node }
    }

    // =========================================================================
    // Arbitration
    // =========================================================================

    /// Offer `node` to every reducer.
    ///
    /// An in-place change restarts the round from the first reducer, minus
    /// the one that just fired; a replacement ends it.
    fn reduce(&mut self, node: NodeId) -> Reduction {
        self.reductions += 1;
        self.editor.stats.reductions += 1;

        let mut skip: Option<usize> = None;
        let mut index = 0;
        while index < self.reducers.len() {
            if skip == Some(index) {
                index += 1;
                continue;
            }
            match self.reducers[index].reduce(node, &mut self.editor) {
                Reduction::Unchanged => index += 1,
                Reduction::Replaced(replacement) if replacement == node => {
                    self.editor.stats.in_place_changes += 1;
                    if self.editor.config.trace_reductions {
                        tracing::debug!(
                            target: "prism_reducer::trace",
                            reducer = self.reducers[index].name(),
                            node = %node,
                            op = ?self.editor.graph().op(node),
                            "in-place update"
                        );
                    }
                    skip = Some(index);
                    index = 0;
                }
                Reduction::Replaced(replacement) => {
                    self.editor.stats.replacements += 1;
                    if self.editor.config.trace_reductions {
                        tracing::debug!(
                            target: "prism_reducer::trace",
                            reducer = self.reducers[index].name(),
                            node = %node,
                            op = ?self.editor.graph().op(node),
                            replacement = %replacement,
                            replacement_op = ?self.editor.graph().op(replacement),
                            "replaced"
                        );
                    }
                    return Reduction::Replaced(replacement);
                }
            }
        }

        match skip {
            Some(_) => Reduction::Replaced(node),
            None => Reduction::Unchanged,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
