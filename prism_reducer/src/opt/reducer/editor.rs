//! Mutable reduction context.
//!
//! The [`Editor`] owns everything a reduction run mutates besides the reducer
//! list: the borrowed graph, the traversal stack, the revisit queue, per-node
//! state and the whole-graph revisit counters. Reducers receive it by `&mut`
//! so they can inspect and edit the graph and report follow-up work, while
//! the [`GraphReducer`](super::GraphReducer) keeps exclusive ownership of the
//! reducer list.
//!
//! # Replacement Protocol
//!
//! Replacing a node takes one of two routes, chosen by comparing the
//! replacement's id with a `max_id` snapshot taken before the reduction ran:
//!
//! - **Pre-existing replacement**: every use moves over and the node dies.
//!   While a whole-graph revisit is pending and lazy placeholders are on, the
//!   node is instead turned into a placeholder that forwards to the
//!   replacement, and its users are rewired when traversal next crosses them.
//! - **Fresh replacement**: only users that predate the reduction move over,
//!   so new nodes built around the old one keep pointing at it. The
//!   replacement is then scheduled for reduction itself.

use std::collections::VecDeque;

use smallvec::SmallVec;

use super::config::ReducerConfig;
use super::state::{NodeState, StateTable};
use super::stats::ReduceStats;
use crate::ir::{verify_edge_replacement, ControlOp, EdgeKind, Graph, NodeId, Operator};

/// Suspended traversal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct StackEntry {
    pub node: NodeId,
    /// Next input to look at when the frame resumes.
    pub input_index: usize,
    /// The node changed in place and still owes its users a revisit.
    pub changed_in_place: bool,
}

/// Reduction context handed to every [`Reducer`](super::Reducer).
pub struct Editor<'g> {
    pub(super) graph: &'g mut Graph,
    pub(super) config: ReducerConfig,
    dead: Option<NodeId>,
    pub(super) state: StateTable,
    pub(super) stack: Vec<StackEntry>,
    pub(super) revisit: VecDeque<NodeId>,
    traversed_uses: usize,
    visited_nodes: usize,
    revisit_all_nodes: bool,
    pub(super) stats: ReduceStats,
}

impl<'g> Editor<'g> {
    pub(super) fn new(graph: &'g mut Graph, config: ReducerConfig) -> Self {
        let capacity = graph.node_count();
        Editor {
            graph,
            config,
            dead: None,
            state: StateTable::new(capacity),
            stack: Vec::new(),
            revisit: VecDeque::new(),
            traversed_uses: 0,
            visited_nodes: 0,
            revisit_all_nodes: false,
            stats: ReduceStats::default(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut Graph {
        self.graph
    }

    #[inline]
    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Current traversal state of `node`.
    #[inline]
    pub fn state(&self, node: NodeId) -> NodeState {
        self.state.get(node)
    }

    /// The node exceptional paths are sent to once they become unreachable.
    /// Created on first use unless one was supplied up front.
    pub fn dead(&mut self) -> NodeId {
        match self.dead {
            Some(dead) if !self.graph.is_dead(dead) => dead,
            _ => {
                let dead = self.graph.add_node(Operator::Control(ControlOp::Dead), &[]);
                self.dead = Some(dead);
                dead
            }
        }
    }

    pub(super) fn set_dead(&mut self, dead: NodeId) {
        self.dead = Some(dead);
    }

    /// Largest id that exists right now. Anything allocated later is newer.
    #[inline]
    pub(super) fn max_id(&self) -> u32 {
        (self.graph.node_count() as u32).saturating_sub(1)
    }

    // =========================================================================
    // Stack / Queue
    // =========================================================================

    pub(super) fn push(&mut self, node: NodeId) {
        debug_assert_ne!(
            self.state.get(node),
            NodeState::OnStack,
            "{node} pushed twice"
        );
        tracing::trace!(node = %node, "push");
        self.state.set(node, NodeState::OnStack);
        self.stack.push(StackEntry {
            node,
            input_index: 0,
            changed_in_place: false,
        });
    }

    /// Pop the top frame and mark its node finalized.
    pub(super) fn pop(&mut self) -> Option<StackEntry> {
        let entry = self.stack.pop()?;
        self.state.set(entry.node, NodeState::Visited);
        self.visited_nodes += 1;
        self.stats.nodes_visited += 1;
        Some(entry)
    }

    /// Push `node` unless it is dead or already on the stack or finalized.
    pub(super) fn recurse(&mut self, node: NodeId) -> bool {
        if self.state.get(node) > NodeState::Revisit || self.graph.is_dead(node) {
            return false;
        }
        self.push(node);
        true
    }

    /// Queue a finalized node for another reduction.
    ///
    /// Nodes not yet finalized need nothing: they will be reduced anyway.
    pub fn revisit(&mut self, node: NodeId) {
        if self.state.get(node) != NodeState::Visited || self.graph.is_dead(node) {
            return;
        }
        tracing::trace!(node = %node, "revisit");
        self.traversed_uses += 1;
        self.stats.revisits_queued += 1;
        self.state.set(node, NodeState::Revisit);
        self.revisit.push_back(node);
    }

    /// Revisit every user of `node` except `node` itself.
    pub(super) fn revisit_users(&mut self, node: NodeId) {
        for user in self.graph.users(node) {
            if user != node {
                self.revisit(user);
            }
        }
    }

    /// Drop all pending work after an aborted run.
    pub(super) fn abandon(&mut self) {
        self.stack.clear();
        self.revisit.clear();
        self.state.reset();
    }

    // =========================================================================
    // Whole-Graph Revisit
    // =========================================================================

    pub(super) fn reset_counters(&mut self) {
        self.revisit_all_nodes = false;
        self.traversed_uses = 0;
        self.visited_nodes = 0;
    }

    /// Consult the revisit policy; once it fires it stays set until the next
    /// full pass starts.
    pub(super) fn update_and_get_revisit_all_nodes(&mut self) -> bool {
        if !self.revisit_all_nodes
            && self.config.revisit_threshold_enabled()
            && self.traversed_uses > 0
        {
            let threshold = self.config.revisit_threshold_percent as usize;
            if self.traversed_uses * 100 > threshold * self.visited_nodes {
                tracing::debug!(
                    traversed_uses = self.traversed_uses,
                    visited_nodes = self.visited_nodes,
                    threshold,
                    "revisit threshold exceeded, scheduling whole-graph pass"
                );
                self.revisit_all_nodes = true;
            }
        }
        self.revisit_all_nodes
    }

    /// Forget all state and start over from the end node.
    pub(super) fn restart_pass(&mut self) {
        self.reset_counters();
        self.state.reset();
        self.stats.whole_graph_restarts += 1;
        let end = self.graph.end();
        self.push(end);
    }

    // =========================================================================
    // Placeholders
    // =========================================================================

    /// Follow a placeholder chain to its final target, re-pointing every link
    /// at that target and killing links nobody uses any more.
    pub(super) fn resolve_forwarding(&mut self, node: NodeId) -> NodeId {
        let mut chain: SmallVec<[NodeId; 4]> = SmallVec::new();
        let mut target = node;
        while self.graph.node(target).is_placeholder() {
            chain.push(target);
            // All inputs of a placeholder name the same target.
            match self.graph.node(target).input(0) {
                Some(next) => target = next,
                None => {
                    debug_assert!(false, "placeholder {target} has no inputs");
                    break;
                }
            }
        }

        if chain.len() > 1 {
            for &link in &chain[..chain.len() - 1] {
                for index in 0..self.graph.node(link).inputs().len() {
                    self.graph.replace_input(link, index, target);
                }
            }
            for &link in &chain[1..] {
                if !self.graph.has_uses(link) {
                    self.kill(link);
                }
            }
        }
        target
    }

    /// Rewire input `index` of `node` past any placeholder and return the
    /// resolved input.
    pub(super) fn resolve_input(&mut self, node: NodeId, index: usize, input: NodeId) -> NodeId {
        if !self.graph.node(input).is_placeholder() {
            return input;
        }
        let target = self.resolve_forwarding(input);
        self.graph.replace_input(node, index, target);
        self.stats.placeholder_edges_resolved += 1;
        if !self.graph.has_uses(input) {
            self.kill(input);
        }
        target
    }

    /// Turn `node` into a placeholder forwarding to `replacement`.
    fn defer_replacement(&mut self, node: NodeId, replacement: NodeId) {
        let signature = self.graph.node(replacement).signature();
        self.graph.trim_inputs(node, 0);
        if !signature.has_outputs() || !self.graph.has_uses(node) {
            self.kill(node);
            return;
        }

        let op = Operator::placeholder_for(&signature);
        for _ in 0..op.signature().input_count() {
            self.graph.append_input(node, replacement);
        }
        self.graph.set_op(node, op);
        self.stats.placeholders_created += 1;
        tracing::trace!(node = %node, target = %replacement, "deferred replacement");
    }

    // =========================================================================
    // Replacement
    // =========================================================================

    fn kill(&mut self, node: NodeId) {
        self.graph.kill(node);
        self.stats.nodes_killed += 1;
    }

    /// Replace `node` by the pre-existing node `replacement` everywhere.
    pub fn replace(&mut self, node: NodeId, replacement: NodeId) {
        self.replace_with_max_id(node, replacement, u32::MAX);
    }

    /// Replace `node` by `replacement`, treating nodes with ids above
    /// `max_id` as created by the reduction that produced `replacement`.
    pub(crate) fn replace_with_max_id(&mut self, node: NodeId, replacement: NodeId, max_id: u32) {
        let replacement = self.resolve_forwarding(replacement);
        if node == self.graph.start() {
            self.graph.set_start(replacement);
        }
        if node == self.graph.end() {
            self.graph.set_end(replacement);
        }

        if replacement.index() <= max_id {
            if self.config.lazy_placeholders && self.update_and_get_revisit_all_nodes() {
                self.defer_replacement(node, replacement);
                return;
            }
            for edge in self.graph.use_edges(node) {
                if self.config.verify_edges {
                    if let Err(err) = verify_edge_replacement(self.graph, edge, replacement) {
                        panic!("invalid replacement of {node}: {err}");
                    }
                }
                self.graph.update_edge(edge, replacement);
                if edge.from != node {
                    self.revisit(edge.from);
                }
            }
            self.kill(node);
        } else {
            // Nodes built by this reduction may wrap `node`; leave them be.
            for edge in self.graph.use_edges(node) {
                if edge.from.index() <= max_id {
                    self.graph.update_edge(edge, replacement);
                    if edge.from != node {
                        self.revisit(edge.from);
                    }
                }
            }
            if !self.graph.has_uses(node) {
                self.kill(node);
            }
            self.recurse(replacement);
        }
    }

    /// Replace a value-producing `node` by separate value, effect and control
    /// successors, routing each use by its edge kind.
    ///
    /// Missing effect and control replacements default to the node's own
    /// effect and control inputs. A normal-continuation projection
    /// (`IfSuccess`) collapses onto `control`; an exceptional one
    /// (`IfException`) is cut off by pointing it at the dead node.
    pub fn replace_with_value(
        &mut self,
        node: NodeId,
        value: Option<NodeId>,
        effect: Option<NodeId>,
        control: Option<NodeId>,
    ) {
        let effect = effect.or_else(|| self.graph.node(node).effect_input());
        let control = control.or_else(|| self.graph.node(node).control_input());

        for edge in self.graph.use_edges(node) {
            // An earlier IfSuccess collapse may already have dropped this edge.
            if self.graph.edge_target(edge) != Some(node) {
                continue;
            }
            let user = edge.from;
            debug_assert!(!self.graph.is_dead(user), "dead user {user} of {node}");

            let target = match self.graph.edge_kind(edge) {
                EdgeKind::Control => match self.graph.op(user) {
                    Operator::Control(ControlOp::IfSuccess) => {
                        let control = required(control, EdgeKind::Control, node);
                        self.replace(user, control);
                        continue;
                    }
                    Operator::Control(ControlOp::IfException) => self.dead(),
                    _ => required(control, EdgeKind::Control, node),
                },
                EdgeKind::Effect => required(effect, EdgeKind::Effect, node),
                EdgeKind::Value => required(value, EdgeKind::Value, node),
            };
            self.graph.update_edge(edge, target);
            if user != node {
                self.revisit(user);
            }
        }
    }
}

fn required(replacement: Option<NodeId>, kind: EdgeKind, node: NodeId) -> NodeId {
    match replacement {
        Some(id) => id,
        None => panic!("{node} has a {kind:?} use but no {kind:?} replacement"),
    }
}

// =============================================================================
// Tests
// =============================================================================
