//! Sea-of-Nodes graph structure.
//!
//! The graph provides:
//! - **Arena-based storage**: node ids are stable, creation-ordered indices
//! - **Def-use chains**: every input edge has a matching [`Use`] entry on its
//!   target, kept in sync by the edge mutators below
//! - **Sentinels**: replaceable `start` and `end` nodes
//!
//! All edge edits go through this type; the reducer never writes node inputs
//! directly.

use rustc_hash::FxHashSet;
use thiserror::Error;

use super::arena::Arena;
use super::node::{Edge, InputList, Node, NodeFlags, NodeId, Use};
use super::operators::{ArithOp, CmpOp, ControlOp, EdgeKind, Operator};

// =============================================================================
// Errors
// =============================================================================

/// Structural inconsistency reported by [`Graph::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {node} input {index} refers to unallocated node {input}")]
    DanglingInput {
        node: NodeId,
        index: usize,
        input: NodeId,
    },

    #[error("node {node} input {index} refers to dead node {input}")]
    DeadInput {
        node: NodeId,
        index: usize,
        input: NodeId,
    },

    #[error("node {node} has {actual} inputs but its operator expects {expected}")]
    ArityMismatch {
        node: NodeId,
        expected: usize,
        actual: usize,
    },

    #[error("use list of {node} disagrees with input {index} of {user}")]
    UseMismatch {
        node: NodeId,
        user: NodeId,
        index: usize,
    },

    #[error("dead node {node} still has edges")]
    DeadNodeHasEdges { node: NodeId },

    #[error("{which} sentinel {node} is dead")]
    DeadSentinel { which: &'static str, node: NodeId },
}

// =============================================================================
// Graph Structure
// =============================================================================

/// A Sea-of-Nodes graph.
#[derive(Clone)]
pub struct Graph {
    nodes: Arena<Node>,
    start: NodeId,
    end: NodeId,
}

impl Graph {
    /// Create a graph holding only `Start` and an `End` fed by it.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(node_capacity: usize) -> Self {
        let mut nodes = Arena::with_capacity(node_capacity.max(2));
        let start = nodes.alloc(Node::new(
            Operator::Control(ControlOp::Start),
            InputList::new(),
        ));
        let end = nodes.alloc(Node::new(
            Operator::Control(ControlOp::End(1)),
            InputList::from_slice(&[start]),
        ));
        nodes[start].uses.push(Use {
            user: end,
            index: 0,
        });

        Graph { nodes, start, end }
    }

    // =========================================================================
    // Node Access
    // =========================================================================

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn op(&self, id: NodeId) -> Operator {
        self.nodes[id].op
    }

    /// Number of nodes ever allocated, dead ones included.
    ///
    /// Since ids are dense, `node_count() - 1` is the largest id in use.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn start(&self) -> NodeId {
        self.start
    }

    #[inline]
    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn set_start(&mut self, start: NodeId) {
        self.start = start;
    }

    pub fn set_end(&mut self, end: NodeId) {
        self.end = end;
    }

    #[inline]
    pub fn is_dead(&self, id: NodeId) -> bool {
        self.nodes[id].is_dead()
    }

    // =========================================================================
    // Node Creation
    // =========================================================================

    /// Allocate a node and register its uses.
    pub fn add_node(&mut self, op: Operator, inputs: &[NodeId]) -> NodeId {
        debug_assert_eq!(
            inputs.len(),
            op.signature().input_count(),
            "wrong input count for {op:?}"
        );
        let id = self.nodes.alloc(Node::new(op, InputList::from_slice(inputs)));
        for (index, &input) in inputs.iter().enumerate() {
            self.add_use(input, id, index);
        }
        id
    }

    // =========================================================================
    // Def-Use Chains
    // =========================================================================

    /// Snapshot of every edge pointing at `id`.
    ///
    /// Returned by value so callers can rewrite edges while walking it.
    pub fn use_edges(&self, id: NodeId) -> Vec<Edge> {
        self.nodes[id].uses.iter().map(|&u| u.into()).collect()
    }

    /// Distinct users of `id`, in first-use order.
    pub fn users(&self, id: NodeId) -> Vec<NodeId> {
        let mut users: Vec<NodeId> = Vec::with_capacity(self.nodes[id].uses.len());
        for u in &self.nodes[id].uses {
            if !users.contains(&u.user) {
                users.push(u.user);
            }
        }
        users
    }

    #[inline]
    pub fn use_count(&self, id: NodeId) -> usize {
        self.nodes[id].uses.len()
    }

    #[inline]
    pub fn has_uses(&self, id: NodeId) -> bool {
        !self.nodes[id].uses.is_empty()
    }

    /// Classify an edge using its user's operator.
    pub fn edge_kind(&self, edge: Edge) -> EdgeKind {
        self.nodes[edge.from].signature().edge_kind(edge.index)
    }

    /// The node an edge currently points at.
    pub fn edge_target(&self, edge: Edge) -> Option<NodeId> {
        self.nodes[edge.from].inputs.get(edge.index)
    }

    fn add_use(&mut self, def: NodeId, user: NodeId, index: usize) {
        self.nodes[def].uses.push(Use {
            user,
            index: index as u32,
        });
    }

    fn remove_use(&mut self, def: NodeId, user: NodeId, index: usize) {
        let uses = &mut self.nodes[def].uses;
        let key = Use {
            user,
            index: index as u32,
        };
        if let Some(pos) = uses.iter().position(|&u| u == key) {
            uses.swap_remove(pos);
        }
    }

    // =========================================================================
    // Node Modification
    // =========================================================================

    /// Point input `index` of `node` at `new_input`.
    pub fn replace_input(&mut self, node: NodeId, index: usize, new_input: NodeId) {
        let old = self.nodes[node].inputs.get(index);
        debug_assert!(old.is_some(), "{node} has no input {index}");
        let Some(old) = old else { return };
        if old == new_input {
            return;
        }
        self.remove_use(old, node, index);
        self.nodes[node].inputs.set(index, new_input);
        self.add_use(new_input, node, index);
    }

    /// Redirect one edge.
    #[inline]
    pub fn update_edge(&mut self, edge: Edge, new_input: NodeId) {
        self.replace_input(edge.from, edge.index, new_input);
    }

    /// Append an input to `node`. The caller keeps the operator arity in step.
    pub fn append_input(&mut self, node: NodeId, input: NodeId) {
        let index = self.nodes[node].inputs.len();
        self.nodes[node].inputs.push(input);
        self.add_use(input, node, index);
    }

    /// Drop every input at position `len` and beyond.
    pub fn trim_inputs(&mut self, node: NodeId, len: usize) {
        let count = self.nodes[node].inputs.len();
        for index in len..count {
            if let Some(input) = self.nodes[node].inputs.get(index) {
                self.remove_use(input, node, index);
            }
        }
        self.nodes[node].inputs.truncate(len);
    }

    /// Change the operator of `node` in place.
    pub fn set_op(&mut self, node: NodeId, op: Operator) {
        self.nodes[node].op = op;
    }

    /// Feed another terminator into the end node.
    pub fn add_end_input(&mut self, terminator: NodeId) {
        let end = self.end;
        self.append_input(end, terminator);
        let arity = self.nodes[end].inputs.len() as u16;
        self.set_op(end, Operator::Control(ControlOp::End(arity)));
    }

    /// Rewrite every use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) {
        for edge in self.use_edges(old) {
            self.update_edge(edge, new);
        }
    }

    /// Disconnect `id` from its inputs and mark it dead.
    ///
    /// Callers must have moved every use off `id` first; a node whose only
    /// uses are its own inputs is fine, since those edges go away here.
    pub fn kill(&mut self, id: NodeId) {
        self.trim_inputs(id, 0);
        debug_assert!(
            self.nodes[id].uses.is_empty(),
            "killing {id} which is still used by {:?}",
            self.nodes[id].uses
        );
        self.nodes[id].flags.insert(NodeFlags::DEAD);
    }

    // =========================================================================
    // Constants
    // =========================================================================

    pub fn const_int(&mut self, value: i64) -> NodeId {
        self.add_node(Operator::ConstInt(value), &[])
    }

    pub fn const_bool(&mut self, value: bool) -> NodeId {
        self.add_node(Operator::ConstBool(value), &[])
    }

    pub fn parameter(&mut self, index: u16) -> NodeId {
        let start = self.start;
        self.add_node(Operator::Parameter(index), &[start])
    }

    // =========================================================================
    // Arithmetic / Comparison
    // =========================================================================

    pub fn int_op(&mut self, op: ArithOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(Operator::IntOp(op), &[lhs, rhs])
    }

    pub fn int_add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.int_op(ArithOp::Add, lhs, rhs)
    }

    pub fn int_mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.int_op(ArithOp::Mul, lhs, rhs)
    }

    pub fn int_cmp(&mut self, op: CmpOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(Operator::IntCmp(op), &[lhs, rhs])
    }

    // =========================================================================
    // Control Flow
    // =========================================================================

    pub fn region(&mut self, preds: &[NodeId]) -> NodeId {
        self.add_node(
            Operator::Control(ControlOp::Region(preds.len() as u16)),
            preds,
        )
    }

    /// Create a Phi merging `values` at `region`.
    pub fn phi(&mut self, region: NodeId, values: &[NodeId]) -> NodeId {
        let mut inputs = values.to_vec();
        inputs.push(region);
        self.add_node(Operator::Phi(values.len() as u16), &inputs)
    }

    /// Create a return node; the caller feeds it into the end node.
    pub fn return_value(&mut self, value: NodeId, effect: NodeId, control: NodeId) -> NodeId {
        self.add_node(
            Operator::Control(ControlOp::Return),
            &[value, effect, control],
        )
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes.ids()
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, n)| !n.is_dead())
            .map(|(id, _)| id)
    }

    /// Every node reachable from `root` by following inputs, `root` included.
    pub fn reachable_from(&self, root: NodeId) -> FxHashSet<NodeId> {
        let mut seen = FxHashSet::default();
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            if seen.insert(id) {
                worklist.extend(self.nodes[id].inputs.iter());
            }
        }
        seen
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Check that def-use chains mirror use-def edges and arities match.
    pub fn verify(&self) -> Result<(), GraphError> {
        for (which, node) in [("start", self.start), ("end", self.end)] {
            if self.nodes[node].is_dead() {
                return Err(GraphError::DeadSentinel { which, node });
            }
        }

        for (id, node) in self.iter() {
            if node.is_dead() {
                if !node.inputs.is_empty() || !node.uses.is_empty() {
                    return Err(GraphError::DeadNodeHasEdges { node: id });
                }
                continue;
            }

            let expected = node.signature().input_count();
            if node.inputs.len() != expected {
                return Err(GraphError::ArityMismatch {
                    node: id,
                    expected,
                    actual: node.inputs.len(),
                });
            }

            for (index, input) in node.inputs.iter().enumerate() {
                let Some(target) = self.nodes.get(input) else {
                    return Err(GraphError::DanglingInput {
                        node: id,
                        index,
                        input,
                    });
                };
                if target.is_dead() {
                    return Err(GraphError::DeadInput {
                        node: id,
                        index,
                        input,
                    });
                }
                let back = Use {
                    user: id,
                    index: index as u32,
                };
                if !target.uses.contains(&back) {
                    return Err(GraphError::UseMismatch {
                        node: input,
                        user: id,
                        index,
                    });
                }
            }

            for u in &node.uses {
                let edge = Edge::from(*u);
                if self.edge_target(edge) != Some(id) {
                    return Err(GraphError::UseMismatch {
                        node: id,
                        user: u.user,
                        index: edge.index,
                    });
                }
            }
        }

        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Graph ({} nodes, start {}, end {}):",
            self.nodes.len(),
            self.start,
            self.end
        )?;
        for (id, node) in self.iter() {
            writeln!(f, "  {:?}: {:?}", id, node)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operators::MemoryOp;

    #[test]
    fn test_graph_creation() {
        let g = Graph::new();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.node(g.end()).input(0), Some(g.start()));
        assert_eq!(g.users(g.start()), vec![g.end()]);
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_use_chains_record_slots() {
        let mut g = Graph::new();
        let c = g.const_int(5);
        let add1 = g.int_add(c, c);
        let add2 = g.int_add(c, c);

        assert_eq!(g.use_count(c), 4);
        assert_eq!(g.users(c), vec![add1, add2]);
        let edges = g.use_edges(c);
        assert!(edges.contains(&Edge {
            from: add1,
            index: 1
        }));
    }

    #[test]
    fn test_replace_input_moves_use() {
        let mut g = Graph::new();
        let a = g.const_int(1);
        let b = g.const_int(2);
        let add = g.int_add(a, a);

        g.replace_input(add, 1, b);

        assert_eq!(g.node(add).inputs().as_slice(), &[a, b]);
        assert_eq!(g.use_count(a), 1);
        assert_eq!(g.use_count(b), 1);
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_replace_all_uses() {
        let mut g = Graph::new();
        let c1 = g.const_int(5);
        let c2 = g.const_int(10);
        let add = g.int_add(c1, c1);

        g.replace_all_uses(c1, c2);

        assert_eq!(g.node(add).inputs().as_slice(), &[c2, c2]);
        assert!(!g.has_uses(c1));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_kill_detaches_inputs() {
        let mut g = Graph::new();
        let a = g.const_int(1);
        let neg = g.add_node(Operator::IntOp(ArithOp::Neg), &[a]);

        g.kill(neg);

        assert!(g.is_dead(neg));
        assert!(g.node(neg).inputs().is_empty());
        assert!(!g.has_uses(a));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_trim_and_append() {
        let mut g = Graph::new();
        let a = g.const_int(1);
        let b = g.const_int(2);
        let add = g.int_add(a, b);

        g.trim_inputs(add, 1);
        assert_eq!(g.use_count(b), 0);
        assert!(matches!(
            g.verify(),
            Err(GraphError::ArityMismatch { node, .. }) if node == add
        ));

        g.append_input(add, a);
        assert_eq!(g.node(add).inputs().as_slice(), &[a, a]);
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_edge_kinds() {
        let mut g = Graph::new();
        let start = g.start();
        let obj = g.parameter(0);
        let load = g.add_node(
            Operator::Memory(MemoryOp::LoadField(8)),
            &[obj, start, start],
        );

        assert_eq!(
            g.edge_kind(Edge {
                from: load,
                index: 0
            }),
            EdgeKind::Value
        );
        assert_eq!(
            g.edge_kind(Edge {
                from: load,
                index: 1
            }),
            EdgeKind::Effect
        );
        assert_eq!(
            g.edge_kind(Edge {
                from: load,
                index: 2
            }),
            EdgeKind::Control
        );
    }

    #[test]
    fn test_add_end_input_bumps_arity() {
        let mut g = Graph::new();
        let start = g.start();
        let v = g.const_int(0);
        let ret = g.return_value(v, start, start);

        g.add_end_input(ret);

        assert_eq!(g.op(g.end()), Operator::Control(ControlOp::End(2)));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_verify_detects_dead_input() {
        let mut g = Graph::new();
        let a = g.const_int(1);
        let b = g.const_int(2);
        let add = g.int_add(a, b);
        // Bypass the kill precondition to fabricate a broken graph.
        g.nodes[b].flags.insert(NodeFlags::DEAD);

        assert_eq!(
            g.verify(),
            Err(GraphError::DeadNodeHasEdges { node: b })
        );
        g.nodes[b].uses.clear();
        assert_eq!(
            g.verify(),
            Err(GraphError::DeadInput {
                node: add,
                index: 1,
                input: b
            })
        );
    }

    #[test]
    fn test_phi_layout() {
        let mut g = Graph::new();
        let region = g.region(&[g.start()]);
        let v1 = g.const_int(1);
        let phi = g.phi(region, &[v1]);

        assert_eq!(g.node(phi).control_input(), Some(region));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_reachable_from_end() {
        let mut g = Graph::new();
        let a = g.const_int(1);
        let orphan = g.const_int(2);
        let start = g.start();
        let ret = g.return_value(a, start, start);
        g.add_end_input(ret);

        let live = g.reachable_from(g.end());
        assert!(live.contains(&a));
        assert!(live.contains(&start));
        assert!(!live.contains(&orphan));
        assert_eq!(live.len(), 4);
    }
}
