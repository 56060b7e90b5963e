//! Per-node traversal state.

use crate::ir::node::Node;
use crate::ir::{NodeId, SecondaryMap};

/// Traversal status of a node.
///
/// The ordering is load-bearing: a node may be pushed only while it is below
/// [`NodeState::OnStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum NodeState {
    #[default]
    Unvisited = 0,
    /// Finalized once, then an input changed; waiting in the revisit queue.
    Revisit = 1,
    OnStack = 2,
    Visited = 3,
}

/// State table covering every node, including ones created mid-pass.
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    states: SecondaryMap<Node, NodeState>,
}

impl StateTable {
    pub fn new(capacity: usize) -> Self {
        StateTable {
            states: SecondaryMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn get(&self, node: NodeId) -> NodeState {
        self.states.value(node)
    }

    #[inline]
    pub fn set(&mut self, node: NodeId, state: NodeState) {
        self.states.set(node, state);
    }

    /// Put every node back to [`NodeState::Unvisited`].
    pub fn reset(&mut self) {
        self.states.clear();
    }
}
