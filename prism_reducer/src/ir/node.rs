//! IR node definitions.
//!
//! A node is an operator plus an ordered list of inputs (use-def edges) and an
//! unordered list of uses (def-use back edges). Both directions are kept in
//! sync by [`Graph`](super::graph::Graph); nodes never edit their own edges,
//! which is why the edge lists are only readable from outside this crate.
//!
//! # Node Structure
//!
//! - **Operator**: what the node computes, and its [`Signature`]
//! - **Inputs**: `[values.., effects.., controls..]`
//! - **Uses**: one [`Use`] per incoming edge, recording the user's input slot
//! - **Flags**: liveness

use smallvec::SmallVec;

use super::arena::Id;
use super::operators::{Operator, Signature};

// =============================================================================
// Node ID Type Alias
// =============================================================================

/// Unique identifier for a node in the graph.
pub type NodeId = Id<Node>;

// =============================================================================
// Input List
// =============================================================================

/// Maximum number of inline inputs before spilling to heap.
const INLINE_INPUTS: usize = 4;

/// Ordered input list, stored inline for the common small arities.
///
/// Phis and merges with many predecessors spill to the heap.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct InputList(SmallVec<[NodeId; INLINE_INPUTS]>);

impl InputList {
    pub fn new() -> Self {
        InputList(SmallVec::new())
    }

    pub fn from_slice(inputs: &[NodeId]) -> Self {
        InputList(SmallVec::from_slice(inputs))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.0.get(index).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[NodeId] {
        &self.0
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + ExactSizeIterator + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn set(&mut self, index: usize, value: NodeId) {
        self.0[index] = value;
    }

    pub(crate) fn push(&mut self, value: NodeId) {
        self.0.push(value);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}

impl std::fmt::Debug for InputList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

// =============================================================================
// Uses
// =============================================================================

/// One def-use back edge: `user.inputs[index]` refers to the owning node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: NodeId,
    pub index: u32,
}

/// A use-def edge viewed from its user: `from.inputs[index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub index: usize,
}

impl From<Use> for Edge {
    fn from(u: Use) -> Self {
        Edge {
            from: u.user,
            index: u.index as usize,
        }
    }
}

// =============================================================================
// Node
// =============================================================================

/// A node in the sea-of-nodes graph.
#[derive(Clone)]
pub struct Node {
    pub(crate) op: Operator,
    pub(crate) inputs: InputList,
    pub(crate) uses: SmallVec<[Use; 4]>,
    pub(crate) flags: NodeFlags,
}

impl Node {
    pub(crate) fn new(op: Operator, inputs: InputList) -> Self {
        Node {
            op,
            inputs,
            uses: SmallVec::new(),
            flags: NodeFlags::empty(),
        }
    }

    #[inline]
    pub fn op(&self) -> Operator {
        self.op
    }

    #[inline]
    pub fn signature(&self) -> Signature {
        self.op.signature()
    }

    #[inline]
    pub fn inputs(&self) -> &InputList {
        &self.inputs
    }

    #[inline]
    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index)
    }

    /// All incoming edges, one entry per (user, slot).
    #[inline]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    /// First effect input, if the operator takes one.
    pub fn effect_input(&self) -> Option<NodeId> {
        let sig = self.signature();
        if sig.effect_inputs == 0 {
            return None;
        }
        self.inputs.get(sig.first_effect_index())
    }

    /// First control input, if the operator takes one.
    pub fn control_input(&self) -> Option<NodeId> {
        let sig = self.signature();
        if sig.control_inputs == 0 {
            return None;
        }
        self.inputs.get(sig.first_control_index())
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.flags.contains(NodeFlags::DEAD)
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.op.is_placeholder()
    }

    /// Get as integer constant if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self.op {
            Operator::ConstInt(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool constant if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self.op {
            Operator::ConstBool(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.op)?;
        if !self.inputs.is_empty() {
            write!(f, " {:?}", self.inputs)?;
        }
        if self.is_dead() {
            write!(f, " (dead)")?;
        }
        Ok(())
    }
}

// =============================================================================
// Node Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for node properties.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Node was killed; it has no inputs and must not be reduced again.
        const DEAD = 0b0000_0001;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operators::{ArithOp, MemoryOp};

    fn ids(n: u32) -> Vec<NodeId> {
        (0..n).map(NodeId::new).collect()
    }

    #[test]
    fn test_input_list_spills_past_inline_limit() {
        let list = InputList::from_slice(&ids(6));
        assert_eq!(list.len(), 6);
        for (i, id) in list.iter().enumerate() {
            assert_eq!(id.as_usize(), i);
        }
        let reversed: Vec<NodeId> = list.iter().rev().collect();
        assert_eq!(reversed.first(), Some(&NodeId::new(5)));
        assert_eq!(reversed.len(), 6);
    }

    #[test]
    fn test_input_list_edit() {
        let mut list = InputList::new();
        assert!(list.is_empty());

        list.push(NodeId::new(1));
        list.push(NodeId::new(2));
        list.set(0, NodeId::new(9));
        assert_eq!(list.as_slice(), &[NodeId::new(9), NodeId::new(2)]);

        list.truncate(0);
        assert!(list.is_empty());
        assert_eq!(format!("{list:?}"), "[]");
    }

    #[test]
    fn test_effect_and_control_inputs() {
        let [obj, eff, ctl] = [NodeId::new(1), NodeId::new(2), NodeId::new(3)];
        let load = Node::new(
            Operator::Memory(MemoryOp::LoadField(0)),
            InputList::from_slice(&[obj, eff, ctl]),
        );
        assert_eq!(load.effect_input(), Some(eff));
        assert_eq!(load.control_input(), Some(ctl));

        let add = Node::new(
            Operator::IntOp(ArithOp::Add),
            InputList::from_slice(&[obj, obj]),
        );
        assert_eq!(add.effect_input(), None);
        assert_eq!(add.control_input(), None);
    }

    #[test]
    fn test_node_flags() {
        let mut node = Node::new(Operator::ConstInt(3), InputList::new());
        assert!(!node.is_dead());
        assert_eq!(node.as_int(), Some(3));

        node.flags.insert(NodeFlags::DEAD);
        assert!(node.is_dead());
        assert!(format!("{node:?}").ends_with("(dead)"));
    }

    #[test]
    fn test_use_to_edge() {
        let edge: Edge = Use {
            user: NodeId::new(4),
            index: 2,
        }
        .into();
        assert_eq!(edge.from, NodeId::new(4));
        assert_eq!(edge.index, 2);
    }
}
