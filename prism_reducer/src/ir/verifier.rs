//! Edge replacement verification.
//!
//! Checked before the reducer redirects an edge to a new target: the target
//! must be alive, must not be a forwarding placeholder, and must produce the
//! kind of output the edge consumes. A failure means a reducer asked for a
//! rewrite that would break the IR, which is a bug, never a recoverable
//! condition.

use thiserror::Error;

use super::graph::Graph;
use super::node::{Edge, NodeId};
use super::operators::EdgeKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("edge {edge:?} redirected to dead node {replacement}")]
    DeadReplacement { edge: Edge, replacement: NodeId },

    #[error("edge {edge:?} redirected to placeholder {replacement}")]
    ReplacementIsPlaceholder { edge: Edge, replacement: NodeId },

    #[error("{kind:?} edge {edge:?} redirected to {replacement}, which has no {kind:?} output")]
    MissingOutput {
        edge: Edge,
        kind: EdgeKind,
        replacement: NodeId,
    },
}

/// Verify that `edge` may be redirected to `replacement`.
pub fn verify_edge_replacement(
    graph: &Graph,
    edge: Edge,
    replacement: NodeId,
) -> Result<(), VerifyError> {
    let target = graph.node(replacement);
    if target.is_dead() {
        return Err(VerifyError::DeadReplacement { edge, replacement });
    }
    if target.is_placeholder() {
        return Err(VerifyError::ReplacementIsPlaceholder { edge, replacement });
    }
    let kind = graph.edge_kind(edge);
    if !target.signature().produces(kind) {
        return Err(VerifyError::MissingOutput {
            edge,
            kind,
            replacement,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operators::{ControlOp, MemoryOp, Operator};

    #[test]
    fn test_value_edge_accepts_value_producer() {
        let mut g = Graph::new();
        let a = g.const_int(1);
        let b = g.const_int(2);
        let add = g.int_add(a, a);

        let edge = Edge { from: add, index: 0 };
        assert_eq!(verify_edge_replacement(&g, edge, b), Ok(()));
    }

    #[test]
    fn test_effect_edge_rejects_pure_node() {
        let mut g = Graph::new();
        let start = g.start();
        let obj = g.parameter(0);
        let load = g.add_node(
            Operator::Memory(MemoryOp::LoadField(0)),
            &[obj, start, start],
        );

        let edge = Edge { from: load, index: 1 };
        assert_eq!(
            verify_edge_replacement(&g, edge, obj),
            Err(VerifyError::MissingOutput {
                edge,
                kind: EdgeKind::Effect,
                replacement: obj
            })
        );
    }

    #[test]
    fn test_rejects_dead_and_placeholder_targets() {
        let mut g = Graph::new();
        let a = g.const_int(1);
        let b = g.const_int(2);
        let add = g.int_add(a, a);
        g.kill(b);

        let edge = Edge { from: add, index: 0 };
        assert!(matches!(
            verify_edge_replacement(&g, edge, b),
            Err(VerifyError::DeadReplacement { .. })
        ));

        let dead = g.add_node(Operator::Control(ControlOp::Dead), &[]);
        let op = Operator::placeholder_for(&g.node(dead).signature());
        let ph = g.add_node(op, &[dead, dead, dead]);
        assert!(matches!(
            verify_edge_replacement(&g, edge, ph),
            Err(VerifyError::ReplacementIsPlaceholder { .. })
        ));
    }
}
