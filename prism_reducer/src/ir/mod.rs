//! Sea-of-Nodes Intermediate Representation.
//!
//! The minimal IR the graph reducer operates on:
//!
//! - **Arena** (`arena.rs`): creation-ordered node storage and side tables
//! - **Operators** (`operators.rs`): operations and their value/effect/control
//!   signatures
//! - **Node** (`node.rs`): node, input list, use and edge records
//! - **Graph** (`graph.rs`): def-use bookkeeping, sentinels, edge mutators
//! - **Verifier** (`verifier.rs`): edge replacement checks

pub mod arena;
pub mod graph;
pub mod node;
pub mod operators;
pub mod verifier;

pub use arena::{Arena, Id, SecondaryMap};
pub use graph::{Graph, GraphError};
pub use node::{Edge, InputList, Node, NodeFlags, NodeId, Use};
pub use operators::{ArithOp, CallKind, CmpOp, ControlOp, EdgeKind, MemoryOp, Operator, Signature};
pub use verifier::{verify_edge_replacement, VerifyError};
