//! Shared fixtures for reducer integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use prism_reducer::ir::{ArithOp, Graph, NodeId, Operator};
use prism_reducer::opt::{Editor, Reducer, Reduction};
use rustc_hash::FxHashMap;

static TRACING_INIT: Once = Once::new();

/// Install a subscriber when `RUST_LOG` is set, e.g.
/// `RUST_LOG=prism_reducer::trace=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_test_writer())
                .with(filter)
                .init();
        }
    });
}

// =============================================================================
// Graph Construction
// =============================================================================

/// Add `Return(value)` hanging off start and feed it into end.
pub fn returning(g: &mut Graph, value: NodeId) -> NodeId {
    let start = g.start();
    let ret = g.return_value(value, start, start);
    g.add_end_input(ret);
    ret
}

pub fn neg(g: &mut Graph, value: NodeId) -> NodeId {
    g.add_node(Operator::IntOp(ArithOp::Neg), &[value])
}

/// Binary operands of an integer op.
fn operands(g: &Graph, node: NodeId) -> Option<(ArithOp, NodeId, NodeId)> {
    let Operator::IntOp(op) = g.op(node) else {
        return None;
    };
    if op.is_unary() {
        return None;
    }
    let n = g.node(node);
    Some((op, n.input(0)?, n.input(1)?))
}

// =============================================================================
// Reducers
// =============================================================================

/// Folds integer arithmetic over constants into a fresh constant.
pub struct Fold;

impl Reducer for Fold {
    fn name(&self) -> &'static str {
        "Fold"
    }

    fn reduce(&mut self, node: NodeId, editor: &mut Editor<'_>) -> Reduction {
        let g = editor.graph();
        let Some((op, lhs, rhs)) = operands(g, node) else {
            return Reduction::Unchanged;
        };
        let (Some(l), Some(r)) = (g.node(lhs).as_int(), g.node(rhs).as_int()) else {
            return Reduction::Unchanged;
        };
        match op.fold(l, r) {
            Some(value) => Reduction::replace(editor.graph_mut().const_int(value)),
            None => Reduction::Unchanged,
        }
    }
}

/// `x op e => x` for a right identity `e`.
pub struct Identity;

impl Reducer for Identity {
    fn name(&self) -> &'static str {
        "Identity"
    }

    fn reduce(&mut self, node: NodeId, editor: &mut Editor<'_>) -> Reduction {
        let g = editor.graph();
        match operands(g, node) {
            Some((op, lhs, rhs))
                if op.identity().is_some() && g.node(rhs).as_int() == op.identity() =>
            {
                Reduction::replace(lhs)
            }
            _ => Reduction::Unchanged,
        }
    }
}

/// Moves a lone constant operand of a commutative op to the right.
pub struct Canonicalize;

impl Reducer for Canonicalize {
    fn name(&self) -> &'static str {
        "Canonicalize"
    }

    fn reduce(&mut self, node: NodeId, editor: &mut Editor<'_>) -> Reduction {
        let g = editor.graph();
        let Some((op, lhs, rhs)) = operands(g, node) else {
            return Reduction::Unchanged;
        };
        if !op.is_commutative() || g.node(lhs).as_int().is_none() || g.node(rhs).as_int().is_some()
        {
            return Reduction::Unchanged;
        }
        let g = editor.graph_mut();
        g.replace_input(node, 0, rhs);
        g.replace_input(node, 1, lhs);
        Reduction::changed(node)
    }
}

/// Shared log of `(reducer, node)` calls.
pub type CallLog = Rc<RefCell<Vec<(&'static str, NodeId)>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Records every node it sees; never changes anything.
pub struct Recorder {
    pub log: CallLog,
}

impl Reducer for Recorder {
    fn name(&self) -> &'static str {
        "Recorder"
    }

    fn reduce(&mut self, node: NodeId, _editor: &mut Editor<'_>) -> Reduction {
        self.log.borrow_mut().push(("Recorder", node));
        Reduction::Unchanged
    }
}

/// Asks for `target` to be revisited when it reduces `trigger`, once.
pub struct Poke {
    pub trigger: NodeId,
    pub target: NodeId,
    pub fired: bool,
}

impl Poke {
    pub fn new(trigger: NodeId, target: NodeId) -> Self {
        Self {
            trigger,
            target,
            fired: false,
        }
    }
}

impl Reducer for Poke {
    fn name(&self) -> &'static str {
        "Poke"
    }

    fn reduce(&mut self, node: NodeId, editor: &mut Editor<'_>) -> Reduction {
        if node == self.trigger && !self.fired {
            self.fired = true;
            editor.revisit(self.target);
        }
        Reduction::Unchanged
    }
}

// =============================================================================
// Inspection
// =============================================================================

/// Structural fingerprint of everything reachable from end.
///
/// Nodes are numbered in depth-first discovery order, so two graphs with the
/// same shape compare equal whatever ids their nodes carry.
pub fn shape(g: &Graph) -> Vec<String> {
    let mut numbering: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut order = Vec::new();
    let mut worklist = vec![g.end()];
    while let Some(id) = worklist.pop() {
        if numbering.contains_key(&id) {
            continue;
        }
        numbering.insert(id, order.len());
        order.push(id);
        worklist.extend(g.node(id).inputs().iter().rev());
    }

    order
        .iter()
        .map(|&id| {
            let inputs: Vec<usize> = g.node(id).inputs().iter().map(|i| numbering[&i]).collect();
            format!("{:?}{:?}", g.op(id), inputs)
        })
        .collect()
}

/// Evaluate pure integer arithmetic with wrapping semantics.
pub fn evaluate(g: &Graph, node: NodeId, params: &[i64]) -> i64 {
    match g.op(node) {
        Operator::ConstInt(v) => v,
        Operator::Parameter(k) => params[k as usize],
        Operator::IntOp(op) => {
            let n = g.node(node);
            let lhs = evaluate(g, n.input(0).unwrap(), params);
            if op.is_unary() {
                return lhs.wrapping_neg();
            }
            let rhs = evaluate(g, n.input(1).unwrap(), params);
            match op {
                ArithOp::Add => lhs.wrapping_add(rhs),
                ArithOp::Sub => lhs.wrapping_sub(rhs),
                ArithOp::Mul => lhs.wrapping_mul(rhs),
                other => panic!("unsupported op {other:?}"),
            }
        }
        other => panic!("cannot evaluate {other:?}"),
    }
}

/// Whether any placeholder is still reachable from end.
pub fn has_reachable_placeholder(g: &Graph) -> bool {
    g.reachable_from(g.end())
        .into_iter()
        .any(|id| g.node(id).is_placeholder())
}
