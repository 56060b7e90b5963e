//! IR operator definitions.
//!
//! Only what the reducer needs to know about an operation is modelled here:
//! its identity (for reducers to match on) and its [`Signature`], i.e. how many
//! value, effect and control inputs it consumes and which kinds of output it
//! produces. Inputs are always laid out as `[values.., effects.., controls..]`,
//! which is what lets an edge be classified from its user's operator alone.

// =============================================================================
// Edge Kinds
// =============================================================================

/// Classification of a use-def edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Data dependency.
    Value,
    /// Ordering dependency between side effects.
    Effect,
    /// Control dependency.
    Control,
}

// =============================================================================
// Signature
// =============================================================================

/// Input arity and output kinds of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub value_inputs: u16,
    pub effect_inputs: u16,
    pub control_inputs: u16,
    pub value_outputs: u16,
    pub effect_outputs: u16,
    pub control_outputs: u16,
}

impl Signature {
    const fn new(inputs: (u16, u16, u16), outputs: (u16, u16, u16)) -> Self {
        Signature {
            value_inputs: inputs.0,
            effect_inputs: inputs.1,
            control_inputs: inputs.2,
            value_outputs: outputs.0,
            effect_outputs: outputs.1,
            control_outputs: outputs.2,
        }
    }

    /// Total number of inputs.
    #[inline]
    pub const fn input_count(&self) -> usize {
        (self.value_inputs + self.effect_inputs + self.control_inputs) as usize
    }

    /// Index of the first effect input.
    #[inline]
    pub const fn first_effect_index(&self) -> usize {
        self.value_inputs as usize
    }

    /// Index of the first control input.
    #[inline]
    pub const fn first_control_index(&self) -> usize {
        (self.value_inputs + self.effect_inputs) as usize
    }

    /// Classify the input slot `index`.
    ///
    /// Slots past the declared arity are treated as control, which only
    /// happens for malformed nodes that the graph verifier will reject.
    pub const fn edge_kind(&self, index: usize) -> EdgeKind {
        if index < self.first_effect_index() {
            EdgeKind::Value
        } else if index < self.first_control_index() {
            EdgeKind::Effect
        } else {
            EdgeKind::Control
        }
    }

    /// Whether the operator produces an output of `kind`.
    pub const fn produces(&self, kind: EdgeKind) -> bool {
        match kind {
            EdgeKind::Value => self.value_outputs > 0,
            EdgeKind::Effect => self.effect_outputs > 0,
            EdgeKind::Control => self.control_outputs > 0,
        }
    }

    /// Whether the operator produces any output at all.
    pub const fn has_outputs(&self) -> bool {
        self.value_outputs + self.effect_outputs + self.control_outputs > 0
    }
}

// =============================================================================
// Arithmetic / Comparison
// =============================================================================

/// Integer arithmetic kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArithOp {
    /// a + b
    Add = 0,
    /// a - b
    Sub = 1,
    /// a * b
    Mul = 2,
    /// a // b
    FloorDiv = 3,
    /// a % b
    Mod = 4,
    /// -a
    Neg = 16,
}

impl ArithOp {
    #[inline]
    pub const fn is_commutative(self) -> bool {
        matches!(self, ArithOp::Add | ArithOp::Mul)
    }

    #[inline]
    pub const fn is_unary(self) -> bool {
        (self as u8) >= 16
    }

    /// Right identity, if any (`x op e == x`).
    pub const fn identity(self) -> Option<i64> {
        match self {
            ArithOp::Add | ArithOp::Sub => Some(0),
            ArithOp::Mul | ArithOp::FloorDiv => Some(1),
            _ => None,
        }
    }

    /// Fold two constants. Returns `None` on overflow or division by zero.
    pub fn fold(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            ArithOp::Add => lhs.checked_add(rhs),
            ArithOp::Sub => lhs.checked_sub(rhs),
            ArithOp::Mul => lhs.checked_mul(rhs),
            ArithOp::FloorDiv if rhs != 0 => Some(lhs.div_euclid(rhs)),
            ArithOp::Mod if rhs != 0 => Some(lhs.rem_euclid(rhs)),
            ArithOp::Neg => lhs.checked_neg(),
            _ => None,
        }
    }
}

/// Integer comparison kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CmpOp {
    Lt = 0,
    Le = 1,
    Eq = 2,
    Ne = 3,
    Gt = 4,
    Ge = 5,
}

impl CmpOp {
    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

// =============================================================================
// Effectful Operations
// =============================================================================

/// Memory operation kind. The payload is a field offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    /// value <- object.field
    LoadField(u16),
    /// object.field <- value
    StoreField(u16),
}

/// Call kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallKind {
    Direct = 0,
    Method = 1,
    Runtime = 2,
}

// =============================================================================
// Control Flow
// =============================================================================

/// Control flow operation kind. Merge points carry their predecessor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    /// Graph entry.
    Start,
    /// Graph exit; merges every terminator.
    End(u16),
    /// Control merge.
    Region(u16),
    /// Loop header; input 0 is the entry, the rest are back edges.
    Loop(u16),
    /// Normal continuation of a throwing operation.
    IfSuccess,
    /// Exceptional continuation of a throwing operation.
    IfException,
    Return,
    Throw,
    /// Marker for unreachable code.
    Dead,
}

// =============================================================================
// Operator
// =============================================================================

/// An IR operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Constants
    ConstInt(i64),
    ConstBool(bool),
    /// Function argument; takes the start node as control input.
    Parameter(u16),

    // Pure
    IntOp(ArithOp),
    IntCmp(CmpOp),
    /// Value merge; inputs are the merged values followed by the region.
    Phi(u16),
    /// Extract the n-th value of a multi-valued producer.
    Projection(u8),

    // Effectful
    Memory(MemoryOp),
    Call(CallKind, u16),

    // Control
    Control(ControlOp),

    /// Deferred-rewrite marker forwarding each listed output kind to its
    /// input. Never reduced; resolved away by the graph reducer.
    Placeholder {
        value: bool,
        effect: bool,
        control: bool,
    },
}

impl Operator {
    /// Input arity and output kinds.
    pub const fn signature(&self) -> Signature {
        match *self {
            Operator::ConstInt(_) | Operator::ConstBool(_) => Signature::new((0, 0, 0), (1, 0, 0)),
            Operator::Parameter(_) => Signature::new((0, 0, 1), (1, 0, 0)),

            Operator::IntOp(op) => {
                let arity = if op.is_unary() { 1 } else { 2 };
                Signature::new((arity, 0, 0), (1, 0, 0))
            }
            Operator::IntCmp(_) => Signature::new((2, 0, 0), (1, 0, 0)),
            Operator::Phi(n) => Signature::new((n, 0, 1), (1, 0, 0)),
            Operator::Projection(_) => Signature::new((1, 0, 0), (1, 0, 0)),

            Operator::Memory(MemoryOp::LoadField(_)) => Signature::new((1, 1, 1), (1, 1, 0)),
            Operator::Memory(MemoryOp::StoreField(_)) => Signature::new((2, 1, 1), (0, 1, 0)),
            Operator::Call(_, argc) => Signature::new((argc, 1, 1), (1, 1, 1)),

            Operator::Control(op) => match op {
                ControlOp::Start => Signature::new((0, 0, 0), (1, 1, 1)),
                ControlOp::End(n) => Signature::new((0, 0, n), (0, 0, 0)),
                ControlOp::Region(n) | ControlOp::Loop(n) => Signature::new((0, 0, n), (0, 0, 1)),
                ControlOp::IfSuccess => Signature::new((0, 0, 1), (0, 0, 1)),
                ControlOp::IfException => Signature::new((0, 0, 1), (1, 1, 1)),
                ControlOp::Return => Signature::new((1, 1, 1), (0, 0, 1)),
                ControlOp::Throw => Signature::new((0, 1, 1), (0, 0, 1)),
                ControlOp::Dead => Signature::new((0, 0, 0), (1, 1, 1)),
            },

            Operator::Placeholder {
                value,
                effect,
                control,
            } => {
                let (v, e, c) = (value as u16, effect as u16, control as u16);
                Signature::new((v, e, c), (v, e, c))
            }
        }
    }

    /// Placeholder forwarding exactly the output kinds `signature` produces.
    pub const fn placeholder_for(signature: &Signature) -> Self {
        Operator::Placeholder {
            value: signature.value_outputs > 0,
            effect: signature.effect_outputs > 0,
            control: signature.control_outputs > 0,
        }
    }

    #[inline]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Operator::Placeholder { .. })
    }

    /// Check if this operator is commutative.
    pub const fn is_commutative(&self) -> bool {
        match self {
            Operator::IntOp(op) => op.is_commutative(),
            Operator::IntCmp(op) => matches!(op, CmpOp::Eq | CmpOp::Ne),
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
