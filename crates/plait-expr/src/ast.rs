//! Expression tree definition.

use std::fmt;
use std::sync::Arc;

/// Shared handle to an immutable expression.
pub type ExprRef = Arc<Expr>;

/// Name of the symbolic array holding raw packet bytes.
///
/// Reads of this array are ordered: a byte at offset `i` only becomes
/// available once a borrow has delivered the chunk covering `i`.
pub const PACKET_CHUNKS: &str = "packet_chunks";

/// A symbolic expression with an explicit bit width.
///
/// Boolean-valued expressions (`Not`, `And`, `Or`, `Eq`, `Ult`) have width 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    pub kind: ExprKind,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// Constant bit-vector value.
    Const(u64),
    /// Named symbolic input.
    Symbol(String),
    /// 8-bit read of a named symbolic array at an index.
    Select { array: String, index: ExprRef },
    /// Bit-vector concatenation, high part first.
    Concat(ExprRef, ExprRef),
    /// 8-bit extract starting at the given bit offset.
    Extract { expr: ExprRef, offset: u32 },
    /// Boolean negation.
    Not(ExprRef),
    And(ExprRef, ExprRef),
    Or(ExprRef, ExprRef),
    /// Bit-vector equality (operands of equal width).
    Eq(ExprRef, ExprRef),
    /// Unsigned less-than.
    Ult(ExprRef, ExprRef),
}

impl Expr {
    /// The constant value, if this is a `Const`.
    pub fn as_const(&self) -> Option<u64> {
        match self.kind {
            ExprKind::Const(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this expression is boolean-valued.
    pub fn is_bool(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Not(_)
                | ExprKind::And(..)
                | ExprKind::Or(..)
                | ExprKind::Eq(..)
                | ExprKind::Ult(..)
        )
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Const(v) => write!(f, "{:#x}:{}", v, self.width),
            ExprKind::Symbol(label) => write!(f, "{}:{}", label, self.width),
            ExprKind::Select { array, index } => write!(f, "{}[{}]", array, index),
            ExprKind::Concat(hi, lo) => write!(f, "({} ++ {})", hi, lo),
            ExprKind::Extract { expr, offset } => write!(f, "{}[{}+:8]", expr, offset),
            ExprKind::Not(e) => write!(f, "!{}", e),
            ExprKind::And(a, b) => write!(f, "({} & {})", a, b),
            ExprKind::Or(a, b) => write!(f, "({} | {})", a, b),
            ExprKind::Eq(a, b) => write!(f, "({} == {})", a, b),
            ExprKind::Ult(a, b) => write!(f, "({} < {})", a, b),
        }
    }
}
