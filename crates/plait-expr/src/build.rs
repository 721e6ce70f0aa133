//! Constructors for expression trees.
//!
//! Free functions rather than a builder object: expressions carry no
//! context, and call sites read better as `eq(a, b)` than through a
//! builder handle.

use crate::ast::{Expr, ExprKind, ExprRef, PACKET_CHUNKS};
use std::sync::Arc;

pub fn constant(bits: u64, width: u32) -> ExprRef {
    Arc::new(Expr {
        kind: ExprKind::Const(bits),
        width,
    })
}

pub fn symbol(label: impl Into<String>, width: u32) -> ExprRef {
    Arc::new(Expr {
        kind: ExprKind::Symbol(label.into()),
        width,
    })
}

/// 8-bit read of a named symbolic array.
pub fn select(array: impl Into<String>, index: ExprRef) -> ExprRef {
    Arc::new(Expr {
        kind: ExprKind::Select {
            array: array.into(),
            index,
        },
        width: 8,
    })
}

/// Read of a single packet byte at a constant offset.
pub fn packet_select(offset: u64) -> ExprRef {
    select(PACKET_CHUNKS, constant(offset, 32))
}

/// The value a packet borrow publishes: the concatenation of `len` packet
/// bytes starting at `base`, high byte last so the lowest offset is the
/// least significant byte.
pub fn packet_chunk(base: u64, len: u64) -> ExprRef {
    assert!(len > 0, "empty packet chunk");
    let mut acc = packet_select(base);
    for i in 1..len {
        acc = concat(packet_select(base + i), acc);
    }
    acc
}

pub fn concat(hi: ExprRef, lo: ExprRef) -> ExprRef {
    let width = hi.width + lo.width;
    Arc::new(Expr {
        kind: ExprKind::Concat(hi, lo),
        width,
    })
}

/// 8-bit extract at a bit offset.
pub fn extract_byte(expr: ExprRef, offset: u32) -> ExprRef {
    debug_assert!(offset + 8 <= expr.width);
    Arc::new(Expr {
        kind: ExprKind::Extract { expr, offset },
        width: 8,
    })
}

pub fn not(e: ExprRef) -> ExprRef {
    debug_assert!(e.is_bool());
    Arc::new(Expr {
        kind: ExprKind::Not(e),
        width: 1,
    })
}

pub fn and(a: ExprRef, b: ExprRef) -> ExprRef {
    debug_assert!(a.is_bool() && b.is_bool());
    Arc::new(Expr {
        kind: ExprKind::And(a, b),
        width: 1,
    })
}

pub fn or(a: ExprRef, b: ExprRef) -> ExprRef {
    debug_assert!(a.is_bool() && b.is_bool());
    Arc::new(Expr {
        kind: ExprKind::Or(a, b),
        width: 1,
    })
}

pub fn eq(a: ExprRef, b: ExprRef) -> ExprRef {
    debug_assert_eq!(a.width, b.width);
    Arc::new(Expr {
        kind: ExprKind::Eq(a, b),
        width: 1,
    })
}

pub fn ult(a: ExprRef, b: ExprRef) -> ExprRef {
    debug_assert_eq!(a.width, b.width);
    Arc::new(Expr {
        kind: ExprKind::Ult(a, b),
        width: 1,
    })
}
