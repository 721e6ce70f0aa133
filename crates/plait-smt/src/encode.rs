//! Expression-to-Z3 translation.

use crate::{QueryError, QueryResult};
use plait_expr::{Expr, ExprKind, ExprRef};
use z3::ast::{Ast, Bool, BV};

/// A translated term: expressions of width 1 built from boolean
/// connectives become `Bool`, everything else a bit-vector.
pub enum Term {
    Bool(Bool),
    Bv(BV),
}

impl Term {
    fn into_bool(self, origin: &Expr) -> QueryResult<Bool> {
        match self {
            Term::Bool(b) => Ok(b),
            Term::Bv(_) => Err(QueryError::Encode(format!(
                "expected a boolean term, got a bit-vector: {}",
                origin
            ))),
        }
    }

    fn into_bv(self, origin: &Expr) -> QueryResult<BV> {
        match self {
            Term::Bv(bv) => Ok(bv),
            Term::Bool(_) => Err(QueryError::Encode(format!(
                "expected a bit-vector term, got a boolean: {}",
                origin
            ))),
        }
    }
}

/// Encode an expression as a boolean term.
pub fn encode_bool(expr: &ExprRef) -> QueryResult<Bool> {
    encode(expr)?.into_bool(expr)
}

/// Encode an expression as a bit-vector term.
pub fn encode_bv(expr: &ExprRef) -> QueryResult<BV> {
    encode(expr)?.into_bv(expr)
}

/// `lhs = rhs` as a Z3 boolean, for same-sorted terms.
pub fn encode_equality(lhs: &ExprRef, rhs: &ExprRef) -> QueryResult<Bool> {
    if lhs.width != rhs.width {
        return Err(QueryError::WidthMismatch {
            left: lhs.width,
            right: rhs.width,
        });
    }
    match (encode(lhs)?, encode(rhs)?) {
        (Term::Bool(a), Term::Bool(b)) => Ok(a._eq(&b)),
        (Term::Bv(a), Term::Bv(b)) => Ok(a._eq(&b)),
        (Term::Bool(a), Term::Bv(b)) | (Term::Bv(b), Term::Bool(a)) => {
            // A 1-bit vector compared against a boolean connective.
            Ok(a._eq(&b._eq(&BV::from_u64(1, 1))))
        }
    }
}

pub fn encode(expr: &ExprRef) -> QueryResult<Term> {
    match &expr.kind {
        ExprKind::Const(v) => Ok(Term::Bv(BV::from_u64(*v, expr.width))),
        ExprKind::Symbol(label) => Ok(Term::Bv(BV::new_const(label.as_str(), expr.width))),
        ExprKind::Select { array, index } => {
            // Array cells are named constants keyed by the constant index,
            // so structurally identical reads denote the same value.
            let offset = index.as_const().ok_or_else(|| {
                QueryError::Encode(format!("non-constant array index: {}", index))
            })?;
            Ok(Term::Bv(BV::new_const(
                format!("{}!{}", array, offset),
                8,
            )))
        }
        ExprKind::Concat(hi, lo) => {
            let hi = encode_bv(hi)?;
            let lo = encode_bv(lo)?;
            Ok(Term::Bv(hi.concat(&lo)))
        }
        ExprKind::Extract { expr: inner, offset } => {
            let bv = encode_bv(inner)?;
            Ok(Term::Bv(bv.extract(offset + 7, *offset)))
        }
        ExprKind::Not(inner) => Ok(Term::Bool(encode_bool(inner)?.not())),
        ExprKind::And(a, b) => Ok(Term::Bool(Bool::and(&[
            encode_bool(a)?,
            encode_bool(b)?,
        ]))),
        ExprKind::Or(a, b) => Ok(Term::Bool(Bool::or(&[
            encode_bool(a)?,
            encode_bool(b)?,
        ]))),
        ExprKind::Eq(a, b) => Ok(Term::Bool(encode_equality(a, b)?)),
        ExprKind::Ult(a, b) => {
            let a = encode_bv(a)?;
            let b = encode_bv(b)?;
            Ok(Term::Bool(a.bvult(&b)))
        }
    }
}
