//! Symbolic bit-vector expressions for the plait synthesis planner.
//!
//! Expressions are immutable, `Arc`-shared and structurally comparable.
//! They model the values a network function computes over packet bytes and
//! stateful data structures: named symbolic inputs, reads of symbolic
//! arrays (the distinguished `packet_chunks` array holds packet bytes),
//! and the usual bit-vector / boolean connectives.

pub mod ast;
pub mod build;
pub mod symbols;

pub use ast::{Expr, ExprKind, ExprRef, PACKET_CHUNKS};
pub use symbols::{chunk_base, harvest, read_in_chunk, ReadSet};

use thiserror::Error;

/// Malformed-expression error.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("packet read at a non-constant offset: {0}")]
    NonConstantPacketIndex(String),

    #[error("expression reads no packet bytes")]
    NoPacketBytes,
}

pub type ExprResult<T> = Result<T, ExprError>;
