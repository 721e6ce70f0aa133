//! Solver adapter: answers "are these two symbolic values always equal /
//! always distinct" under optional path-constraint contexts, by encoding
//! the expression IR into Z3 bit-vector terms.
//!
//! Queries are pure and independent (`push`/`pop` around each one); an
//! `unknown` verdict is treated as "not proven" and logged, never raised.

pub mod encode;
pub mod query;

pub use query::QueryEngine;

use thiserror::Error;

/// Encoding or solving error.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("cannot encode expression: {0}")]
    Encode(String),

    #[error("width mismatch: {left} vs {right} bits")]
    WidthMismatch { left: u32, right: u32 },
}

pub type QueryResult<T> = Result<T, QueryError>;
