//! Free-symbol and packet-read harvesting.
//!
//! The dependency oracle needs to know, for any expression, which named
//! inputs it reads and which packet bytes it touches. `harvest` walks the
//! tree once and collects both.

use crate::ast::{ExprKind, ExprRef, PACKET_CHUNKS};
use crate::{ExprError, ExprResult};
use std::collections::BTreeSet;

/// Everything an expression reads.
#[derive(Debug, Default)]
pub struct ReadSet {
    /// Labels of free symbols and of every array read through `Select`.
    pub labels: BTreeSet<String>,
    /// Every `Select` of the `packet_chunks` array, verbatim.
    pub packet_reads: Vec<ExprRef>,
}

/// Collect the labels and packet reads referenced by an expression.
pub fn harvest(expr: &ExprRef) -> ReadSet {
    let mut out = ReadSet::default();
    walk(expr, &mut out);
    out
}

fn walk(expr: &ExprRef, out: &mut ReadSet) {
    match &expr.kind {
        ExprKind::Const(_) => {}
        ExprKind::Symbol(label) => {
            out.labels.insert(label.clone());
        }
        ExprKind::Select { array, index } => {
            out.labels.insert(array.clone());
            if array == PACKET_CHUNKS {
                out.packet_reads.push(expr.clone());
            }
            walk(index, out);
        }
        ExprKind::Concat(a, b)
        | ExprKind::And(a, b)
        | ExprKind::Or(a, b)
        | ExprKind::Eq(a, b)
        | ExprKind::Ult(a, b) => {
            walk(a, out);
            walk(b, out);
        }
        ExprKind::Extract { expr: inner, .. } | ExprKind::Not(inner) => walk(inner, out),
    }
}

/// Least constant byte offset read from `packet_chunks` by this expression.
///
/// This is the base of the chunk a packet borrow published; the chunk spans
/// `[base, base + width/8)` bytes.
pub fn chunk_base(chunk: &ExprRef) -> ExprResult<u64> {
    let reads = harvest(chunk).packet_reads;
    if reads.is_empty() {
        return Err(ExprError::NoPacketBytes);
    }
    let mut base = u64::MAX;
    for read in &reads {
        base = base.min(select_offset(read)?);
    }
    Ok(base)
}

/// Whether a single packet-byte read falls inside the byte range covered by
/// a chunk expression.
pub fn read_in_chunk(read: &ExprRef, chunk: &ExprRef) -> ExprResult<bool> {
    let offset = select_offset(read)?;
    let base = chunk_base(chunk)?;
    let size = u64::from(chunk.width / 8);
    Ok(offset >= base && offset < base + size)
}

fn select_offset(read: &ExprRef) -> ExprResult<u64> {
    match &read.kind {
        ExprKind::Select { index, .. } => index
            .as_const()
            .ok_or_else(|| ExprError::NonConstantPacketIndex(index.to_string())),
        _ => Err(ExprError::NoPacketBytes),
    }
}
