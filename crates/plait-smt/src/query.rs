//! Validity queries over expression pairs.

use crate::encode::{encode_bool, encode_equality};
use crate::QueryResult;
use plait_expr::ExprRef;
use plait_graph::CallDesc;
use tracing::warn;
use z3::ast::Bool;
use z3::{SatResult, Solver};

/// The planner's window onto the SMT solver.
///
/// All queries are validity checks: a property "always holds" when its
/// negation is unsatisfiable together with the supplied path constraints.
pub struct QueryEngine {
    solver: Solver,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            solver: Solver::new(),
        }
    }

    /// Whether the two expressions denote the same value in every model.
    pub fn always_equal(&self, a: &ExprRef, b: &ExprRef) -> QueryResult<bool> {
        self.always_equal_under(a, b, &[], &[])
    }

    /// `always_equal` under two path-constraint contexts (one per side).
    pub fn always_equal_under(
        &self,
        a: &ExprRef,
        b: &ExprRef,
        pc_a: &[ExprRef],
        pc_b: &[ExprRef],
    ) -> QueryResult<bool> {
        let eq = encode_equality(a, b)?;
        self.holds(eq, pc_a, pc_b)
    }

    /// Whether the two expressions differ in every model.
    pub fn always_not_equal(&self, a: &ExprRef, b: &ExprRef) -> QueryResult<bool> {
        self.always_not_equal_under(a, b, &[], &[])
    }

    pub fn always_not_equal_under(
        &self,
        a: &ExprRef,
        b: &ExprRef,
        pc_a: &[ExprRef],
        pc_b: &[ExprRef],
    ) -> QueryResult<bool> {
        let eq = encode_equality(a, b)?;
        self.holds(eq.not(), pc_a, pc_b)
    }

    /// Structural equality of two calls: same function, same argument
    /// shape, and provably equal values in every paired slot.
    pub fn calls_equal(&self, a: &CallDesc, b: &CallDesc) -> QueryResult<bool> {
        if a.function != b.function || a.args.len() != b.args.len() {
            return Ok(false);
        }
        for (name, arg_a) in &a.args {
            let Some(arg_b) = b.arg(name) else {
                return Ok(false);
            };
            if !self.opt_equal(&arg_a.expr, &arg_b.expr)?
                || !self.opt_equal(&arg_a.pointee, &arg_b.pointee)?
            {
                return Ok(false);
            }
        }
        self.opt_equal(&a.ret, &b.ret)
    }

    fn opt_equal(&self, a: &Option<ExprRef>, b: &Option<ExprRef>) -> QueryResult<bool> {
        match (a, b) {
            (None, None) => Ok(true),
            (Some(a), Some(b)) => self.always_equal(a, b),
            _ => Ok(false),
        }
    }

    /// Validity check: `property` holds in every model satisfying both
    /// constraint contexts. Everything is encoded before touching the
    /// solver so an encoding failure cannot leave a stale frame behind.
    fn holds(&self, property: Bool, pc_a: &[ExprRef], pc_b: &[ExprRef]) -> QueryResult<bool> {
        let mut assumptions = Vec::with_capacity(pc_a.len() + pc_b.len());
        for pc in pc_a.iter().chain(pc_b) {
            assumptions.push(encode_bool(pc)?);
        }
        self.solver.push();
        for assumption in &assumptions {
            self.solver.assert(assumption);
        }
        self.solver.assert(&property.not());
        let verdict = self.solver.check();
        self.solver.pop(1);
        match verdict {
            SatResult::Unsat => Ok(true),
            SatResult::Sat => Ok(false),
            SatResult::Unknown => {
                warn!("solver returned unknown; treating property as not proven");
                Ok(false)
            }
        }
    }
}
