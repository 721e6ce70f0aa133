//! Dependency oracle: pure queries deciding whether a future node can be
//! executed earlier without changing observable behavior.
//!
//! Two independent notions of "safe":
//!
//! * **I/O**: every free symbol a node reads must already be producible by
//!   the symbols generated on the path up to the hoist point. Packet bytes
//!   are consumed in prefix order, so a packet read is only met once a
//!   borrowed chunk covers its offset.
//! * **Read/write**: every node the candidate would jump over must commute
//!   with it with respect to each stateful object kind (map, dchain,
//!   vector), possibly under a key-disequality guard.

use crate::config::PlannerConfig;
use crate::side_effects::SideEffects;
use crate::PlanResult;
use plait_expr::{build, harvest, read_in_chunk, ExprRef, PACKET_CHUNKS};
use plait_graph::{Diagram, Node, NodeId, NodeKind, SymbolDef};
use plait_smt::QueryEngine;

/// Can a hazard node be swapped past the moved node for one object kind?
#[derive(Debug, Clone)]
pub enum Commute {
    Always,
    Never,
    /// Commutes only on paths where the guard holds.
    Conditional(ExprRef),
}

/// Aggregate read/write verdict over every hazard on the jumped-over path.
#[derive(Debug, Clone)]
pub enum RwVerdict {
    Blocked,
    Met { guard: Option<ExprRef> },
}

/// The oracle borrows the session's solver, side-effect table and config.
pub struct Oracle<'a> {
    pub engine: &'a QueryEngine,
    pub effects: &'a SideEffects,
    pub config: &'a PlannerConfig,
}

impl<'a> Oracle<'a> {
    pub fn new(
        engine: &'a QueryEngine,
        effects: &'a SideEffects,
        config: &'a PlannerConfig,
    ) -> Self {
        Self {
            engine,
            effects,
            config,
        }
    }

    /// Every free symbol of `expr` is ignorable or present in `known`;
    /// every packet-byte read is covered by a known `packet_chunks` entry.
    /// Unknown symbols yield `false`, never an error.
    pub fn all_symbols_known(&self, expr: &ExprRef, known: &[SymbolDef]) -> PlanResult<bool> {
        let reads = harvest(expr);
        for label in &reads.labels {
            if self.config.should_ignore(label) {
                continue;
            }
            if !known.iter().any(|s| s.label == *label) {
                return Ok(false);
            }
        }
        for read in &reads.packet_reads {
            let mut covered = false;
            for symbol in known.iter().filter(|s| s.label == PACKET_CHUNKS) {
                if read_in_chunk(read, &symbol.expr)? {
                    covered = true;
                    break;
                }
            }
            if !covered {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// I/O dependencies of a node against an explicit symbol set. Reads of
    /// a Branch are its condition; of a Call, every argument value and
    /// pointee. Terminals read nothing executable and answer `false`.
    pub fn io_dependencies_met_with(
        &self,
        node: &Node,
        known: &[SymbolDef],
    ) -> PlanResult<bool> {
        match &node.kind {
            NodeKind::Branch { condition, .. } => self.all_symbols_known(condition, known),
            NodeKind::Call { call, .. } => {
                for arg in call.args.values() {
                    if let Some(expr) = &arg.expr {
                        if !self.all_symbols_known(expr, known)? {
                            return Ok(false);
                        }
                    }
                    if let Some(pointee) = &arg.pointee {
                        if !self.all_symbols_known(pointee, known)? {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
            NodeKind::ReturnInit { .. } | NodeKind::ReturnProcess { .. } => Ok(false),
        }
    }

    /// I/O dependencies of `next` relative to everything produced through
    /// `current`.
    pub fn io_dependencies_met(
        &self,
        diagram: &Diagram,
        current: NodeId,
        next: NodeId,
    ) -> PlanResult<bool> {
        let known = diagram.generated_symbols_up_to(current)?;
        self.io_dependencies_met_with(diagram.node(next)?, &known)
    }

    /// I/O dependencies of a bare expression relative to `current`.
    pub fn expr_dependencies_met(
        &self,
        diagram: &Diagram,
        current: NodeId,
        expr: &ExprRef,
    ) -> PlanResult<bool> {
        let known = diagram.generated_symbols_up_to(current)?;
        self.all_symbols_known(expr, &known)
    }

    /// Map commutation between a jumped-over `hazard` and the `moved`
    /// candidate (see module docs).
    pub fn map_commutes(
        &self,
        diagram: &Diagram,
        current: NodeId,
        hazard: &Node,
        moved: &Node,
    ) -> PlanResult<Commute> {
        self.keyed_commutes(diagram, current, hazard, moved, "map", KeySlot::Pointee("key"))
    }

    /// Vector commutation: object identity on the `vector` argument, index
    /// values compared instead of keys.
    pub fn vector_commutes(
        &self,
        diagram: &Diagram,
        current: NodeId,
        hazard: &Node,
        moved: &Node,
    ) -> PlanResult<Commute> {
        self.keyed_commutes(
            diagram,
            current,
            hazard,
            moved,
            "vector",
            KeySlot::Value("index"),
        )
    }

    /// Dchain commutation: no key refinement exists, so two side-effecting
    /// operations on the same allocator never commute.
    pub fn dchain_commutes(&self, hazard: &Node, moved: &Node) -> PlanResult<Commute> {
        let (Some(hazard_call), Some(moved_call)) = (hazard.as_call(), moved.as_call()) else {
            return Ok(Commute::Always);
        };
        if !self.effects.has_side_effects(&hazard_call.function)?
            && !self.effects.has_side_effects(&moved_call.function)?
        {
            return Ok(Commute::Always);
        }
        let (Some(obj_h), Some(obj_m)) = (
            hazard_call.arg("dchain").and_then(|a| a.expr.as_ref()),
            moved_call.arg("dchain").and_then(|a| a.expr.as_ref()),
        ) else {
            return Ok(Commute::Always);
        };
        if !self.engine.always_equal(obj_h, obj_m)? {
            return Ok(Commute::Always);
        }
        Ok(Commute::Never)
    }

    fn keyed_commutes(
        &self,
        diagram: &Diagram,
        current: NodeId,
        hazard: &Node,
        moved: &Node,
        object_arg: &str,
        key_slot: KeySlot<'_>,
    ) -> PlanResult<Commute> {
        let (Some(hazard_call), Some(moved_call)) = (hazard.as_call(), moved.as_call()) else {
            return Ok(Commute::Always);
        };
        let (Some(obj_h), Some(obj_m)) = (
            hazard_call.arg(object_arg).and_then(|a| a.expr.as_ref()),
            moved_call.arg(object_arg).and_then(|a| a.expr.as_ref()),
        ) else {
            return Ok(Commute::Always);
        };
        if !self.engine.always_equal(obj_h, obj_m)? {
            return Ok(Commute::Always);
        }
        if !self.effects.has_side_effects(&hazard_call.function)?
            && !self.effects.has_side_effects(&moved_call.function)?
        {
            return Ok(Commute::Always);
        }
        let (key_h, key_m) = match (
            key_slot.get(hazard_call),
            key_slot.get(moved_call),
        ) {
            (Some(h), Some(m)) => (h, m),
            // Same object, a side effect somewhere and no key to refine on.
            _ => return Ok(Commute::Never),
        };
        let (always_eq, always_ne) =
            self.key_relation(key_h, key_m, &hazard.constraints, &moved.constraints)?;
        if always_eq {
            return Ok(Commute::Never);
        }
        if always_ne {
            return Ok(Commute::Always);
        }
        let guard = build::not(build::eq(key_h.clone(), key_m.clone()));
        if self.expr_dependencies_met(diagram, current, &guard)? {
            Ok(Commute::Conditional(guard))
        } else {
            Ok(Commute::Never)
        }
    }

    /// Compare two keys under the full cross product of the nodes' path
    /// constraints, folding with logical AND: the relation only holds when
    /// it holds in every paired context. An empty constraint list stands
    /// for the unconstrained context.
    fn key_relation(
        &self,
        key_a: &ExprRef,
        key_b: &ExprRef,
        cs_a: &[ExprRef],
        cs_b: &[ExprRef],
    ) -> PlanResult<(bool, bool)> {
        let left: Vec<&[ExprRef]> = if cs_a.is_empty() {
            vec![&[]]
        } else {
            cs_a.iter().map(std::slice::from_ref).collect()
        };
        let right: Vec<&[ExprRef]> = if cs_b.is_empty() {
            vec![&[]]
        } else {
            cs_b.iter().map(std::slice::from_ref).collect()
        };
        let mut always_eq = true;
        let mut always_ne = true;
        for pc_a in &left {
            for pc_b in &right {
                if always_eq {
                    always_eq = self.engine.always_equal_under(key_a, key_b, pc_a, pc_b)?;
                }
                if always_ne {
                    always_ne = self
                        .engine
                        .always_not_equal_under(key_a, key_b, pc_a, pc_b)?;
                }
                if !always_eq && !always_ne {
                    return Ok((false, false));
                }
            }
        }
        Ok((always_eq, always_ne))
    }

    /// Read/write dependencies of hoisting `moved` directly after
    /// `current`: every node strictly between them is a hazard that must
    /// commute; conditional answers conjoin into one extra guard.
    pub fn rw_dependencies_met(
        &self,
        diagram: &Diagram,
        current: NodeId,
        moved: NodeId,
    ) -> PlanResult<RwVerdict> {
        let moved_node = diagram.node(moved)?;
        let mut guards: Vec<ExprRef> = Vec::new();
        let mut cursor = diagram.predecessor(moved)?;
        while cursor != current {
            let hazard = diagram.node(cursor)?;
            for verdict in [
                self.map_commutes(diagram, current, hazard, moved_node)?,
                self.dchain_commutes(hazard, moved_node)?,
                self.vector_commutes(diagram, current, hazard, moved_node)?,
            ] {
                match verdict {
                    Commute::Never => return Ok(RwVerdict::Blocked),
                    Commute::Conditional(guard) => guards.push(guard),
                    Commute::Always => {}
                }
            }
            cursor = diagram.predecessor(cursor)?;
        }
        let guard = guards.into_iter().reduce(build::and);
        Ok(RwVerdict::Met { guard })
    }
}

/// Where a commutation predicate finds its key within a call.
#[derive(Clone, Copy)]
enum KeySlot<'a> {
    /// Dereferenced input of the named argument.
    Pointee(&'a str),
    /// Passed value of the named argument.
    Value(&'a str),
}

impl KeySlot<'_> {
    fn get<'c>(&self, call: &'c plait_graph::CallDesc) -> Option<&'c ExprRef> {
        match self {
            KeySlot::Pointee(name) => call.arg(name).and_then(|a| a.pointee.as_ref()),
            KeySlot::Value(name) => call.arg(name).and_then(|a| a.expr.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plait_expr::build::{constant, eq, not, packet_chunk, packet_select, symbol};
    use plait_graph::{CallArg, CallDesc, DiagramBuilder, ProcessAction, SymbolDef};

    fn oracle_parts() -> (QueryEngine, SideEffects, PlannerConfig) {
        (QueryEngine::new(), SideEffects::new(), PlannerConfig::default())
    }

    fn map_call(function: &str, map: &ExprRef, key: &ExprRef) -> CallDesc {
        CallDesc::new(function)
            .with_arg("map", CallArg::value(map.clone()))
            .with_arg("key", CallArg::pointer(key.clone()))
    }

    #[test]
    fn packet_reads_must_be_covered_by_a_chunk() {
        let (engine, effects, config) = oracle_parts();
        let oracle = Oracle::new(&engine, &effects, &config);

        let ether_chunk = SymbolDef::new(PACKET_CHUNKS, packet_chunk(0, 14));
        let read_in = eq(packet_select(13), constant(0, 8));
        let read_out = eq(packet_select(14), constant(0, 8));

        let known = [ether_chunk];
        assert!(oracle.all_symbols_known(&read_in, &known).unwrap());
        assert!(!oracle.all_symbols_known(&read_out, &known).unwrap());
    }

    #[test]
    fn unknown_symbol_is_a_clean_false() {
        let (engine, effects, config) = oracle_parts();
        let oracle = Oracle::new(&engine, &effects, &config);
        let expr = eq(symbol("mystery", 32), constant(1, 32));
        assert!(!oracle.all_symbols_known(&expr, &[]).unwrap());
    }

    #[test]
    fn ignored_symbols_never_block() {
        let (engine, effects, config) = oracle_parts();
        let oracle = Oracle::new(&engine, &effects, &config);
        let expr = eq(symbol("device", 32), constant(0, 32));
        assert!(oracle.all_symbols_known(&expr, &[]).unwrap());
    }

    /// Builds `root -> hazard -> moved -> drop` and answers the aggregate
    /// read/write verdict of hoisting `moved` directly after `root`. The
    /// root publishes `k1`/`k2` so disequality guards are expressible at
    /// the hoist point.
    fn rw_over(hazard: CallDesc, moved: CallDesc) -> RwVerdict {
        let (engine, effects, config) = oracle_parts();
        let oracle = Oracle::new(&engine, &effects, &config);
        let mut b = DiagramBuilder::new();
        let root = b.call(
            CallDesc::new("packet_borrow_next_chunk"),
            vec![
                SymbolDef::new("k1", symbol("k1", 32)),
                SymbolDef::new("k2", symbol("k2", 32)),
            ],
        );
        let h = b.call(hazard, vec![]);
        let m = b.call(moved, vec![]);
        let term = b.ret_process(ProcessAction::Drop);
        b.seq(&[root, h, m, term]).unwrap();
        let d = b.finish_process(root).unwrap();
        oracle.rw_dependencies_met(&d, root, m).unwrap()
    }

    #[test]
    fn equal_keys_block_map_reorder() {
        let m = symbol("m", 64);
        let k = symbol("k", 32);
        let verdict = rw_over(map_call("map_put", &m, &k), map_call("map_put", &m, &k));
        assert!(matches!(verdict, RwVerdict::Blocked));
    }

    #[test]
    fn distinct_keys_commute_unconditionally() {
        let m = symbol("m", 64);
        let verdict = rw_over(
            map_call("map_put", &m, &constant(1, 32)),
            map_call("map_put", &m, &constant(2, 32)),
        );
        assert!(matches!(verdict, RwVerdict::Met { guard: None }));
    }

    #[test]
    fn ambiguous_keys_yield_a_guard() {
        let m = symbol("m", 64);
        let verdict = rw_over(
            map_call("map_put", &m, &symbol("k1", 32)),
            map_call("map_put", &m, &symbol("k2", 32)),
        );
        match verdict {
            RwVerdict::Met { guard: Some(guard) } => {
                let expected = not(eq(symbol("k1", 32), symbol("k2", 32)));
                assert_eq!(guard, expected);
            }
            other => panic!("expected a guarded verdict, got {other:?}"),
        }
    }

    #[test]
    fn pure_map_reads_always_commute() {
        let m = symbol("m", 64);
        let k = symbol("k", 32);
        let verdict = rw_over(map_call("map_get", &m, &k), map_call("map_get", &m, &k));
        assert!(matches!(verdict, RwVerdict::Met { guard: None }));
    }

    #[test]
    fn different_maps_always_commute() {
        let k = symbol("k", 32);
        let verdict = rw_over(
            map_call("map_put", &symbol("m1", 64), &k),
            map_call("map_put", &symbol("m2", 64), &k),
        );
        // Distinct free symbols are not *provably* different objects, so
        // identity is not established and the hazard is waved through.
        assert!(matches!(verdict, RwVerdict::Met { guard: None }));
    }

    #[test]
    fn same_dchain_side_effects_block() {
        let d = symbol("d", 64);
        let chain_call = |f: &str| {
            CallDesc::new(f)
                .with_arg("dchain", CallArg::value(d.clone()))
                .with_arg("index", CallArg::value(symbol("i", 32)))
        };
        let verdict = rw_over(
            chain_call("dchain_rejuvenate_index"),
            chain_call("dchain_rejuvenate_index"),
        );
        assert!(matches!(verdict, RwVerdict::Blocked));
    }

    #[test]
    fn pure_dchain_reads_commute() {
        let d = symbol("d", 64);
        let chain_call = |f: &str| {
            CallDesc::new(f)
                .with_arg("dchain", CallArg::value(d.clone()))
                .with_arg("index", CallArg::value(symbol("i", 32)))
        };
        let verdict = rw_over(
            chain_call("dchain_is_index_allocated"),
            chain_call("dchain_is_index_allocated"),
        );
        assert!(matches!(verdict, RwVerdict::Met { guard: None }));
    }
}
