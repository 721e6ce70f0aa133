//! End-to-end scenarios for the reorder engine: enumerate candidates on a
//! small diagram, commit one, and check the rewritten structure.

use plait_expr::build::{constant, eq, not, packet_chunk, packet_select, symbol};
use plait_expr::ExprRef;
use plait_graph::{
    CallArg, CallDesc, Diagram, DiagramBuilder, NodeId, NodeKind, ProcessAction, SymbolDef,
};
use plait_planner::rewrite::hoist;
use plait_planner::{hoist_candidates, Oracle, PlannerConfig, SideEffects};
use plait_smt::QueryEngine;

fn map_call(function: &str, map: u64, key: &ExprRef) -> CallDesc {
    CallDesc::new(function)
        .with_arg("map", CallArg::value(constant(map, 64)))
        .with_arg("key", CallArg::pointer(key.clone()))
}

/// Function names along the single path from `root`, failing on branches.
fn path_functions(diagram: &Diagram, root: NodeId) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = Some(root);
    while let Some(id) = cursor {
        let node = diagram.node(id).unwrap();
        match &node.kind {
            NodeKind::Call { call, next, .. } => {
                out.push(call.function.clone());
                cursor = *next;
            }
            NodeKind::ReturnInit { .. } | NodeKind::ReturnProcess { .. } => cursor = None,
            NodeKind::Branch { .. } => panic!("unexpected branch on a straight-line path"),
        }
    }
    out
}

#[test]
fn straight_line_hoist_past_a_commuting_hazard() {
    let engine = QueryEngine::new();
    let effects = SideEffects::new();
    let config = PlannerConfig::default();
    let oracle = Oracle::new(&engine, &effects, &config);

    let mut b = DiagramBuilder::new();
    let a = b.call(map_call("map_get", 0x10, &constant(1, 32)), vec![]);
    let hazard = b.call(
        CallDesc::new("dchain_is_index_allocated")
            .with_arg("dchain", CallArg::value(constant(0x30, 64)))
            .with_arg("index", CallArg::value(constant(3, 32))),
        vec![],
    );
    let moved = b.call(map_call("map_get", 0x20, &constant(2, 32)), vec![]);
    let term = b.ret_process(ProcessAction::Drop);
    b.seq(&[a, hazard, moved, term]).unwrap();
    let mut d = b.finish_process(a).unwrap();

    let found = hoist_candidates(&oracle, &d, a).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node, moved);
    assert!(found[0].extra_condition.is_none());

    hoist(&mut d, a, &found[0]).unwrap();
    d.check_integrity().unwrap();

    // The clone executes right after the hoist point and the original
    // occurrence is spliced out of the continuation.
    assert_eq!(
        path_functions(&d, a),
        vec!["map_get", "map_get", "dchain_is_index_allocated"]
    );
    let clone = d.node(a).unwrap().next().unwrap();
    assert_ne!(clone, moved);
    let clone_node = d.node(clone).unwrap();
    assert_eq!(clone_node.as_call().unwrap().function, "map_get");
    assert_eq!(clone_node.next(), Some(hazard));
    assert_eq!(d.node(hazard).unwrap().next(), Some(term));
}

#[test]
fn ambiguous_keys_hoist_behind_a_guard_branch() {
    let engine = QueryEngine::new();
    let effects = SideEffects::new();
    let config = PlannerConfig::default();
    let oracle = Oracle::new(&engine, &effects, &config);

    let k1 = symbol("k1", 32);
    let k2 = symbol("k2", 32);

    let mut b = DiagramBuilder::new();
    // The root publishes both keys so the guard is expressible at the
    // hoist point.
    let root = b.call(
        CallDesc::new("packet_borrow_next_chunk"),
        vec![
            SymbolDef::new("k1", k1.clone()),
            SymbolDef::new("k2", k2.clone()),
            SymbolDef::new("packet_chunks", packet_chunk(0, 14)),
        ],
    );
    let first_put = b.call(map_call("map_put", 0x10, &k1), vec![]);
    let second_put = b.call(map_call("map_put", 0x10, &k2), vec![]);
    let term = b.ret_process(ProcessAction::Drop);
    b.seq(&[root, first_put, second_put, term]).unwrap();
    let mut d = b.finish_process(root).unwrap();

    let found = hoist_candidates(&oracle, &d, root).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node, second_put);
    let guard = found[0].extra_condition.clone().expect("aliasing guard");
    assert_eq!(guard, not(eq(k1.clone(), k2.clone())));

    hoist(&mut d, root, &found[0]).unwrap();
    d.check_integrity().unwrap();

    // A synthetic branch on the guard: hoisted order on the true arm, the
    // untouched original order on the false arm.
    let synthetic = d.node(root).unwrap().next().unwrap();
    let NodeKind::Branch {
        condition,
        on_true,
        on_false,
    } = &d.node(synthetic).unwrap().kind
    else {
        panic!("expected a guard branch after the hoist point");
    };
    assert_eq!(condition, &guard);
    assert_eq!(
        path_functions(&d, *on_true),
        vec!["map_put", "map_put"],
        "hoisted arm"
    );
    assert_eq!(
        path_functions(&d, *on_false),
        vec!["map_put", "map_put"],
        "original arm"
    );
    // True arm leads with the clone of the second put (key k2).
    let head = d.node(*on_true).unwrap();
    let head_key = head
        .as_call()
        .unwrap()
        .arg("key")
        .unwrap()
        .pointee
        .clone()
        .unwrap();
    assert_eq!(head_key, k2);
}

#[test]
fn side_effect_present_in_both_arms_hoists_above_the_branch() {
    let engine = QueryEngine::new();
    let effects = SideEffects::new();
    let config = PlannerConfig::default();
    let oracle = Oracle::new(&engine, &effects, &config);

    let mut b = DiagramBuilder::new();
    let put_true = b.call(map_call("map_put", 0x10, &constant(7, 32)), vec![]);
    let t1 = b.ret_process(ProcessAction::Drop);
    b.seq(&[put_true, t1]).unwrap();
    let put_false = b.call(map_call("map_put", 0x10, &constant(7, 32)), vec![]);
    let t2 = b.ret_process(ProcessAction::Forward { port: 1 });
    b.seq(&[put_false, t2]).unwrap();
    let cond = eq(symbol("flag", 32), constant(0, 32));
    let br = b.branch(cond, put_true, put_false).unwrap();
    let a = b.call(map_call("map_get", 0x20, &constant(1, 32)), vec![]);
    b.seq(&[a, br]).unwrap();
    let mut d = b.finish_process(a).unwrap();

    let found = hoist_candidates(&oracle, &d, a).unwrap();
    let candidate = found
        .iter()
        .find(|c| c.node == put_true)
        .expect("the put occurs in every arm and must be hoistable");
    assert!(candidate.siblings.contains(&put_true));
    assert!(candidate.siblings.contains(&put_false));

    hoist(&mut d, a, candidate).unwrap();
    d.check_integrity().unwrap();

    // One put before the branch, none left inside the arms.
    let hoisted = d.node(a).unwrap().next().unwrap();
    let hoisted_node = d.node(hoisted).unwrap();
    assert_eq!(hoisted_node.as_call().unwrap().function, "map_put");
    assert_eq!(hoisted_node.next(), Some(br));
    let NodeKind::Branch {
        on_true, on_false, ..
    } = &d.node(br).unwrap().kind
    else {
        panic!("branch survived the hoist");
    };
    assert_eq!(*on_true, t1);
    assert_eq!(*on_false, t2);
}

#[test]
fn packet_reads_gate_candidates_on_chunk_coverage() {
    let engine = QueryEngine::new();
    let effects = SideEffects::new();
    let config = PlannerConfig::default();
    let oracle = Oracle::new(&engine, &effects, &config);

    // The borrow delivered bytes [14, 34); a read of byte 14 is met, a
    // read of byte 34 is not.
    let mut b = DiagramBuilder::new();
    let borrow = b.call(
        CallDesc::new("packet_borrow_next_chunk"),
        vec![SymbolDef::new("packet_chunks", packet_chunk(14, 20))],
    );
    let filler = b.call(
        CallDesc::new("dchain_is_index_allocated")
            .with_arg("dchain", CallArg::value(constant(0x30, 64)))
            .with_arg("index", CallArg::value(constant(3, 32))),
        vec![],
    );
    let in_range = b.call(
        CallDesc::new("map_get")
            .with_arg("map", CallArg::value(constant(0x10, 64)))
            .with_arg("key", CallArg::pointer(packet_select(14))),
        vec![],
    );
    let out_of_range = b.call(
        CallDesc::new("map_get")
            .with_arg("map", CallArg::value(constant(0x20, 64)))
            .with_arg("key", CallArg::pointer(packet_select(34))),
        vec![],
    );
    let term = b.ret_process(ProcessAction::Drop);
    b.seq(&[borrow, filler, in_range, out_of_range, term]).unwrap();
    let d = b.finish_process(borrow).unwrap();

    let found = hoist_candidates(&oracle, &d, borrow).unwrap();
    assert!(found.iter().any(|c| c.node == in_range));
    assert!(!found.iter().any(|c| c.node == out_of_range));
}
