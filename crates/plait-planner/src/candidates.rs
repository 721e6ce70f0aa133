//! Enumeration of legally hoistable future nodes.

use crate::oracle::{Oracle, RwVerdict};
use crate::side_effects::SideEffects;
use crate::PlanResult;
use plait_expr::{build, ExprRef};
use plait_graph::{Diagram, NodeId, NodeKind};
use std::collections::{BTreeSet, VecDeque};
use tracing::trace;

/// A future node that may legally become the immediate successor of the
/// hoist point.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub node: NodeId,
    /// Every future occurrence of this node's signature that the rewrite
    /// will splice out, the candidate itself included.
    pub siblings: BTreeSet<NodeId>,
    /// Aliasing guard the hoist must branch on, if any.
    pub extra_condition: Option<ExprRef>,
    /// Conjunction of the branch conditions on the path from the hoist
    /// point to the candidate.
    pub condition: Option<ExprRef>,
}

/// Work item of the BFS: a node plus the accumulated branch-path condition.
#[derive(Debug, Clone)]
struct Pending {
    node: NodeId,
    condition: Option<ExprRef>,
}

fn conjoin(acc: &Option<ExprRef>, cond: ExprRef) -> Option<ExprRef> {
    Some(match acc {
        Some(prior) => build::and(prior.clone(), cond),
        None => cond,
    })
}

/// Enumerate the nodes reachable from `current`'s successor that can be
/// executed immediately after `current` without changing observable
/// behavior, in BFS order. Ranking is left to the surrounding heuristic.
pub fn hoist_candidates(
    oracle: &Oracle<'_>,
    diagram: &Diagram,
    current: NodeId,
) -> PlanResult<Vec<Candidate>> {
    let current_node = diagram.node(current)?;
    if current_node.is_branch() {
        return Ok(Vec::new());
    }
    let Some(next_id) = current_node.next() else {
        return Ok(Vec::new());
    };

    let mut queue: VecDeque<Pending> = VecDeque::new();
    let mut crossed_branch = false;

    match &diagram.node(next_id)?.kind {
        NodeKind::Branch {
            condition,
            on_true,
            on_false,
        } => {
            queue.push_back(Pending {
                node: *on_true,
                condition: Some(condition.clone()),
            });
            queue.push_back(Pending {
                node: *on_false,
                condition: Some(build::not(condition.clone())),
            });
            crossed_branch = true;
        }
        NodeKind::Call {
            next: Some(after_next),
            ..
        } => queue.push_back(Pending {
            node: *after_next,
            condition: None,
        }),
        // The successor is terminal: nothing lies beyond it to hoist.
        _ => return Ok(Vec::new()),
    }

    let mut accepted: Vec<Candidate> = Vec::new();

    while let Some(pending) = queue.pop_front() {
        let node = diagram.node(pending.node)?;

        // Keep walking before judging this node, accumulating the path
        // condition under which it executes.
        match &node.kind {
            NodeKind::Branch {
                condition,
                on_true,
                on_false,
            } => {
                crossed_branch = true;
                queue.push_back(Pending {
                    node: *on_true,
                    condition: conjoin(&pending.condition, condition.clone()),
                });
                queue.push_back(Pending {
                    node: *on_false,
                    condition: conjoin(&pending.condition, build::not(condition.clone())),
                });
            }
            NodeKind::Call {
                next: Some(next), ..
            } => queue.push_back(Pending {
                node: *next,
                condition: pending.condition.clone(),
            }),
            _ => {}
        }

        // Already claimed as a future occurrence of an accepted candidate.
        if accepted
            .iter()
            .any(|c| c.siblings.contains(&pending.node))
        {
            continue;
        }

        if !oracle.io_dependencies_met(diagram, current, pending.node)? {
            trace!(candidate = %pending.node, "rejected: unmet I/O dependencies");
            continue;
        }

        let mut extra_condition = None;
        if let Some(call) = node.as_call() {
            if !SideEffects::can_reorder(&call.function) {
                trace!(candidate = %pending.node, function = %call.function, "rejected: pinned");
                continue;
            }
            match oracle.rw_dependencies_met(diagram, current, pending.node)? {
                RwVerdict::Blocked => {
                    trace!(candidate = %pending.node, "rejected: read/write hazard");
                    continue;
                }
                RwVerdict::Met { guard } => extra_condition = guard,
            }
        }

        let mut siblings = BTreeSet::new();
        if oracle.effects.node_has_side_effects(node)? || crossed_branch {
            if !all_future_paths_execute(oracle, diagram, current, pending.node, &mut siblings)? {
                trace!(candidate = %pending.node, "rejected: absent from some future path");
                continue;
            }
        }

        siblings.insert(pending.node);
        accepted.push(Candidate {
            node: pending.node,
            siblings,
            extra_condition,
            condition: pending.condition,
        });
    }

    Ok(accepted)
}

/// Does every maximal path from `start` reach a node with the target's
/// signature (an SVL-equal call, or a branch with an SVL-equal condition)?
///
/// Matching occurrences are recorded as siblings and not descended past;
/// a path that ends without a match fails the whole query.
pub fn all_future_paths_execute(
    oracle: &Oracle<'_>,
    diagram: &Diagram,
    start: NodeId,
    target: NodeId,
    siblings: &mut BTreeSet<NodeId>,
) -> PlanResult<bool> {
    let target_node = diagram.node(target)?;
    let mut queue = VecDeque::from([start]);

    while let Some(id) = queue.pop_front() {
        let node = diagram.node(id)?;

        let matches = match (&node.kind, &target_node.kind) {
            (NodeKind::Call { call: a, .. }, NodeKind::Call { call: b, .. }) => {
                oracle.engine.calls_equal(a, b)?
            }
            (
                NodeKind::Branch { condition: ca, .. },
                NodeKind::Branch { condition: cb, .. },
            ) => oracle.engine.always_equal(ca, cb)?,
            _ => false,
        };
        if matches {
            siblings.insert(id);
            continue;
        }

        match &node.kind {
            NodeKind::Branch {
                on_true, on_false, ..
            } => {
                queue.push_back(*on_true);
                queue.push_back(*on_false);
            }
            NodeKind::Call {
                next: Some(next), ..
            } => queue.push_back(*next),
            // Terminal without a match: the target is skipped on this path.
            _ => return Ok(false),
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use plait_expr::build::{constant, eq, symbol};
    use plait_graph::{CallArg, CallDesc, DiagramBuilder, ProcessAction};
    use plait_smt::QueryEngine;

    /// Object addresses are concrete in lowered programs; constant keys
    /// keep the I/O oracle satisfied without upstream producers.
    fn map_call(function: &str, map: u64, key: &ExprRef) -> CallDesc {
        CallDesc::new(function)
            .with_arg("map", CallArg::value(constant(map, 64)))
            .with_arg("key", CallArg::pointer(key.clone()))
    }

    #[test]
    fn straight_line_candidate_past_a_commuting_hazard() {
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
        let d = b.finish_process(a).unwrap();

        let found = hoist_candidates(&oracle, &d, a).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, moved);
        assert!(found[0].extra_condition.is_none());
        assert!(found[0].siblings.contains(&moved));
    }

    #[test]
    fn pinned_function_is_never_a_candidate() {
        let engine = QueryEngine::new();
        let effects = SideEffects::new();
        let config = PlannerConfig::default();
        let oracle = Oracle::new(&engine, &effects, &config);

        let mut b = DiagramBuilder::new();
        let a = b.call(map_call("map_get", 0x10, &constant(1, 32)), vec![]);
        let hazard = b.call(map_call("map_get", 0x10, &constant(1, 32)), vec![]);
        let pinned = b.call(CallDesc::new("current_time"), vec![]);
        let term = b.ret_process(ProcessAction::Drop);
        b.seq(&[a, hazard, pinned, term]).unwrap();
        let d = b.finish_process(a).unwrap();

        let found = hoist_candidates(&oracle, &d, a).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn side_effecting_call_in_one_branch_only_is_rejected() {
        let engine = QueryEngine::new();
        let effects = SideEffects::new();
        let config = PlannerConfig::default();
        let oracle = Oracle::new(&engine, &effects, &config);

        let mut b = DiagramBuilder::new();
        let put = b.call(map_call("map_put", 0x10, &constant(7, 32)), vec![]);
        let t1 = b.ret_process(ProcessAction::Drop);
        b.seq(&[put, t1]).unwrap();
        let t2 = b.ret_process(ProcessAction::Forward { port: 1 });
        let cond = eq(symbol("flag", 32), constant(0, 32));
        let br = b.branch(cond, put, t2).unwrap();
        let a = b.call(map_call("map_get", 0x20, &constant(1, 32)), vec![]);
        b.seq(&[a, br]).unwrap();
        let d = b.finish_process(a).unwrap();

        let found = hoist_candidates(&oracle, &d, a).unwrap();
        // The put exists only on the true arm, so hoisting it above the
        // branch would execute it on paths that never did.
        assert!(!found.iter().any(|c| c.node == put));
    }
}
