//! Structural hoisting of an accepted candidate.
//!
//! A clone of the candidate is inserted right after the hoist point; the
//! candidate's future occurrences (its siblings) are then spliced out of
//! every path that now executes the clone. Hoisting a branch duplicates
//! the downstream subtree for the false arm; an aliasing guard wraps the
//! hoist in a synthetic branch whose false arm keeps the original order.

use crate::candidates::Candidate;
use crate::{PlanError, PlanResult};
use plait_graph::{Diagram, GraphError, Node, NodeId, NodeKind};
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// A dedup cursor: a position to scan for sibling occurrences, the branch
/// arm it committed to (when the hoisted node was a branch), and the
/// sibling ids as they are named in this copy of the subtree.
struct Cursor {
    node: NodeId,
    decision: Option<bool>,
    siblings: BTreeSet<NodeId>,
}

/// Rewrite `diagram` so a clone of `candidate` executes immediately after
/// `current`, preserving every observable path (modulo the candidate's
/// aliasing guard, when present).
pub fn hoist(diagram: &mut Diagram, current: NodeId, candidate: &Candidate) -> PlanResult<()> {
    let old_next = diagram
        .node(current)?
        .next()
        .ok_or(GraphError::MissingSuccessor(current))?;
    let template = diagram.node(candidate.node)?.clone();

    debug!(
        current = %current,
        candidate = %candidate.node,
        guarded = candidate.extra_condition.is_some(),
        "hoisting candidate"
    );

    let mut cursors: Vec<Cursor> = Vec::new();

    match &candidate.extra_condition {
        Some(guard) => {
            // Guarded hoist: only call candidates reach here.
            if !template.is_call() {
                return Err(PlanError::InvalidHoist {
                    node: candidate.node,
                    reason: "aliasing guards only apply to call candidates",
                });
            }
            let (skip_root, _) = diagram.clone_subtree(old_next)?;
            let clone_id = insert_call_clone(diagram, &template, old_next)?;
            let guard_id = diagram.fresh_id();
            diagram.insert(Node {
                id: guard_id,
                prev: Some(current),
                constraints: Vec::new(),
                kind: NodeKind::Branch {
                    condition: guard.clone(),
                    on_true: clone_id,
                    on_false: skip_root,
                },
            })?;
            diagram.node_mut(clone_id)?.prev = Some(guard_id);
            diagram.node_mut(skip_root)?.prev = Some(guard_id);
            diagram.node_mut(current)?.relink(old_next, guard_id);
            diagram.node_mut(old_next)?.prev = Some(clone_id);
            // The false arm keeps the original order, candidate occurrence
            // included, and is deliberately not scanned for siblings.
            cursors.push(Cursor {
                node: old_next,
                decision: None,
                siblings: candidate.siblings.clone(),
            });
        }
        None => match &template.kind {
            NodeKind::Call { .. } => {
                let clone_id = insert_call_clone(diagram, &template, old_next)?;
                diagram.node_mut(clone_id)?.prev = Some(current);
                diagram.node_mut(current)?.relink(old_next, clone_id);
                diagram.node_mut(old_next)?.prev = Some(clone_id);
                cursors.push(Cursor {
                    node: old_next,
                    decision: None,
                    siblings: candidate.siblings.clone(),
                });
            }
            NodeKind::Branch { condition, .. } => {
                // Both arms re-run the whole old continuation; the sibling
                // pass then prunes each arm down to its decision.
                let (false_root, remap) = diagram.clone_subtree(old_next)?;
                let clone_id = diagram.fresh_id();
                diagram.insert(Node {
                    id: clone_id,
                    prev: Some(current),
                    constraints: template.constraints.clone(),
                    kind: NodeKind::Branch {
                        condition: condition.clone(),
                        on_true: old_next,
                        on_false: false_root,
                    },
                })?;
                diagram.node_mut(current)?.relink(old_next, clone_id);
                diagram.node_mut(old_next)?.prev = Some(clone_id);
                diagram.node_mut(false_root)?.prev = Some(clone_id);
                let translated = candidate
                    .siblings
                    .iter()
                    .filter_map(|id| remap.get(id).copied())
                    .collect();
                cursors.push(Cursor {
                    node: old_next,
                    decision: Some(true),
                    siblings: candidate.siblings.clone(),
                });
                cursors.push(Cursor {
                    node: false_root,
                    decision: Some(false),
                    siblings: translated,
                });
            }
            _ => {
                return Err(PlanError::InvalidHoist {
                    node: candidate.node,
                    reason: "terminal nodes cannot be hoisted",
                })
            }
        },
    }

    splice_siblings(diagram, cursors)
}

/// Insert a fresh-id clone of a call node whose successor is `next`.
fn insert_call_clone(diagram: &mut Diagram, template: &Node, next: NodeId) -> PlanResult<NodeId> {
    let NodeKind::Call {
        call, generated, ..
    } = &template.kind
    else {
        return Err(PlanError::InvalidHoist {
            node: template.id,
            reason: "expected a call node",
        });
    };
    let id = diagram.fresh_id();
    diagram.insert(Node {
        id,
        prev: None,
        constraints: template.constraints.clone(),
        kind: NodeKind::Call {
            call: call.clone(),
            generated: generated.clone(),
            next: Some(next),
        },
    })?;
    Ok(id)
}

/// Walk every cursor to the terminals, splicing out each sibling occurrence
/// encountered. After a splice the new successor is examined again, so runs
/// of adjacent occurrences are fully removed.
fn splice_siblings(diagram: &mut Diagram, cursors: Vec<Cursor>) -> PlanResult<()> {
    let mut worklist = VecDeque::from(cursors);

    while let Some(mut cursor) = worklist.pop_front() {
        let shape = match &diagram.node(cursor.node)?.kind {
            NodeKind::Branch { .. } => Shape::Branch,
            NodeKind::Call { .. } => Shape::Call,
            _ => Shape::Terminal,
        };
        match shape {
            Shape::Branch => {
                for side in [true, false] {
                    loop {
                        let child = branch_child(diagram.node(cursor.node)?, side);
                        if !cursor.siblings.contains(&child) {
                            break;
                        }
                        let replacement = bypass(diagram, child, cursor.decision)?;
                        diagram.node_mut(cursor.node)?.relink(child, replacement);
                        diagram.node_mut(replacement)?.prev = Some(cursor.node);
                    }
                }
                let node = diagram.node(cursor.node)?;
                let (on_true, on_false) = (branch_child(node, true), branch_child(node, false));
                worklist.push_back(Cursor {
                    node: on_true,
                    decision: cursor.decision,
                    siblings: cursor.siblings.clone(),
                });
                worklist.push_back(Cursor {
                    node: on_false,
                    decision: cursor.decision,
                    siblings: cursor.siblings,
                });
            }
            Shape::Call => {
                loop {
                    let Some(next) = diagram.node(cursor.node)?.next() else {
                        // Dangling call: tolerated here, the integrity
                        // checker owns that diagnosis.
                        break;
                    };
                    if !cursor.siblings.contains(&next) {
                        cursor.node = next;
                        worklist.push_back(cursor);
                        break;
                    }
                    let replacement = bypass(diagram, next, cursor.decision)?;
                    diagram.node_mut(cursor.node)?.relink(next, replacement);
                    diagram.node_mut(replacement)?.prev = Some(cursor.node);
                }
            }
            Shape::Terminal => {}
        }
    }
    Ok(())
}

enum Shape {
    Branch,
    Call,
    Terminal,
}

fn branch_child(node: &Node, side: bool) -> NodeId {
    match &node.kind {
        NodeKind::Branch {
            on_true, on_false, ..
        } => {
            if side {
                *on_true
            } else {
                *on_false
            }
        }
        _ => unreachable!("branch_child on a non-branch node"),
    }
}

/// The node execution continues at once a sibling occurrence is removed:
/// a call's successor, or the branch arm selected by the cursor's decision.
fn bypass(diagram: &Diagram, sibling: NodeId, decision: Option<bool>) -> PlanResult<NodeId> {
    let node = diagram.node(sibling)?;
    match &node.kind {
        NodeKind::Call { next, .. } => next.ok_or_else(|| {
            PlanError::Graph(GraphError::MissingSuccessor(sibling))
        }),
        NodeKind::Branch { .. } => {
            let side = decision.ok_or(PlanError::MalformedBranch {
                node: sibling,
                reason: "splicing a duplicated branch requires a recorded branch decision",
            })?;
            Ok(branch_child(node, side))
        }
        _ => Err(PlanError::InvalidHoist {
            node: sibling,
            reason: "a terminal cannot be a sibling occurrence",
        }),
    }
}
