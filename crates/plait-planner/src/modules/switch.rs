//! Programmable-switch modules.

use crate::modules::{Module, Target};
use crate::plan::Plan;
use crate::PlanResult;
use plait_graph::{Node, NodeId, NodeKind};
use tracing::debug;

/// Hand the packet to the controller's slow path.
///
/// The controller re-enters the program at the chosen node, so every call
/// leading up to it is duplicated as a prefix: the slow path re-executes
/// the setup before taking over, and the metadata code path records which
/// node the handoff happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendToController {
    pub node: NodeId,
    pub metadata_code_path: u64,
}

impl SendToController {
    pub fn try_place(plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        let n = plan.diagram().node(node)?;
        if n.is_return() {
            return Ok(Vec::new());
        }
        let mut forked = plan.clone();
        let chain_root = clone_calls(&mut forked, node)?;
        let module = Module::SendToController(SendToController {
            node,
            metadata_code_path: node.0,
        });
        let mut placed = forked.place(node, module, [chain_root]);
        // The controller path continues on the general-purpose target.
        placed.set_platform(Target::X86);
        debug!(node = %node, chain_root = %chain_root, "send-to-controller handoff");
        Ok(vec![placed])
    }
}

/// Duplicate every call on the prev-chain of `node` as a prefix chain and
/// rewire it in place of `node`, so the path now runs the duplicated setup
/// and then `node` itself. Returns the head of the rewired chain.
fn clone_calls(plan: &mut Plan, node: NodeId) -> PlanResult<NodeId> {
    let diagram = plan.diagram_mut();
    let Some(parent) = diagram.node(node)?.prev else {
        return Ok(node);
    };

    let mut head = node;
    let mut cursor = Some(parent);
    while let Some(at) = cursor {
        let ancestor = diagram.node(at)?;
        cursor = ancestor.prev;
        let copied = match &ancestor.kind {
            NodeKind::Call {
                call, generated, ..
            } => Some((call.clone(), generated.clone(), ancestor.constraints.clone())),
            _ => None,
        };
        if let Some((call, generated, constraints)) = copied {
            let id = diagram.fresh_id();
            diagram.insert(Node {
                id,
                prev: None,
                constraints,
                kind: NodeKind::Call {
                    call,
                    generated,
                    next: Some(head),
                },
            })?;
            diagram.node_mut(head)?.prev = Some(id);
            head = id;
        }
    }

    if head != node {
        diagram.node_mut(parent)?.relink(node, head);
        diagram.node_mut(head)?.prev = Some(parent);
    }
    Ok(head)
}
