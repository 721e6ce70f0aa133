//! Target-specific modules and the processing pass that places them.
//!
//! A module is a target-tagged realization of one diagram node. Placement
//! is offered to every module in the catalog; a module that does not
//! recognize the node (or the platform context) declines by returning no
//! plans, which is not an error. Successful placements additionally spawn
//! the reordered variants of each produced plan.

pub mod switch;
pub mod x86;

use crate::oracle::Oracle;
use crate::plan::{reordered_variants, Plan};
use crate::PlanResult;
use plait_expr::{build, harvest, ExprRef};
use plait_graph::{Diagram, NodeId, NodeKind};
use plait_smt::{QueryEngine, QueryResult};
use tracing::trace;

/// Packet-processing backend a module emits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    X86,
    Switch,
}

/// Tagged sum over every concrete module.
#[derive(Debug, Clone)]
pub enum Module {
    MapGet(x86::MapGet),
    DchainRejuvenateIndex(x86::DchainRejuvenateIndex),
    EtherAddrHash(x86::EtherAddrHash),
    If(x86::If),
    Drop(x86::Drop),
    Forward(x86::Forward),
    SendToController(switch::SendToController),
}

impl Module {
    pub fn target(&self) -> Target {
        match self {
            Module::MapGet(_)
            | Module::DchainRejuvenateIndex(_)
            | Module::EtherAddrHash(_)
            | Module::If(_)
            | Module::Drop(_)
            | Module::Forward(_) => Target::X86,
            Module::SendToController(_) => Target::Switch,
        }
    }

    /// The diagram node this module realizes.
    pub fn node(&self) -> NodeId {
        match self {
            Module::MapGet(m) => m.node,
            Module::DchainRejuvenateIndex(m) => m.node,
            Module::EtherAddrHash(m) => m.node,
            Module::If(m) => m.node,
            Module::Drop(m) => m.node,
            Module::Forward(m) => m.node,
            Module::SendToController(m) => m.node,
        }
    }

    /// Structural equality: same variant, provably equal bound values,
    /// identical generated-symbol sets.
    pub fn equals(&self, other: &Module, engine: &QueryEngine) -> QueryResult<bool> {
        match (self, other) {
            (Module::MapGet(a), Module::MapGet(b)) => a.equals(b, engine),
            (Module::DchainRejuvenateIndex(a), Module::DchainRejuvenateIndex(b)) => {
                a.equals(b, engine)
            }
            (Module::EtherAddrHash(a), Module::EtherAddrHash(b)) => a.equals(b, engine),
            (Module::If(a), Module::If(b)) => a.equals(b, engine),
            (Module::Drop(_), Module::Drop(_)) => Ok(true),
            (Module::Forward(a), Module::Forward(b)) => Ok(a.port == b.port),
            (Module::SendToController(a), Module::SendToController(b)) => {
                Ok(a.metadata_code_path == b.metadata_code_path)
            }
            _ => Ok(false),
        }
    }

    /// Double-dispatch into a plan visitor.
    pub fn visit(&self, visitor: &mut dyn PlanVisitor) {
        match self {
            Module::MapGet(m) => visitor.visit_map_get(m),
            Module::DchainRejuvenateIndex(m) => visitor.visit_dchain_rejuvenate_index(m),
            Module::EtherAddrHash(m) => visitor.visit_ether_addr_hash(m),
            Module::If(m) => visitor.visit_if(m),
            Module::Drop(m) => visitor.visit_drop(m),
            Module::Forward(m) => visitor.visit_forward(m),
            Module::SendToController(m) => visitor.visit_send_to_controller(m),
        }
    }
}

/// Visitor over placed modules; implementations override what they render.
pub trait PlanVisitor {
    fn visit_map_get(&mut self, _m: &x86::MapGet) {}
    fn visit_dchain_rejuvenate_index(&mut self, _m: &x86::DchainRejuvenateIndex) {}
    fn visit_ether_addr_hash(&mut self, _m: &x86::EtherAddrHash) {}
    fn visit_if(&mut self, _m: &x86::If) {}
    fn visit_drop(&mut self, _m: &x86::Drop) {}
    fn visit_forward(&mut self, _m: &x86::Forward) {}
    fn visit_send_to_controller(&mut self, _m: &switch::SendToController) {}
}

/// Placement prototypes, in offer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleTemplate {
    SendToController,
    MapGet,
    DchainRejuvenateIndex,
    EtherAddrHash,
    If,
    Drop,
    Forward,
}

impl ModuleTemplate {
    pub fn target(&self) -> Target {
        match self {
            ModuleTemplate::SendToController => Target::Switch,
            _ => Target::X86,
        }
    }

    fn try_place(&self, oracle: &Oracle<'_>, plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        match self {
            ModuleTemplate::SendToController => switch::SendToController::try_place(plan, node),
            ModuleTemplate::MapGet => x86::MapGet::try_place(plan, node),
            ModuleTemplate::DchainRejuvenateIndex => {
                x86::DchainRejuvenateIndex::try_place(plan, node)
            }
            ModuleTemplate::EtherAddrHash => x86::EtherAddrHash::try_place(plan, node),
            ModuleTemplate::If => x86::If::try_place(oracle, plan, node),
            ModuleTemplate::Drop => x86::Drop::try_place(plan, node),
            ModuleTemplate::Forward => x86::Forward::try_place(plan, node),
        }
    }
}

/// The module library offered to a planner session.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    templates: Vec<ModuleTemplate>,
}

impl ModuleCatalog {
    pub fn new(templates: Vec<ModuleTemplate>) -> Self {
        Self { templates }
    }

    /// Every known module.
    pub fn full() -> Self {
        Self::new(vec![
            ModuleTemplate::SendToController,
            ModuleTemplate::MapGet,
            ModuleTemplate::DchainRejuvenateIndex,
            ModuleTemplate::EtherAddrHash,
            ModuleTemplate::If,
            ModuleTemplate::Drop,
            ModuleTemplate::Forward,
        ])
    }

    /// The x86 fast-path subset.
    pub fn x86() -> Self {
        Self::new(vec![
            ModuleTemplate::MapGet,
            ModuleTemplate::DchainRejuvenateIndex,
            ModuleTemplate::EtherAddrHash,
            ModuleTemplate::If,
            ModuleTemplate::Drop,
            ModuleTemplate::Forward,
        ])
    }

    /// Offer the node to every template the platform context admits, then
    /// spawn reordered variants of each successful placement.
    pub fn process_node(
        &self,
        oracle: &Oracle<'_>,
        plan: &Plan,
        node: NodeId,
    ) -> PlanResult<Vec<Plan>> {
        let mut produced = Vec::new();
        for template in &self.templates {
            if let Some(platform) = plan.platform() {
                if platform != template.target() {
                    continue;
                }
            }
            let placed = template.try_place(oracle, plan, node)?;
            if !placed.is_empty() {
                trace!(node = %node, template = ?template, plans = placed.len(), "module placed");
            }
            produced.extend(placed);
        }
        let mut reordered = Vec::new();
        for plan in &produced {
            reordered.extend(reordered_variants(oracle, plan)?);
        }
        produced.extend(reordered);
        Ok(produced)
    }
}

/// A byte-level rewrite: the byte at `offset` becomes `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteModification {
    pub offset: u32,
    pub value: ExprRef,
}

/// Bytes that differ between two equal-width expressions, for header
/// modify modules.
pub fn byte_modifications(
    engine: &QueryEngine,
    before: &ExprRef,
    after: &ExprRef,
) -> PlanResult<Vec<ByteModification>> {
    debug_assert_eq!(before.width, after.width);
    let mut out = Vec::new();
    let mut offset = 0;
    while offset + 8 <= before.width {
        let old_byte = build::extract_byte(before.clone(), offset);
        let new_byte = build::extract_byte(after.clone(), offset);
        if !engine.always_equal(&old_byte, &new_byte)? {
            out.push(ByteModification {
                offset: offset / 8,
                value: new_byte,
            });
        }
        offset += 8;
    }
    Ok(out)
}

/// Whether a branch condition mentions a map-membership symbol.
pub fn mentions_map_membership(condition: &ExprRef) -> bool {
    harvest(condition)
        .labels
        .iter()
        .any(|label| label.contains("map_has_this_key"))
}

/// Nearest call on the prev-chain that publishes the given symbol label.
pub fn past_node_generating(
    diagram: &Diagram,
    from: NodeId,
    label: &str,
) -> PlanResult<Option<NodeId>> {
    let mut cursor = diagram.node(from)?.prev;
    while let Some(id) = cursor {
        let node = diagram.node(id)?;
        if node.generated().iter().any(|s| s.label == label) {
            return Ok(Some(id));
        }
        cursor = node.prev;
    }
    Ok(None)
}

/// Every earlier call to the given function, nearest first.
pub fn previous_calls_named(
    diagram: &Diagram,
    from: NodeId,
    function: &str,
) -> PlanResult<Vec<NodeId>> {
    let mut out = Vec::new();
    let mut cursor = diagram.node(from)?.prev;
    while let Some(id) = cursor {
        let node = diagram.node(id)?;
        if let Some(call) = node.as_call() {
            if call.function == function {
                out.push(id);
            }
        }
        cursor = node.prev;
    }
    Ok(out)
}

/// Shared placement guard: the node must be a call to `function`.
pub(crate) fn match_call<'d>(
    diagram: &'d Diagram,
    node: NodeId,
    function: &str,
) -> PlanResult<Option<&'d plait_graph::Node>> {
    let n = diagram.node(node)?;
    match &n.kind {
        NodeKind::Call { call, .. } if call.function == function => Ok(Some(n)),
        _ => Ok(None),
    }
}
