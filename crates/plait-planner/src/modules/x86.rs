//! x86 fast-path modules.

use crate::modules::{match_call, Module, Target};
use crate::oracle::Oracle;
use crate::plan::Plan;
use crate::PlanResult;
use plait_expr::ExprRef;
use plait_graph::{NodeId, NodeKind, ProcessAction, SymbolDef};
use plait_smt::{QueryEngine, QueryResult};

/// Associative-map lookup.
#[derive(Debug, Clone)]
pub struct MapGet {
    pub node: NodeId,
    pub map: ExprRef,
    pub key: ExprRef,
    pub generated: Vec<SymbolDef>,
}

impl MapGet {
    pub fn try_place(plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        let diagram = plan.diagram();
        let Some(n) = match_call(diagram, node, "map_get")? else {
            return Ok(Vec::new());
        };
        let Some(call) = n.as_call() else {
            return Ok(Vec::new());
        };
        let (Some(map), Some(key)) = (
            call.arg("map").and_then(|a| a.expr.clone()),
            call.arg("key").and_then(|a| a.pointee.clone()),
        ) else {
            return Ok(Vec::new());
        };
        let module = Module::MapGet(MapGet {
            node,
            map,
            key,
            generated: n.generated().to_vec(),
        });
        let mut placed = plan.place(node, module, n.next());
        placed.set_platform(Target::X86);
        Ok(vec![placed])
    }

    pub fn equals(&self, other: &MapGet, engine: &QueryEngine) -> QueryResult<bool> {
        Ok(engine.always_equal(&self.map, &other.map)?
            && engine.always_equal(&self.key, &other.key)?
            && self.generated == other.generated)
    }
}

/// Index-allocator refresh.
#[derive(Debug, Clone)]
pub struct DchainRejuvenateIndex {
    pub node: NodeId,
    pub chain: ExprRef,
    pub index: ExprRef,
    pub time: ExprRef,
}

impl DchainRejuvenateIndex {
    pub fn try_place(plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        let diagram = plan.diagram();
        let Some(n) = match_call(diagram, node, "dchain_rejuvenate_index")? else {
            return Ok(Vec::new());
        };
        let Some(call) = n.as_call() else {
            return Ok(Vec::new());
        };
        let (Some(chain), Some(index), Some(time)) = (
            call.arg("chain").and_then(|a| a.expr.clone()),
            call.arg("index").and_then(|a| a.expr.clone()),
            call.arg("time").and_then(|a| a.expr.clone()),
        ) else {
            return Ok(Vec::new());
        };
        let module = Module::DchainRejuvenateIndex(DchainRejuvenateIndex {
            node,
            chain,
            index,
            time,
        });
        let mut placed = plan.place(node, module, n.next());
        placed.set_platform(Target::X86);
        Ok(vec![placed])
    }

    pub fn equals(&self, other: &Self, engine: &QueryEngine) -> QueryResult<bool> {
        Ok(engine.always_equal(&self.chain, &other.chain)?
            && engine.always_equal(&self.index, &other.index)?
            && engine.always_equal(&self.time, &other.time)?)
    }
}

/// Ethernet-address hash.
#[derive(Debug, Clone)]
pub struct EtherAddrHash {
    pub node: NodeId,
    pub obj: ExprRef,
    pub hash: ExprRef,
    pub generated: Vec<SymbolDef>,
}

impl EtherAddrHash {
    pub fn try_place(plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        let diagram = plan.diagram();
        let Some(n) = match_call(diagram, node, "rte_ether_addr_hash")? else {
            return Ok(Vec::new());
        };
        let Some(call) = n.as_call() else {
            return Ok(Vec::new());
        };
        let (Some(obj), Some(hash)) = (
            call.arg("obj").and_then(|a| a.pointee.clone()),
            call.ret.clone(),
        ) else {
            return Ok(Vec::new());
        };
        let module = Module::EtherAddrHash(EtherAddrHash {
            node,
            obj,
            hash,
            generated: n.generated().to_vec(),
        });
        let mut placed = plan.place(node, module, n.next());
        placed.set_platform(Target::X86);
        Ok(vec![placed])
    }

    pub fn equals(&self, other: &Self, engine: &QueryEngine) -> QueryResult<bool> {
        Ok(engine.always_equal(&self.obj, &other.obj)?
            && engine.always_equal(&self.hash, &other.hash)?
            && self.generated == other.generated)
    }
}

/// Conditional jump on a symbolic predicate.
#[derive(Debug, Clone)]
pub struct If {
    pub node: NodeId,
    pub condition: ExprRef,
}

impl If {
    pub fn try_place(_oracle: &Oracle<'_>, plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        let diagram = plan.diagram();
        let n = diagram.node(node)?;
        let NodeKind::Branch {
            condition,
            on_true,
            on_false,
        } = &n.kind
        else {
            return Ok(Vec::new());
        };
        let module = Module::If(If {
            node,
            condition: condition.clone(),
        });
        let mut placed = plan.place(node, module, [*on_true, *on_false]);
        placed.set_platform(Target::X86);
        Ok(vec![placed])
    }

    pub fn equals(&self, other: &Self, engine: &QueryEngine) -> QueryResult<bool> {
        engine.always_equal(&self.condition, &other.condition)
    }
}

/// Terminal: discard the packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drop {
    pub node: NodeId,
}

impl Drop {
    pub fn try_place(plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        let n = plan.diagram().node(node)?;
        if !matches!(
            n.kind,
            NodeKind::ReturnProcess {
                action: ProcessAction::Drop
            }
        ) {
            return Ok(Vec::new());
        }
        let mut placed = plan.place(node, Module::Drop(Drop { node }), []);
        placed.set_platform(Target::X86);
        Ok(vec![placed])
    }
}

/// Terminal: emit the packet on a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub node: NodeId,
    pub port: u32,
}

impl Forward {
    pub fn try_place(plan: &Plan, node: NodeId) -> PlanResult<Vec<Plan>> {
        let n = plan.diagram().node(node)?;
        let NodeKind::ReturnProcess {
            action: ProcessAction::Forward { port },
        } = n.kind
        else {
            return Ok(Vec::new());
        };
        let mut placed = plan.place(node, Module::Forward(Forward { node, port }), []);
        placed.set_platform(Target::X86);
        Ok(vec![placed])
    }
}
