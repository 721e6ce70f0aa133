//! Execution plans: a diagram plus the modules bound to it so far.
//!
//! Plans are value types with copy-on-write structure sharing: cloning is
//! cheap, and any mutation first detaches the clone's diagram, so the
//! pre-image stays observable (the search frontier holds many siblings of
//! every plan).

use crate::candidates::hoist_candidates;
use crate::modules::{Module, Target};
use crate::oracle::Oracle;
use crate::rewrite::hoist;
use crate::PlanResult;
use plait_expr::ExprRef;
use plait_graph::{Diagram, Node, NodeId};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Accounting for how much reordering a plan may still do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderTracker {
    Disabled,
    Enabled {
        performed: usize,
        budget: Option<usize>,
    },
}

impl ReorderTracker {
    pub fn from_config(config: &crate::config::PlannerConfig) -> Self {
        Self::new(config.enable_reorder, config.reorder_budget)
    }

    pub fn new(enabled: bool, budget: Option<usize>) -> Self {
        if enabled {
            ReorderTracker::Enabled {
                performed: 0,
                budget,
            }
        } else {
            ReorderTracker::Disabled
        }
    }

    pub fn allows(&self) -> bool {
        match self {
            ReorderTracker::Disabled => false,
            ReorderTracker::Enabled { performed, budget } => {
                budget.map_or(true, |limit| *performed < limit)
            }
        }
    }

    pub fn record(&mut self) {
        if let ReorderTracker::Enabled { performed, .. } = self {
            *performed += 1;
        }
    }

    pub fn performed(&self) -> usize {
        match self {
            ReorderTracker::Disabled => 0,
            ReorderTracker::Enabled { performed, .. } => *performed,
        }
    }
}

/// An execution plan under construction.
#[derive(Debug, Clone)]
pub struct Plan {
    diagram: Arc<Diagram>,
    /// Diagram node -> module realizing it.
    bindings: BTreeMap<NodeId, Module>,
    /// Nodes still waiting to be processed; the front is the active leaf.
    leaves: VecDeque<NodeId>,
    reorder: ReorderTracker,
    /// Reorder guards memoized per hoisted node id.
    memo: BTreeMap<NodeId, ExprRef>,
    /// Platform the plan is currently emitting for (None until the first
    /// placement pins it).
    platform: Option<Target>,
}

impl Plan {
    pub fn new(diagram: Diagram, reorder: ReorderTracker) -> Self {
        let leaves = diagram.process().into_iter().collect();
        Self {
            diagram: Arc::new(diagram),
            bindings: BTreeMap::new(),
            leaves,
            reorder,
            memo: BTreeMap::new(),
            platform: None,
        }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// Mutable view of the diagram; detaches shared structure first.
    pub fn diagram_mut(&mut self) -> &mut Diagram {
        Arc::make_mut(&mut self.diagram)
    }

    /// The node the active leaf will process next.
    pub fn next_node(&self) -> Option<NodeId> {
        self.leaves.front().copied()
    }

    pub fn is_terminal(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Bind a module to the active leaf's node and continue with the given
    /// successor leaves (none for terminals, two for branches).
    pub fn place(
        &self,
        node: NodeId,
        module: Module,
        continuations: impl IntoIterator<Item = NodeId>,
    ) -> Plan {
        let mut next = self.clone();
        next.bindings.insert(node, module);
        next.leaves.pop_front();
        // New leaves are processed before older ones: depth-first over the
        // diagram, so a pipeline is laid out path by path.
        for (i, leaf) in continuations.into_iter().enumerate() {
            next.leaves.insert(i, leaf);
        }
        next
    }

    /// Re-point the active leaf, e.g. after the underlying diagram was
    /// rewritten by a hoist.
    pub fn replace_active_leaf(&mut self, node: Option<NodeId>) {
        self.leaves.pop_front();
        if let Some(node) = node {
            self.leaves.push_front(node);
        }
    }

    /// Substitute a rewritten node into the diagram under its own id.
    pub fn replace_node(&mut self, node: Node) -> PlanResult<()> {
        self.diagram_mut().substitute(node)?;
        Ok(())
    }

    pub fn bindings(&self) -> &BTreeMap<NodeId, Module> {
        &self.bindings
    }

    pub fn placed_modules(&self) -> usize {
        self.bindings.len()
    }

    pub fn reorder(&self) -> &ReorderTracker {
        &self.reorder
    }

    pub fn reordered_nodes(&self) -> usize {
        self.reorder.performed()
    }

    pub fn record_reorder(&mut self) {
        self.reorder.record();
    }

    pub fn memoize(&mut self, node: NodeId, condition: ExprRef) {
        self.memo.insert(node, condition);
    }

    pub fn memo(&self) -> &BTreeMap<NodeId, ExprRef> {
        &self.memo
    }

    pub fn platform(&self) -> Option<Target> {
        self.platform
    }

    pub fn set_platform(&mut self, target: Target) {
        self.platform = Some(target);
    }
}

/// Spawn every legal reordered variant of a plan: for each hoistable
/// candidate relative to the node the plan just committed, fork the plan,
/// rewrite its diagram and advance the active leaf to the hoisted clone.
pub fn reordered_variants(oracle: &Oracle<'_>, plan: &Plan) -> PlanResult<Vec<Plan>> {
    if !plan.reorder().allows() {
        return Ok(Vec::new());
    }
    let Some(next) = plan.next_node() else {
        return Ok(Vec::new());
    };
    let diagram = plan.diagram();
    let Some(current) = diagram.node(next)?.prev else {
        return Ok(Vec::new());
    };
    if diagram.node(current)?.is_branch() {
        return Ok(Vec::new());
    }

    let candidates = hoist_candidates(oracle, diagram, current)?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    debug!(current = %current, candidates = candidates.len(), "spawning reordered variants");

    let mut variants = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let mut forked = plan.clone();
        if let Some(condition) = &candidate.condition {
            forked.memoize(candidate.node, condition.clone());
        }
        hoist(forked.diagram_mut(), current, &candidate)?;
        let resumed = forked.diagram().node(current)?.next();
        forked.replace_active_leaf(resumed);
        forked.record_reorder();
        variants.push(forked);
    }
    Ok(variants)
}
