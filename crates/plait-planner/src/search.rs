//! Best-first search over the plan frontier.

use crate::config::PlannerConfig;
use crate::heuristics::{least_reordered_score, Score};
use crate::modules::ModuleCatalog;
use crate::oracle::Oracle;
use crate::plan::Plan;
use crate::{PlanError, PlanResult};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Frontier entry: score first, then the per-session plan number so equal
/// scores pop in creation order. Determinism never rests on addresses.
struct Scored {
    score: Score,
    seq: u64,
    plan: Plan,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// One planner session: a frontier of candidate plans driven to a terminal
/// plan. Plan numbering restarts with every session, so runs reproduce.
pub struct Search {
    catalog: ModuleCatalog,
    frontier: BinaryHeap<Scored>,
    next_seq: u64,
}

impl Search {
    pub fn new(catalog: ModuleCatalog, initial: Plan) -> Self {
        let mut search = Self {
            catalog,
            frontier: BinaryHeap::new(),
            next_seq: 0,
        };
        search.push(initial);
        search
    }

    fn push(&mut self, plan: Plan) {
        let score = least_reordered_score(&plan);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frontier.push(Scored { score, seq, plan });
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Expand the best plan once. Returns the plan if it is terminal.
    pub fn step(&mut self, oracle: &Oracle<'_>) -> PlanResult<Option<Plan>> {
        let Some(entry) = self.frontier.pop() else {
            return Err(PlanError::SearchExhausted);
        };
        let plan = entry.plan;
        let Some(node) = plan.next_node() else {
            info!(
                modules = plan.placed_modules(),
                reordered = plan.reordered_nodes(),
                "terminal plan found"
            );
            return Ok(Some(plan));
        };
        let produced = self.catalog.process_node(oracle, &plan, node)?;
        debug!(node = %node, produced = produced.len(), frontier = self.frontier.len(), "expanded plan");
        for next in produced {
            self.push(next);
        }
        Ok(None)
    }

    /// Drive the frontier until a terminal plan or the step bound.
    pub fn run(&mut self, oracle: &Oracle<'_>, config: &PlannerConfig) -> PlanResult<Plan> {
        for _ in 0..config.max_search_steps {
            if let Some(done) = self.step(oracle)? {
                return Ok(done);
            }
        }
        Err(PlanError::BudgetExhausted)
    }
}
