//! Planner configuration.

use std::collections::BTreeSet;

/// Knobs for a planner session.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Whether plans may spawn reordered variants at all.
    pub enable_reorder: bool,
    /// Upper bound on hoists per plan (None = unlimited).
    pub reorder_budget: Option<usize>,
    /// Symbol labels the upstream symbol factory manages itself; reads of
    /// these never count as unmet dependencies.
    pub ignored_symbols: BTreeSet<String>,
    /// Hard bound on search iterations.
    pub max_search_steps: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enable_reorder: true,
            reorder_budget: None,
            ignored_symbols: ["device", "pkt_len", "data_len", "received_a_packet"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_search_steps: 10_000,
        }
    }
}

impl PlannerConfig {
    pub fn should_ignore(&self, label: &str) -> bool {
        self.ignored_symbols.contains(label)
    }
}
