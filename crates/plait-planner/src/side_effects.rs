//! Side-effect classification of the stateful primitives.
//!
//! The table is authoritative and immutable: a lookup of a function it
//! does not list is a fatal error, so a newly introduced primitive cannot
//! slip past the reorder engine unclassified.

use crate::{PlanError, PlanResult};
use plait_graph::Node;
use std::collections::BTreeMap;

/// Functions that must never be moved, regardless of aliasing.
const PINNED: [&str; 3] = [
    "current_time",
    "packet_return_chunk",
    "nf_set_rte_ipv4_udptcp_checksum",
];

const CLASSIFICATION: [(&str, bool); 13] = [
    ("current_time", true),
    ("map_get", false),
    ("map_put", true),
    ("vector_borrow", false),
    ("vector_return", true),
    ("rte_ether_addr_hash", false),
    ("packet_borrow_next_chunk", true),
    ("packet_get_unread_length", true),
    ("packet_return_chunk", true),
    ("expire_items_single_map", true),
    ("dchain_allocate_new_index", true),
    ("dchain_is_index_allocated", false),
    ("dchain_rejuvenate_index", true),
];

#[derive(Debug)]
pub struct SideEffects {
    table: BTreeMap<&'static str, bool>,
}

impl Default for SideEffects {
    fn default() -> Self {
        Self {
            table: CLASSIFICATION.into_iter().collect(),
        }
    }
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the named primitive mutates observable state.
    pub fn has_side_effects(&self, function: &str) -> PlanResult<bool> {
        self.table
            .get(function)
            .copied()
            .ok_or_else(|| PlanError::UnknownFunction(function.to_string()))
    }

    /// Whether executing this node is observable: branches count (they pin
    /// the path), returns do not.
    pub fn node_has_side_effects(&self, node: &Node) -> PlanResult<bool> {
        if node.is_branch() {
            return Ok(true);
        }
        match node.as_call() {
            Some(call) => self.has_side_effects(&call.function),
            None => Ok(false),
        }
    }

    /// Whether the named primitive may be reordered at all.
    pub fn can_reorder(function: &str) -> bool {
        !PINNED.contains(&function)
    }
}
