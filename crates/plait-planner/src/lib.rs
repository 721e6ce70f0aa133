//! Planner core: maps decision-diagram nodes onto target-specific modules
//! while exploring semantics-preserving reorderings of the diagram.
//!
//! The hard part lives in [`oracle`], [`candidates`] and [`rewrite`]: given
//! the node a plan just committed, find every future node that could
//! legally execute next (tracking symbolic I/O dependencies and read/write
//! aliasing on stateful objects), then hoist a chosen one by structurally
//! rewriting the diagram, duplicating subtrees and introducing guard
//! branches where needed.

pub mod candidates;
pub mod config;
pub mod heuristics;
pub mod modules;
pub mod oracle;
pub mod plan;
pub mod rewrite;
pub mod search;
pub mod side_effects;

pub use candidates::{hoist_candidates, Candidate};
pub use config::PlannerConfig;
pub use modules::{Module, ModuleCatalog, PlanVisitor, Target};
pub use oracle::{Commute, Oracle, RwVerdict};
pub use plan::{reordered_variants, Plan, ReorderTracker};
pub use search::Search;
pub use side_effects::SideEffects;

use plait_graph::{GraphError, NodeId};
use plait_smt::QueryError;
use thiserror::Error;

/// Fatal planner error: the current plan is abandoned, never silently
/// continued.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("malformed packet access: {0}")]
    Expr(#[from] plait_expr::ExprError),

    #[error("function '{0}' is not in the side-effect classification")]
    UnknownFunction(String),

    #[error("branch {node}: {reason}")]
    MalformedBranch { node: NodeId, reason: &'static str },

    #[error("cannot hoist {node}: {reason}")]
    InvalidHoist { node: NodeId, reason: &'static str },

    #[error("search step budget exhausted")]
    BudgetExhausted,

    #[error("search frontier exhausted without a terminal plan")]
    SearchExhausted,
}

pub type PlanResult<T> = Result<T, PlanError>;
