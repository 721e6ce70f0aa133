//! The decision diagram: a rooted, branching, side-effectful call graph.
//!
//! This is the mutable program representation the planner rewrites. Nodes
//! live in an id-addressed arena owned by the [`Diagram`]; forward and
//! backward links are ids, so a deep clone is a value copy and subtree
//! duplication is an id-remap pass, with ids unique at every instant.

pub mod builder;
pub mod diagram;
pub mod node;

pub use builder::DiagramBuilder;
pub use diagram::{Diagram, IdRemap};
pub use node::{
    CallArg, CallDesc, InitResult, Node, NodeId, NodeKind, ProcessAction, SymbolDef,
};

use thiserror::Error;

/// Structural error in a diagram operation.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {0} not found in diagram")]
    NodeNotFound(NodeId),

    #[error("node id {0} already present in diagram")]
    DuplicateId(NodeId),

    #[error("node {0} has no successor")]
    MissingSuccessor(NodeId),

    #[error("node {0} has no predecessor")]
    MissingPredecessor(NodeId),

    #[error("diagram has no process root")]
    NoProcessRoot,

    #[error("back-link of node {child} does not point at {parent}")]
    BrokenLink { parent: NodeId, child: NodeId },
}

pub type GraphResult<T> = Result<T, GraphError>;
