//! Node variants of the decision diagram.

use plait_expr::ExprRef;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Diagram-unique node identifier, allocated from the diagram's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A symbol a call publishes: a label naming the value plus the expression
/// the value stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDef {
    pub label: String,
    pub expr: ExprRef,
}

impl SymbolDef {
    pub fn new(label: impl Into<String>, expr: ExprRef) -> Self {
        Self {
            label: label.into(),
            expr,
        }
    }
}

/// One call argument: the value passed, and for pointer arguments the value
/// the pointer referred to on entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArg {
    pub expr: Option<ExprRef>,
    pub pointee: Option<ExprRef>,
}

impl CallArg {
    pub fn value(expr: ExprRef) -> Self {
        Self {
            expr: Some(expr),
            pointee: None,
        }
    }

    pub fn pointer(pointee: ExprRef) -> Self {
        Self {
            expr: None,
            pointee: Some(pointee),
        }
    }
}

/// A call to a stateful primitive, with named arguments and an optional
/// return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDesc {
    pub function: String,
    pub args: BTreeMap<String, CallArg>,
    pub ret: Option<ExprRef>,
}

impl CallDesc {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: BTreeMap::new(),
            ret: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, arg: CallArg) -> Self {
        self.args.insert(name.into(), arg);
        self
    }

    pub fn with_ret(mut self, ret: ExprRef) -> Self {
        self.ret = Some(ret);
        self
    }

    pub fn arg(&self, name: &str) -> Option<&CallArg> {
        self.args.get(name)
    }
}

/// Outcome of the init section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitResult {
    Success,
    Failure,
}

/// Outcome of the process section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAction {
    Forward { port: u32 },
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A call node: one successor, publishes symbols.
    Call {
        call: CallDesc,
        generated: Vec<SymbolDef>,
        next: Option<NodeId>,
    },
    /// A two-way branch on a boolean condition.
    Branch {
        condition: ExprRef,
        on_true: NodeId,
        on_false: NodeId,
    },
    /// Terminal of the init section.
    ReturnInit { result: InitResult },
    /// Terminal of the process section.
    ReturnProcess { action: ProcessAction },
}

/// A diagram node: unique id, single back-link, the constraints true along
/// the path reaching it, and the variant payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub prev: Option<NodeId>,
    pub constraints: Vec<ExprRef>,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, NodeKind::Call { .. })
    }

    pub fn is_return(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::ReturnInit { .. } | NodeKind::ReturnProcess { .. }
        )
    }

    pub fn as_call(&self) -> Option<&CallDesc> {
        match &self.kind {
            NodeKind::Call { call, .. } => Some(call),
            _ => None,
        }
    }

    /// Symbols this node publishes.
    pub fn generated(&self) -> &[SymbolDef] {
        match &self.kind {
            NodeKind::Call { generated, .. } => generated,
            _ => &[],
        }
    }

    pub fn condition(&self) -> Option<&ExprRef> {
        match &self.kind {
            NodeKind::Branch { condition, .. } => Some(condition),
            _ => None,
        }
    }

    /// Single successor of a call node.
    pub fn next(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Call { next, .. } => *next,
            _ => None,
        }
    }

    /// All forward links, in branch order.
    pub fn successors(&self) -> SmallVec<[NodeId; 2]> {
        match &self.kind {
            NodeKind::Call { next, .. } => next.iter().copied().collect(),
            NodeKind::Branch {
                on_true, on_false, ..
            } => SmallVec::from_slice(&[*on_true, *on_false]),
            NodeKind::ReturnInit { .. } | NodeKind::ReturnProcess { .. } => SmallVec::new(),
        }
    }

    /// Rewrite the forward link currently pointing at `old` to `new`.
    /// Returns false if no link pointed at `old`.
    pub fn relink(&mut self, old: NodeId, new: NodeId) -> bool {
        match &mut self.kind {
            NodeKind::Call { next, .. } => {
                if *next == Some(old) {
                    *next = Some(new);
                    return true;
                }
                false
            }
            NodeKind::Branch {
                on_true, on_false, ..
            } => {
                if *on_true == old {
                    *on_true = new;
                    true
                } else if *on_false == old {
                    *on_false = new;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Call { call, .. } => write!(f, "{} {}(...)", self.id, call.function),
            NodeKind::Branch { condition, .. } => write!(f, "{} if {}", self.id, condition),
            NodeKind::ReturnInit { result } => write!(f, "{} return {:?}", self.id, result),
            NodeKind::ReturnProcess { action } => write!(f, "{} return {:?}", self.id, action),
        }
    }
}
