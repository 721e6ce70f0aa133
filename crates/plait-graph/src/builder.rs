//! Programmatic diagram construction.
//!
//! Upstream converters and the test suites build diagrams bottom-up:
//! create nodes, wire them with `seq`/`branch`, then pick the roots.

use crate::diagram::Diagram;
use crate::node::{
    CallDesc, InitResult, Node, NodeId, NodeKind, ProcessAction, SymbolDef,
};
use crate::GraphResult;
use plait_expr::ExprRef;

#[derive(Debug, Default)]
pub struct DiagramBuilder {
    diagram: Diagram,
}

impl DiagramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, kind: NodeKind, constraints: Vec<ExprRef>) -> NodeId {
        let id = self.diagram.fresh_id();
        let node = Node {
            id,
            prev: None,
            constraints,
            kind,
        };
        self.diagram
            .insert(node)
            .expect("fresh id cannot collide");
        id
    }

    /// An unattached call node.
    pub fn call(&mut self, call: CallDesc, generated: Vec<SymbolDef>) -> NodeId {
        self.add(
            NodeKind::Call {
                call,
                generated,
                next: None,
            },
            Vec::new(),
        )
    }

    /// A call node carrying path constraints.
    pub fn call_under(
        &mut self,
        call: CallDesc,
        generated: Vec<SymbolDef>,
        constraints: Vec<ExprRef>,
    ) -> NodeId {
        self.add(
            NodeKind::Call {
                call,
                generated,
                next: None,
            },
            constraints,
        )
    }

    /// A branch over already-built arms; the arms' back-links are set.
    pub fn branch(
        &mut self,
        condition: ExprRef,
        on_true: NodeId,
        on_false: NodeId,
    ) -> GraphResult<NodeId> {
        let id = self.add(
            NodeKind::Branch {
                condition,
                on_true,
                on_false,
            },
            Vec::new(),
        );
        self.diagram.node_mut(on_true)?.prev = Some(id);
        self.diagram.node_mut(on_false)?.prev = Some(id);
        Ok(id)
    }

    pub fn ret_init(&mut self, result: InitResult) -> NodeId {
        self.add(NodeKind::ReturnInit { result }, Vec::new())
    }

    pub fn ret_process(&mut self, action: ProcessAction) -> NodeId {
        self.add(NodeKind::ReturnProcess { action }, Vec::new())
    }

    /// Chain call nodes in order; the last entry may be any node kind.
    pub fn seq(&mut self, ids: &[NodeId]) -> GraphResult<()> {
        for pair in ids.windows(2) {
            self.diagram.link_next(pair[0], pair[1])?;
        }
        Ok(())
    }

    /// Attach path constraints to a node after the fact.
    pub fn constrain(&mut self, id: NodeId, constraints: Vec<ExprRef>) -> GraphResult<()> {
        self.diagram.node_mut(id)?.constraints = constraints;
        Ok(())
    }

    pub fn finish_process(mut self, root: NodeId) -> GraphResult<Diagram> {
        self.diagram.node(root)?;
        self.diagram.replace_process(root);
        self.diagram.check_integrity()?;
        Ok(self.diagram)
    }

    pub fn finish(mut self, init: NodeId, process: NodeId) -> GraphResult<Diagram> {
        self.diagram.node(init)?;
        self.diagram.node(process)?;
        self.diagram.set_init(init);
        self.diagram.replace_process(process);
        self.diagram.check_integrity()?;
        Ok(self.diagram)
    }
}
