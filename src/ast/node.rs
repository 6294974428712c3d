//! Concrete node payloads for every [`NodeKind`](super::NodeKind) variant.
//!
//! Each payload groups its children by the attribute kind from spec §3:
//! a `value` is an inline scalar field, a `pointer` is a single owned
//! [`NodeId`](super::NodeId), a `maybe` is an `Option<NodeId>`, and a `many`
//! is a `Vec<NodeId>`. Decorations computed by later passes (resolution
//! cache, elaboration clones) are `Cell`/`RefCell` so they can be filled in
//! through a shared reference during a read-only [`Visitor`](super::Visitor)
//! walk.

use std::cell::{Cell, RefCell};

use super::bits::{Bits, NumberFlags};
use super::ops::{BinaryOp, CaseKind, EventKind, PortDirection, UnaryOp};
use super::NodeId;

#[derive(Debug, Clone)]
pub struct IdentifierNode {
    pub name: String,
    /// Index/bit-select expressions applied to `name`, outermost first.
    /// `machinify` prepends the machine index here via `push_front_index`.
    pub indices: Vec<NodeId>,
    /// Resolve pass cache: the declaration this identifier refers to.
    pub resolution: Cell<Option<NodeId>>,
    /// Evaluate pass cache: does this identifier's value need recomputing.
    pub needs_update: Cell<bool>,
}

impl IdentifierNode {
    pub fn simple(name: impl Into<String>) -> Self {
        IdentifierNode {
            name: name.into(),
            indices: Vec::new(),
            resolution: Cell::new(None),
            needs_update: Cell::new(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumberNode {
    pub value: Bits,
    pub flags: NumberFlags,
}

#[derive(Debug, Clone)]
pub struct BinaryExprNode {
    pub op: BinaryOp,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

#[derive(Debug, Clone)]
pub struct UnaryExprNode {
    pub op: UnaryOp,
    pub operand: NodeId,
}

#[derive(Debug, Clone)]
pub struct ConcatExprNode {
    pub exprs: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ConditionalExprNode {
    pub cond: NodeId,
    pub then_branch: NodeId,
    pub else_branch: NodeId,
}

#[derive(Debug, Clone)]
pub struct SeqBlockNode {
    pub stmts: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct AssignNode {
    pub lhs: NodeId,
    pub rhs: NodeId,
}

#[derive(Debug, Clone)]
pub struct ConditionalStatementNode {
    pub cond: NodeId,
    pub then_branch: NodeId,
    pub else_branch: NodeId,
}

#[derive(Debug, Clone)]
pub struct CaseStatementNode {
    pub kind: CaseKind,
    pub cond: NodeId,
    pub items: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct CaseItemNode {
    /// Empty means this is the `default` item.
    pub exprs: Vec<NodeId>,
    pub stmt: NodeId,
}

#[derive(Debug, Clone)]
pub struct TimingControlStatementNode {
    pub ctrl: NodeId,
    pub stmt: NodeId,
}

#[derive(Debug, Clone)]
pub struct SysTaskEnableNode {
    pub name: String,
    pub args: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct EventNode {
    pub kind: EventKind,
    pub expr: NodeId,
}

#[derive(Debug, Clone)]
pub struct EventControlNode {
    pub events: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct AlwaysConstructNode {
    pub stmt: NodeId,
}

#[derive(Debug, Clone)]
pub struct InitialConstructNode {
    pub stmt: NodeId,
}

#[derive(Debug, Clone)]
pub struct NetDeclNode {
    pub name: String,
    pub width: Option<NodeId>,
    pub arity: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct RegDeclNode {
    pub name: String,
    pub width: Option<NodeId>,
    pub arity: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct ParamDeclNode {
    pub name: String,
    pub value: NodeId,
}

#[derive(Debug, Clone)]
pub struct GenvarDeclNode {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct PortDeclNode {
    pub name: String,
    pub dir: PortDirection,
}

#[derive(Debug, Clone)]
pub struct PortConnection {
    pub name: String,
    pub connection: NodeId,
}

#[derive(Debug, Clone)]
pub struct ParamAssignment {
    pub name: Option<String>,
    pub value: NodeId,
}

#[derive(Debug, Clone)]
pub struct ModuleInstNode {
    pub module_name: String,
    pub inst_name: String,
    pub params: Vec<ParamAssignment>,
    pub ports: Vec<PortConnection>,
    /// Elaborate pass decoration: a clone of the resolved declaration.
    pub inst: RefCell<Option<NodeId>>,
}

#[derive(Debug, Clone)]
pub struct GenerateIfNode {
    pub cond: NodeId,
    pub then_block: NodeId,
    pub else_block: Option<NodeId>,
    /// Elaborate pass decoration: the selected, expanded block.
    pub gen: RefCell<Option<NodeId>>,
}

#[derive(Debug, Clone)]
pub struct GenerateCaseItem {
    pub exprs: Vec<NodeId>,
    pub block: NodeId,
}

#[derive(Debug, Clone)]
pub struct GenerateCaseNode {
    pub cond: NodeId,
    pub items: Vec<GenerateCaseItem>,
    pub gen: RefCell<Option<NodeId>>,
}

#[derive(Debug, Clone)]
pub struct GenerateForNode {
    pub genvar: String,
    pub init: NodeId,
    pub cond: NodeId,
    pub update_lhs: String,
    pub update_rhs: NodeId,
    pub body: NodeId,
    pub gen: RefCell<Option<NodeId>>,
}

#[derive(Debug, Clone)]
pub struct GenerateBlockNode {
    pub items: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ModuleDeclNode {
    pub name: String,
    pub ports: Vec<NodeId>,
    pub items: Vec<NodeId>,
}
