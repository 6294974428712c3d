//! # AST & IR
//!
//! The HDL abstract syntax tree: a typed, tagged-union tree held in an
//! arena, with parent back-references maintained by the arena's mutators
//! (spec §3 Invariants) and RTTI via bit-packed [`tags`].
//!
//! Traversal is via the [`Visitor`]/[`Editor`]/[`Builder`]/[`Rewriter`]
//! traits in [`visitor`] rather than a class hierarchy with double
//! dispatch — see `DESIGN.md` for why a tagged union plus one recursive
//! `match` was chosen over a trait-object node hierarchy (this is the
//! alternative the spec's own Design Notes sanction).

pub mod bits;
pub mod builders;
pub mod intern;
pub mod node;
pub mod ops;
pub mod tags;
pub mod visitor;

use node::*;
use tags::Tag;

pub use bits::{Bits, NumberFlags, NumberFormat};
pub use ops::{BinaryOp, CaseKind, EventKind, PortDirection, UnaryOp};
pub use visitor::{Builder, Editor, Rewriter, Visitor};

/// Index into an [`Arena`]. Stable for the lifetime of the arena; never
/// reused even after [`Arena::erase`] frees a slot (tokens are not
/// recycled, matching the process-wide intern table's contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The tagged-union node payload. See [`node`] for the field-level
/// breakdown of each variant's value/pointer/maybe/many children.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Identifier(IdentifierNode),
    Number(NumberNode),
    BinaryExpr(BinaryExprNode),
    UnaryExpr(UnaryExprNode),
    ConcatExpr(ConcatExprNode),
    ConditionalExpr(ConditionalExprNode),

    SeqBlock(SeqBlockNode),
    BlockingAssign(AssignNode),
    NonblockingAssign(AssignNode),
    ContinuousAssign(AssignNode),
    ConditionalStatement(ConditionalStatementNode),
    CaseStatement(CaseStatementNode),
    CaseItem(CaseItemNode),
    TimingControlStatement(TimingControlStatementNode),
    SysTaskEnable(SysTaskEnableNode),

    Event(EventNode),
    EventControl(EventControlNode),
    AlwaysConstruct(AlwaysConstructNode),
    InitialConstruct(InitialConstructNode),

    NetDeclaration(NetDeclNode),
    RegDeclaration(RegDeclNode),
    ParamDeclaration(ParamDeclNode),
    GenvarDeclaration(GenvarDeclNode),
    PortDeclaration(PortDeclNode),

    ModuleInstantiation(ModuleInstNode),
    GenerateIf(GenerateIfNode),
    GenerateCase(GenerateCaseNode),
    GenerateFor(GenerateForNode),
    GenerateBlock(GenerateBlockNode),

    ModuleDeclaration(ModuleDeclNode),
}

impl NodeKind {
    pub fn tag(&self) -> Tag {
        use tags::*;
        match self {
            NodeKind::Identifier(_) => IDENTIFIER | EXPR,
            NodeKind::Number(_) => NUMBER | EXPR,
            NodeKind::BinaryExpr(_) => BINARY_EXPR | EXPR,
            NodeKind::UnaryExpr(_) => UNARY_EXPR | EXPR,
            NodeKind::ConcatExpr(_) => CONCAT_EXPR | EXPR,
            NodeKind::ConditionalExpr(_) => CONDITIONAL_EXPR | EXPR,

            NodeKind::SeqBlock(_) => SEQ_BLOCK | STATEMENT,
            NodeKind::BlockingAssign(_) => BLOCKING_ASSIGN | STATEMENT,
            NodeKind::NonblockingAssign(_) => NONBLOCKING_ASSIGN | STATEMENT,
            NodeKind::ContinuousAssign(_) => CONTINUOUS_ASSIGN | STATEMENT | MODULE_ITEM,
            NodeKind::ConditionalStatement(_) => CONDITIONAL_STATEMENT | STATEMENT,
            NodeKind::CaseStatement(_) => CASE_STATEMENT | STATEMENT,
            NodeKind::CaseItem(_) => CASE_ITEM,
            NodeKind::TimingControlStatement(_) => TIMING_CONTROL_STATEMENT | STATEMENT,
            NodeKind::SysTaskEnable(_) => SYS_TASK_ENABLE | STATEMENT,

            NodeKind::Event(_) => EVENT,
            NodeKind::EventControl(_) => EVENT_CONTROL,
            NodeKind::AlwaysConstruct(_) => ALWAYS_CONSTRUCT | MODULE_ITEM,
            NodeKind::InitialConstruct(_) => INITIAL_CONSTRUCT | MODULE_ITEM,

            NodeKind::NetDeclaration(_) => NET_DECLARATION | DECLARATION | MODULE_ITEM,
            NodeKind::RegDeclaration(_) => REG_DECLARATION | DECLARATION | MODULE_ITEM,
            NodeKind::ParamDeclaration(_) => PARAM_DECLARATION | DECLARATION | MODULE_ITEM,
            NodeKind::GenvarDeclaration(_) => GENVAR_DECLARATION | DECLARATION | MODULE_ITEM,
            NodeKind::PortDeclaration(_) => PORT_DECLARATION | DECLARATION,

            NodeKind::ModuleInstantiation(_) => MODULE_INSTANTIATION | MODULE_ITEM,
            NodeKind::GenerateIf(_) => GENERATE_IF | GENERATE_CONSTRUCT | MODULE_ITEM,
            NodeKind::GenerateCase(_) => GENERATE_CASE | GENERATE_CONSTRUCT | MODULE_ITEM,
            NodeKind::GenerateFor(_) => GENERATE_FOR | GENERATE_CONSTRUCT | MODULE_ITEM,
            NodeKind::GenerateBlock(_) => GENERATE_BLOCK,

            NodeKind::ModuleDeclaration(_) => MODULE_DECLARATION,
        }
    }
}

/// One AST node plus its parent back-reference.
#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn tag(&self) -> Tag {
        self.kind.tag()
    }

    /// Exact-tag membership test.
    pub fn is(&self, tag: Tag) -> bool {
        self.tag() == tag
    }

    /// Abstract-class membership test: is this node a member of the group
    /// `tag` (e.g. `tags::EXPR`)?
    pub fn is_subclass_of(&self, tag: Tag) -> bool {
        self.tag() & tag == tag
    }
}

/// Owning arena of [`Node`]s. Children are exclusively owned by their
/// parent; [`Arena::clone_subtree`] deep-copies, [`Arena::erase`] recursively
/// destroys. A free list lets erased slots' indices be reclaimed for new
/// nodes, but existing live [`NodeId`]s are never invalidated except by
/// deliberate erasure.
#[derive(Debug, Default, Clone)]
pub struct Arena {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: NodeId) -> &Node {
        self.slots[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("use of erased node {id}"))
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("use of erased node {id}"))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.get(id).kind
    }

    /// Insert a freshly-built node with no parent; the caller is
    /// responsible for attaching it via a `set_*`/`push_*` mutator, which
    /// will stamp the parent back-reference.
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = Node { parent: None, kind };
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(node);
            NodeId(idx)
        } else {
            self.slots.push(Some(node));
            NodeId(self.slots.len() as u32 - 1)
        }
    }

    fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) {
        self.get_mut(child).parent = parent;
    }

    /// `pointer`/`maybe` attribute: attach `child` under `owner`, stamping
    /// the parent back-reference. Returns the previous occupant, if any,
    /// now detached (its own parent is cleared but it is not erased).
    pub fn attach(&mut self, owner: NodeId, child: NodeId) {
        self.set_parent(child, Some(owner));
    }

    pub fn detach(&mut self, child: NodeId) {
        self.set_parent(child, None);
    }

    /// Recursively erase `id` and everything it owns. Does not touch the
    /// parent's child slot — callers erase via a `purge`/`replace` helper
    /// that clears the slot first, or call this directly on an already
    /// detached subtree root.
    pub fn erase(&mut self, id: NodeId) {
        for child in self.children_of(id) {
            self.erase(child);
        }
        self.slots[id.index()] = None;
        self.free.push(id.index() as u32);
    }

    /// All direct children of `id`, in declaration order.
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        match self.kind(id) {
            NodeKind::Identifier(n) => out.extend(n.indices.iter().copied()),
            NodeKind::Number(_) => {}
            NodeKind::BinaryExpr(n) => out.extend([n.lhs, n.rhs]),
            NodeKind::UnaryExpr(n) => out.push(n.operand),
            NodeKind::ConcatExpr(n) => out.extend(n.exprs.iter().copied()),
            NodeKind::ConditionalExpr(n) => out.extend([n.cond, n.then_branch, n.else_branch]),
            NodeKind::SeqBlock(n) => out.extend(n.stmts.iter().copied()),
            NodeKind::BlockingAssign(n)
            | NodeKind::NonblockingAssign(n)
            | NodeKind::ContinuousAssign(n) => out.extend([n.lhs, n.rhs]),
            NodeKind::ConditionalStatement(n) => {
                out.extend([n.cond, n.then_branch, n.else_branch])
            }
            NodeKind::CaseStatement(n) => {
                out.push(n.cond);
                out.extend(n.items.iter().copied());
            }
            NodeKind::CaseItem(n) => {
                out.extend(n.exprs.iter().copied());
                out.push(n.stmt);
            }
            NodeKind::TimingControlStatement(n) => out.extend([n.ctrl, n.stmt]),
            NodeKind::SysTaskEnable(n) => out.extend(n.args.iter().copied()),
            NodeKind::Event(n) => out.push(n.expr),
            NodeKind::EventControl(n) => out.extend(n.events.iter().copied()),
            NodeKind::AlwaysConstruct(n) => out.push(n.stmt),
            NodeKind::InitialConstruct(n) => out.push(n.stmt),
            NodeKind::NetDeclaration(n) => out.extend(n.width),
            NodeKind::RegDeclaration(n) => out.extend(n.width),
            NodeKind::ParamDeclaration(n) => out.push(n.value),
            NodeKind::GenvarDeclaration(_) => {}
            NodeKind::PortDeclaration(_) => {}
            NodeKind::ModuleInstantiation(n) => {
                out.extend(n.params.iter().map(|p| p.value));
                out.extend(n.ports.iter().map(|p| p.connection));
                if let Some(i) = *n.inst.borrow() {
                    out.push(i);
                }
            }
            NodeKind::GenerateIf(n) => {
                out.extend([n.cond, n.then_block]);
                out.extend(n.else_block);
                if let Some(g) = *n.gen.borrow() {
                    out.push(g);
                }
            }
            NodeKind::GenerateCase(n) => {
                out.push(n.cond);
                for item in &n.items {
                    out.extend(item.exprs.iter().copied());
                    out.push(item.block);
                }
                if let Some(g) = *n.gen.borrow() {
                    out.push(g);
                }
            }
            NodeKind::GenerateFor(n) => {
                out.extend([n.init, n.cond, n.update_rhs, n.body]);
                if let Some(g) = *n.gen.borrow() {
                    out.push(g);
                }
            }
            NodeKind::GenerateBlock(n) => out.extend(n.items.iter().copied()),
            NodeKind::ModuleDeclaration(n) => {
                out.extend(n.ports.iter().copied());
                out.extend(n.items.iter().copied());
            }
        }
        out
    }

    /// Deep-copy the subtree rooted at `id` into this arena, dropping all
    /// decorations (resolution cache, `gen`/`inst` clones) per the clone
    /// invariant in spec §3/§4.A. Returns the new root; the clone has no
    /// parent until attached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.clone_kind_with_remap(id);
        self.insert(kind)
    }

    fn clone_kind_with_remap(&mut self, id: NodeId) -> NodeKind {
        let kind = self.get(id).kind.clone();
        match kind {
            NodeKind::Identifier(n) => NodeKind::Identifier(IdentifierNode {
                name: n.name,
                indices: n.indices.iter().map(|c| self.clone_subtree(*c)).collect(),
                resolution: std::cell::Cell::new(None),
                needs_update: std::cell::Cell::new(true),
            }),
            NodeKind::Number(n) => NodeKind::Number(n),
            NodeKind::BinaryExpr(n) => NodeKind::BinaryExpr(BinaryExprNode {
                op: n.op,
                lhs: self.clone_subtree(n.lhs),
                rhs: self.clone_subtree(n.rhs),
            }),
            NodeKind::UnaryExpr(n) => NodeKind::UnaryExpr(UnaryExprNode {
                op: n.op,
                operand: self.clone_subtree(n.operand),
            }),
            NodeKind::ConcatExpr(n) => NodeKind::ConcatExpr(ConcatExprNode {
                exprs: n.exprs.iter().map(|c| self.clone_subtree(*c)).collect(),
            }),
            NodeKind::ConditionalExpr(n) => NodeKind::ConditionalExpr(ConditionalExprNode {
                cond: self.clone_subtree(n.cond),
                then_branch: self.clone_subtree(n.then_branch),
                else_branch: self.clone_subtree(n.else_branch),
            }),
            NodeKind::SeqBlock(n) => NodeKind::SeqBlock(SeqBlockNode {
                stmts: n.stmts.iter().map(|c| self.clone_subtree(*c)).collect(),
            }),
            NodeKind::BlockingAssign(n) => NodeKind::BlockingAssign(self.clone_assign(n)),
            NodeKind::NonblockingAssign(n) => NodeKind::NonblockingAssign(self.clone_assign(n)),
            NodeKind::ContinuousAssign(n) => NodeKind::ContinuousAssign(self.clone_assign(n)),
            NodeKind::ConditionalStatement(n) => {
                NodeKind::ConditionalStatement(ConditionalStatementNode {
                    cond: self.clone_subtree(n.cond),
                    then_branch: self.clone_subtree(n.then_branch),
                    else_branch: self.clone_subtree(n.else_branch),
                })
            }
            NodeKind::CaseStatement(n) => NodeKind::CaseStatement(CaseStatementNode {
                kind: n.kind,
                cond: self.clone_subtree(n.cond),
                items: n.items.iter().map(|c| self.clone_subtree(*c)).collect(),
            }),
            NodeKind::CaseItem(n) => NodeKind::CaseItem(CaseItemNode {
                exprs: n.exprs.iter().map(|c| self.clone_subtree(*c)).collect(),
                stmt: self.clone_subtree(n.stmt),
            }),
            NodeKind::TimingControlStatement(n) => {
                NodeKind::TimingControlStatement(TimingControlStatementNode {
                    ctrl: self.clone_subtree(n.ctrl),
                    stmt: self.clone_subtree(n.stmt),
                })
            }
            NodeKind::SysTaskEnable(n) => NodeKind::SysTaskEnable(SysTaskEnableNode {
                name: n.name,
                args: n.args.iter().map(|c| self.clone_subtree(*c)).collect(),
            }),
            NodeKind::Event(n) => NodeKind::Event(EventNode {
                kind: n.kind,
                expr: self.clone_subtree(n.expr),
            }),
            NodeKind::EventControl(n) => NodeKind::EventControl(EventControlNode {
                events: n.events.iter().map(|c| self.clone_subtree(*c)).collect(),
            }),
            NodeKind::AlwaysConstruct(n) => NodeKind::AlwaysConstruct(AlwaysConstructNode {
                stmt: self.clone_subtree(n.stmt),
            }),
            NodeKind::InitialConstruct(n) => NodeKind::InitialConstruct(InitialConstructNode {
                stmt: self.clone_subtree(n.stmt),
            }),
            NodeKind::NetDeclaration(n) => NodeKind::NetDeclaration(NetDeclNode {
                name: n.name,
                width: n.width.map(|w| self.clone_subtree(w)),
                arity: n.arity,
            }),
            NodeKind::RegDeclaration(n) => NodeKind::RegDeclaration(RegDeclNode {
                name: n.name,
                width: n.width.map(|w| self.clone_subtree(w)),
                arity: n.arity,
            }),
            NodeKind::ParamDeclaration(n) => NodeKind::ParamDeclaration(ParamDeclNode {
                name: n.name,
                value: self.clone_subtree(n.value),
            }),
            NodeKind::GenvarDeclaration(n) => NodeKind::GenvarDeclaration(n),
            NodeKind::PortDeclaration(n) => NodeKind::PortDeclaration(n),
            NodeKind::ModuleInstantiation(n) => NodeKind::ModuleInstantiation(ModuleInstNode {
                module_name: n.module_name,
                inst_name: n.inst_name,
                params: n
                    .params
                    .iter()
                    .map(|p| ParamAssignment {
                        name: p.name.clone(),
                        value: self.clone_subtree(p.value),
                    })
                    .collect(),
                ports: n
                    .ports
                    .iter()
                    .map(|p| PortConnection {
                        name: p.name.clone(),
                        connection: self.clone_subtree(p.connection),
                    })
                    .collect(),
                inst: std::cell::RefCell::new(None),
            }),
            NodeKind::GenerateIf(n) => NodeKind::GenerateIf(GenerateIfNode {
                cond: self.clone_subtree(n.cond),
                then_block: self.clone_subtree(n.then_block),
                else_block: n.else_block.map(|b| self.clone_subtree(b)),
                gen: std::cell::RefCell::new(None),
            }),
            NodeKind::GenerateCase(n) => NodeKind::GenerateCase(GenerateCaseNode {
                cond: self.clone_subtree(n.cond),
                items: n
                    .items
                    .iter()
                    .map(|i| GenerateCaseItem {
                        exprs: i.exprs.iter().map(|c| self.clone_subtree(*c)).collect(),
                        block: self.clone_subtree(i.block),
                    })
                    .collect(),
                gen: std::cell::RefCell::new(None),
            }),
            NodeKind::GenerateFor(n) => NodeKind::GenerateFor(GenerateForNode {
                genvar: n.genvar,
                init: self.clone_subtree(n.init),
                cond: self.clone_subtree(n.cond),
                update_lhs: n.update_lhs,
                update_rhs: self.clone_subtree(n.update_rhs),
                body: self.clone_subtree(n.body),
                gen: std::cell::RefCell::new(None),
            }),
            NodeKind::GenerateBlock(n) => NodeKind::GenerateBlock(GenerateBlockNode {
                items: n.items.iter().map(|c| self.clone_subtree(*c)).collect(),
            }),
            NodeKind::ModuleDeclaration(n) => NodeKind::ModuleDeclaration(ModuleDeclNode {
                name: n.name,
                ports: n.ports.iter().map(|c| self.clone_subtree(*c)).collect(),
                items: n.items.iter().map(|c| self.clone_subtree(*c)).collect(),
            }),
        }
    }

    fn clone_assign(&mut self, n: AssignNode) -> AssignNode {
        AssignNode {
            lhs: self.clone_subtree(n.lhs),
            rhs: self.clone_subtree(n.rhs),
        }
    }

    // -- `many` attribute helpers, used by machinify/text_mangle on
    // SeqBlock::stmts. Parent pointers are fixed up on every mutation.

    pub fn push_back_stmt(&mut self, block: NodeId, stmt: NodeId) {
        self.attach(block, stmt);
        if let NodeKind::SeqBlock(b) = &mut self.get_mut(block).kind {
            b.stmts.push(stmt);
        } else {
            panic!("push_back_stmt on non-SeqBlock");
        }
    }

    pub fn push_front_stmt(&mut self, block: NodeId, stmt: NodeId) {
        self.attach(block, stmt);
        if let NodeKind::SeqBlock(b) = &mut self.get_mut(block).kind {
            b.stmts.insert(0, stmt);
        } else {
            panic!("push_front_stmt on non-SeqBlock");
        }
    }

    pub fn pop_back_stmt(&mut self, block: NodeId) -> Option<NodeId> {
        if let NodeKind::SeqBlock(b) = &mut self.get_mut(block).kind {
            let popped = b.stmts.pop();
            if let Some(s) = popped {
                self.detach(s);
            }
            popped
        } else {
            panic!("pop_back_stmt on non-SeqBlock");
        }
    }

    pub fn erase_stmt(&mut self, block: NodeId, index: usize) {
        let removed = if let NodeKind::SeqBlock(b) = &mut self.get_mut(block).kind {
            b.stmts.remove(index)
        } else {
            panic!("erase_stmt on non-SeqBlock");
        };
        self.erase(removed);
    }

    pub fn stmts_of(&self, block: NodeId) -> &[NodeId] {
        match self.kind(block) {
            NodeKind::SeqBlock(b) => &b.stmts,
            _ => panic!("stmts_of on non-SeqBlock"),
        }
    }

    pub fn back_stmt(&self, block: NodeId) -> Option<NodeId> {
        self.stmts_of(block).last().copied()
    }

    pub fn is_empty_block(&self, block: NodeId) -> bool {
        self.stmts_of(block).is_empty()
    }

    /// Replace `old` with `new` in whatever slot of its parent currently
    /// holds it (the `Rewriter` substitution primitive). `old` keeps its
    /// content but is detached; callers erase it explicitly if it is truly
    /// dead, matching the AST's "erase != detach" split.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        self.attach(parent, new);
        self.detach(old);

        fn sub(slot: &mut NodeId, old: NodeId, new: NodeId) {
            if *slot == old {
                *slot = new;
            }
        }
        fn sub_opt(slot: &mut Option<NodeId>, old: NodeId, new: NodeId) {
            if *slot == Some(old) {
                *slot = Some(new);
            }
        }

        match &mut self.get_mut(parent).kind {
            NodeKind::Identifier(n) => replace_in(&mut n.indices, old, new),
            NodeKind::Number(_) => {}
            NodeKind::BinaryExpr(n) => {
                sub(&mut n.lhs, old, new);
                sub(&mut n.rhs, old, new);
            }
            NodeKind::UnaryExpr(n) => sub(&mut n.operand, old, new),
            NodeKind::ConcatExpr(n) => replace_in(&mut n.exprs, old, new),
            NodeKind::ConditionalExpr(n) => {
                sub(&mut n.cond, old, new);
                sub(&mut n.then_branch, old, new);
                sub(&mut n.else_branch, old, new);
            }
            NodeKind::SeqBlock(n) => replace_in(&mut n.stmts, old, new),
            NodeKind::BlockingAssign(n)
            | NodeKind::NonblockingAssign(n)
            | NodeKind::ContinuousAssign(n) => {
                sub(&mut n.lhs, old, new);
                sub(&mut n.rhs, old, new);
            }
            NodeKind::ConditionalStatement(n) => {
                sub(&mut n.cond, old, new);
                sub(&mut n.then_branch, old, new);
                sub(&mut n.else_branch, old, new);
            }
            NodeKind::CaseStatement(n) => {
                sub(&mut n.cond, old, new);
                replace_in(&mut n.items, old, new);
            }
            NodeKind::CaseItem(n) => {
                replace_in(&mut n.exprs, old, new);
                sub(&mut n.stmt, old, new);
            }
            NodeKind::TimingControlStatement(n) => {
                sub(&mut n.ctrl, old, new);
                sub(&mut n.stmt, old, new);
            }
            NodeKind::SysTaskEnable(n) => replace_in(&mut n.args, old, new),
            NodeKind::Event(n) => sub(&mut n.expr, old, new),
            NodeKind::EventControl(n) => replace_in(&mut n.events, old, new),
            NodeKind::AlwaysConstruct(n) => sub(&mut n.stmt, old, new),
            NodeKind::InitialConstruct(n) => sub(&mut n.stmt, old, new),
            NodeKind::NetDeclaration(n) => sub_opt(&mut n.width, old, new),
            NodeKind::RegDeclaration(n) => sub_opt(&mut n.width, old, new),
            NodeKind::ParamDeclaration(n) => sub(&mut n.value, old, new),
            NodeKind::GenvarDeclaration(_) => {}
            NodeKind::PortDeclaration(_) => {}
            NodeKind::ModuleInstantiation(n) => {
                for p in &mut n.params {
                    sub(&mut p.value, old, new);
                }
                for p in &mut n.ports {
                    sub(&mut p.connection, old, new);
                }
                let mut inst = n.inst.borrow_mut();
                sub_opt(&mut *inst, old, new);
            }
            NodeKind::GenerateIf(n) => {
                sub(&mut n.cond, old, new);
                sub(&mut n.then_block, old, new);
                sub_opt(&mut n.else_block, old, new);
                let mut gen = n.gen.borrow_mut();
                sub_opt(&mut *gen, old, new);
            }
            NodeKind::GenerateCase(n) => {
                sub(&mut n.cond, old, new);
                for item in &mut n.items {
                    replace_in(&mut item.exprs, old, new);
                    sub(&mut item.block, old, new);
                }
                let mut gen = n.gen.borrow_mut();
                sub_opt(&mut *gen, old, new);
            }
            NodeKind::GenerateFor(n) => {
                sub(&mut n.init, old, new);
                sub(&mut n.cond, old, new);
                sub(&mut n.update_rhs, old, new);
                sub(&mut n.body, old, new);
                let mut gen = n.gen.borrow_mut();
                sub_opt(&mut *gen, old, new);
            }
            NodeKind::GenerateBlock(n) => replace_in(&mut n.items, old, new),
            NodeKind::ModuleDeclaration(n) => {
                replace_in(&mut n.ports, old, new);
                replace_in(&mut n.items, old, new);
            }
        }
    }
}

fn replace_in(v: &mut [NodeId], old: NodeId, new: NodeId) {
    for slot in v.iter_mut() {
        if *slot == old {
            *slot = new;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node::IdentifierNode;

    #[test]
    fn parent_invariant_on_attach() {
        let mut arena = Arena::new();
        let lhs = arena.insert(NodeKind::Identifier(IdentifierNode::simple("a")));
        let rhs = arena.insert(NodeKind::Number(NumberNode {
            value: Bits::from_u64(8, 1),
            flags: NumberFlags::new(8, false, NumberFormat::Decimal),
        }));
        let block = arena.insert(NodeKind::SeqBlock(SeqBlockNode { stmts: vec![] }));
        let assign = arena.insert(NodeKind::BlockingAssign(AssignNode { lhs, rhs }));
        arena.attach(assign, lhs);
        arena.attach(assign, rhs);
        arena.push_back_stmt(block, assign);

        assert_eq!(arena.get(assign).parent(), Some(block));
        assert_eq!(arena.get(lhs).parent(), Some(assign));
        assert_eq!(arena.get(rhs).parent(), Some(assign));
    }

    #[test]
    fn clone_preserves_parent_invariant_and_drops_decorations() {
        let mut arena = Arena::new();
        let id = arena.insert(NodeKind::Identifier(IdentifierNode::simple("x")));
        arena.get(id); // touch
        if let NodeKind::Identifier(n) = &arena.get(id).kind {
            n.resolution.set(Some(id));
        }
        let block = arena.insert(NodeKind::SeqBlock(SeqBlockNode { stmts: vec![] }));
        arena.push_back_stmt(block, id);

        let clone_root = arena.clone_subtree(block);
        let stmts = arena.stmts_of(clone_root);
        assert_eq!(stmts.len(), 1);
        let cloned_id = stmts[0];
        assert_eq!(arena.get(cloned_id).parent(), Some(clone_root));
        if let NodeKind::Identifier(n) = &arena.get(cloned_id).kind {
            assert!(n.resolution.get().is_none());
        } else {
            panic!("expected identifier");
        }
    }

    #[test]
    fn rtti_tags() {
        let mut arena = Arena::new();
        let id = arena.insert(NodeKind::Identifier(IdentifierNode::simple("x")));
        assert!(arena.get(id).is(tags::IDENTIFIER | tags::EXPR));
        assert!(arena.get(id).is_subclass_of(tags::EXPR));
        assert!(!arena.get(id).is_subclass_of(tags::STATEMENT));
    }
}
