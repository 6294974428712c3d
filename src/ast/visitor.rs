//! Traversal traits: a tagged union plus one recursive `match` in place of
//! a class hierarchy with virtual dispatch. Each trait gets one
//! default-implemented hook per concrete tag plus a `walk` entry point;
//! overriding a hook and calling (or not calling) the passed-in `walk`
//! closure gives the same pre/post-order control a visitor pattern would.

use super::node::*;
use super::{Arena, NodeId, NodeKind};

/// Read-only traversal. Default hooks recurse into every child; override
/// a hook to skip or inspect a subtree.
pub trait Visitor {
    fn visit_identifier(&mut self, arena: &Arena, id: NodeId, n: &IdentifierNode) {
        for &idx in &n.indices {
            self.visit(arena, idx);
        }
    }
    fn visit_number(&mut self, _arena: &Arena, _id: NodeId, _n: &NumberNode) {}
    fn visit_binary_expr(&mut self, arena: &Arena, _id: NodeId, n: &BinaryExprNode) {
        self.visit(arena, n.lhs);
        self.visit(arena, n.rhs);
    }
    fn visit_unary_expr(&mut self, arena: &Arena, _id: NodeId, n: &UnaryExprNode) {
        self.visit(arena, n.operand);
    }
    fn visit_concat_expr(&mut self, arena: &Arena, _id: NodeId, n: &ConcatExprNode) {
        for &e in &n.exprs {
            self.visit(arena, e);
        }
    }
    fn visit_conditional_expr(&mut self, arena: &Arena, _id: NodeId, n: &ConditionalExprNode) {
        self.visit(arena, n.cond);
        self.visit(arena, n.then_branch);
        self.visit(arena, n.else_branch);
    }
    fn visit_seq_block(&mut self, arena: &Arena, _id: NodeId, n: &SeqBlockNode) {
        for &s in &n.stmts {
            self.visit(arena, s);
        }
    }
    fn visit_assign(&mut self, arena: &Arena, _id: NodeId, n: &AssignNode) {
        self.visit(arena, n.lhs);
        self.visit(arena, n.rhs);
    }
    fn visit_conditional_statement(
        &mut self,
        arena: &Arena,
        _id: NodeId,
        n: &ConditionalStatementNode,
    ) {
        self.visit(arena, n.cond);
        self.visit(arena, n.then_branch);
        self.visit(arena, n.else_branch);
    }
    fn visit_case_statement(&mut self, arena: &Arena, _id: NodeId, n: &CaseStatementNode) {
        self.visit(arena, n.cond);
        for &i in &n.items {
            self.visit(arena, i);
        }
    }
    fn visit_case_item(&mut self, arena: &Arena, _id: NodeId, n: &CaseItemNode) {
        for &e in &n.exprs {
            self.visit(arena, e);
        }
        self.visit(arena, n.stmt);
    }
    fn visit_timing_control_statement(
        &mut self,
        arena: &Arena,
        _id: NodeId,
        n: &TimingControlStatementNode,
    ) {
        self.visit(arena, n.ctrl);
        self.visit(arena, n.stmt);
    }
    fn visit_sys_task_enable(&mut self, arena: &Arena, _id: NodeId, n: &SysTaskEnableNode) {
        for &a in &n.args {
            self.visit(arena, a);
        }
    }
    fn visit_event(&mut self, arena: &Arena, _id: NodeId, n: &EventNode) {
        self.visit(arena, n.expr);
    }
    fn visit_event_control(&mut self, arena: &Arena, _id: NodeId, n: &EventControlNode) {
        for &e in &n.events {
            self.visit(arena, e);
        }
    }
    fn visit_always_construct(&mut self, arena: &Arena, _id: NodeId, n: &AlwaysConstructNode) {
        self.visit(arena, n.stmt);
    }
    fn visit_initial_construct(&mut self, arena: &Arena, _id: NodeId, n: &InitialConstructNode) {
        self.visit(arena, n.stmt);
    }
    fn visit_net_declaration(&mut self, arena: &Arena, _id: NodeId, n: &NetDeclNode) {
        if let Some(w) = n.width {
            self.visit(arena, w);
        }
    }
    fn visit_reg_declaration(&mut self, arena: &Arena, _id: NodeId, n: &RegDeclNode) {
        if let Some(w) = n.width {
            self.visit(arena, w);
        }
    }
    fn visit_param_declaration(&mut self, arena: &Arena, _id: NodeId, n: &ParamDeclNode) {
        self.visit(arena, n.value);
    }
    fn visit_genvar_declaration(&mut self, _arena: &Arena, _id: NodeId, _n: &GenvarDeclNode) {}
    fn visit_port_declaration(&mut self, _arena: &Arena, _id: NodeId, _n: &PortDeclNode) {}
    fn visit_module_instantiation(&mut self, arena: &Arena, _id: NodeId, n: &ModuleInstNode) {
        for p in &n.params {
            self.visit(arena, p.value);
        }
        for p in &n.ports {
            self.visit(arena, p.connection);
        }
    }
    fn visit_generate_if(&mut self, arena: &Arena, _id: NodeId, n: &GenerateIfNode) {
        self.visit(arena, n.cond);
        self.visit(arena, n.then_block);
        if let Some(e) = n.else_block {
            self.visit(arena, e);
        }
    }
    fn visit_generate_case(&mut self, arena: &Arena, _id: NodeId, n: &GenerateCaseNode) {
        self.visit(arena, n.cond);
        for item in &n.items {
            for &e in &item.exprs {
                self.visit(arena, e);
            }
            self.visit(arena, item.block);
        }
    }
    fn visit_generate_for(&mut self, arena: &Arena, _id: NodeId, n: &GenerateForNode) {
        self.visit(arena, n.init);
        self.visit(arena, n.cond);
        self.visit(arena, n.update_rhs);
        self.visit(arena, n.body);
    }
    fn visit_generate_block(&mut self, arena: &Arena, _id: NodeId, n: &GenerateBlockNode) {
        for &i in &n.items {
            self.visit(arena, i);
        }
    }
    fn visit_module_declaration(&mut self, arena: &Arena, _id: NodeId, n: &ModuleDeclNode) {
        for &p in &n.ports {
            self.visit(arena, p);
        }
        for &i in &n.items {
            self.visit(arena, i);
        }
    }

    /// Entry point: dispatch on `id`'s tag and call the matching hook.
    fn visit(&mut self, arena: &Arena, id: NodeId) {
        match arena.kind(id) {
            NodeKind::Identifier(n) => self.visit_identifier(arena, id, n),
            NodeKind::Number(n) => self.visit_number(arena, id, n),
            NodeKind::BinaryExpr(n) => self.visit_binary_expr(arena, id, n),
            NodeKind::UnaryExpr(n) => self.visit_unary_expr(arena, id, n),
            NodeKind::ConcatExpr(n) => self.visit_concat_expr(arena, id, n),
            NodeKind::ConditionalExpr(n) => self.visit_conditional_expr(arena, id, n),
            NodeKind::SeqBlock(n) => self.visit_seq_block(arena, id, n),
            NodeKind::BlockingAssign(n)
            | NodeKind::NonblockingAssign(n)
            | NodeKind::ContinuousAssign(n) => self.visit_assign(arena, id, n),
            NodeKind::ConditionalStatement(n) => self.visit_conditional_statement(arena, id, n),
            NodeKind::CaseStatement(n) => self.visit_case_statement(arena, id, n),
            NodeKind::CaseItem(n) => self.visit_case_item(arena, id, n),
            NodeKind::TimingControlStatement(n) => {
                self.visit_timing_control_statement(arena, id, n)
            }
            NodeKind::SysTaskEnable(n) => self.visit_sys_task_enable(arena, id, n),
            NodeKind::Event(n) => self.visit_event(arena, id, n),
            NodeKind::EventControl(n) => self.visit_event_control(arena, id, n),
            NodeKind::AlwaysConstruct(n) => self.visit_always_construct(arena, id, n),
            NodeKind::InitialConstruct(n) => self.visit_initial_construct(arena, id, n),
            NodeKind::NetDeclaration(n) => self.visit_net_declaration(arena, id, n),
            NodeKind::RegDeclaration(n) => self.visit_reg_declaration(arena, id, n),
            NodeKind::ParamDeclaration(n) => self.visit_param_declaration(arena, id, n),
            NodeKind::GenvarDeclaration(n) => self.visit_genvar_declaration(arena, id, n),
            NodeKind::PortDeclaration(n) => self.visit_port_declaration(arena, id, n),
            NodeKind::ModuleInstantiation(n) => self.visit_module_instantiation(arena, id, n),
            NodeKind::GenerateIf(n) => self.visit_generate_if(arena, id, n),
            NodeKind::GenerateCase(n) => self.visit_generate_case(arena, id, n),
            NodeKind::GenerateFor(n) => self.visit_generate_for(arena, id, n),
            NodeKind::GenerateBlock(n) => self.visit_generate_block(arena, id, n),
            NodeKind::ModuleDeclaration(n) => self.visit_module_declaration(arena, id, n),
        }
    }
}

/// In-place mutation: same shape as [`Visitor`] but takes `&mut Arena` and
/// is free to call arena mutators (`replace_child`, `push_back_stmt`, ...)
/// from within a hook. Used by `elaborate` and `backend::text_mangle`.
pub trait Editor {
    fn edit_identifier(&mut self, arena: &mut Arena, id: NodeId) {
        let children: Vec<NodeId> = arena.children_of(id);
        for c in children {
            self.edit(arena, c);
        }
    }
    fn edit_default(&mut self, arena: &mut Arena, id: NodeId) {
        let children: Vec<NodeId> = arena.children_of(id);
        for c in children {
            self.edit(arena, c);
        }
    }

    /// Dispatch on tag. The default implementation simply walks children;
    /// override per-tag behavior by matching on `arena.kind(id)` inside an
    /// overridden `edit`.
    fn edit(&mut self, arena: &mut Arena, id: NodeId) {
        match arena.kind(id) {
            NodeKind::Identifier(_) => self.edit_identifier(arena, id),
            _ => self.edit_default(arena, id),
        }
    }
}

/// Fresh-tree construction from non-AST input (the test-only fluent API in
/// [`super::builders`] implements this). A `None` returned from a `maybe`
/// slot excises that child instead of inserting a placeholder.
pub trait Builder {
    fn build(&mut self, arena: &mut Arena) -> NodeId;
}

/// In-place replacement: a hook may return `Some(new_id)` to substitute
/// the visited node in its parent, or `None` to leave it untouched.
/// Children are rewritten bottom-up before the parent's own hook runs, so
/// a parent-level rewrite sees already-rewritten children.
pub trait Rewriter {
    fn rewrite(&mut self, arena: &mut Arena, id: NodeId) -> Option<NodeId> {
        let children: Vec<NodeId> = arena.children_of(id);
        for child in children {
            if let Some(new_child) = self.rewrite(arena, child) {
                arena.replace_child(id, child, new_child);
            }
        }
        None
    }
}
