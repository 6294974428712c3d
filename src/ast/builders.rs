//! Fluent tree construction, used by integration tests and by
//! `analysis`/`elaborate` passes that synthesize nodes (e.g. machinify's
//! state-check expressions). HDL source parsing is out of scope, so this
//! is the only way trees get built outside a deserialized cache entry.

use super::node::*;
use super::ops::{BinaryOp, CaseKind, EventKind, PortDirection, UnaryOp};
use super::{Arena, Bits, NodeId, NodeKind, NumberFlags};

pub fn identifier(arena: &mut Arena, name: &str) -> NodeId {
    arena.insert(NodeKind::Identifier(IdentifierNode::simple(name)))
}

pub fn indexed(arena: &mut Arena, name: &str, indices: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::Identifier(IdentifierNode {
        name: name.to_string(),
        indices: indices.clone(),
        resolution: std::cell::Cell::new(None),
        needs_update: std::cell::Cell::new(true),
    }));
    for idx in indices {
        arena.attach(id, idx);
    }
    id
}

pub fn number(arena: &mut Arena, width: u32, value: u64) -> NodeId {
    arena.insert(NodeKind::Number(NumberNode {
        value: Bits::from_u64(width, value),
        flags: NumberFlags::new(width, false, super::NumberFormat::Decimal),
    }))
}

pub fn signed_number(arena: &mut Arena, width: u32, value: i64) -> NodeId {
    arena.insert(NodeKind::Number(NumberNode {
        value: Bits::from_i64(width, value),
        flags: NumberFlags::new(width, true, super::NumberFormat::Decimal),
    }))
}

pub fn binary(arena: &mut Arena, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::BinaryExpr(BinaryExprNode { op, lhs, rhs }));
    arena.attach(id, lhs);
    arena.attach(id, rhs);
    id
}

pub fn unary(arena: &mut Arena, op: UnaryOp, operand: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::UnaryExpr(UnaryExprNode { op, operand }));
    arena.attach(id, operand);
    id
}

pub fn concat(arena: &mut Arena, exprs: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::ConcatExpr(ConcatExprNode {
        exprs: exprs.clone(),
    }));
    for e in exprs {
        arena.attach(id, e);
    }
    id
}

pub fn conditional_expr(
    arena: &mut Arena,
    cond: NodeId,
    then_branch: NodeId,
    else_branch: NodeId,
) -> NodeId {
    let id = arena.insert(NodeKind::ConditionalExpr(ConditionalExprNode {
        cond,
        then_branch,
        else_branch,
    }));
    arena.attach(id, cond);
    arena.attach(id, then_branch);
    arena.attach(id, else_branch);
    id
}

pub fn seq_block(arena: &mut Arena, stmts: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::SeqBlock(SeqBlockNode {
        stmts: stmts.clone(),
    }));
    for s in stmts {
        arena.attach(id, s);
    }
    id
}

fn make_assign(arena: &mut Arena, kind: fn(AssignNode) -> NodeKind, lhs: NodeId, rhs: NodeId) -> NodeId {
    let id = arena.insert(kind(AssignNode { lhs, rhs }));
    arena.attach(id, lhs);
    arena.attach(id, rhs);
    id
}

pub fn blocking_assign(arena: &mut Arena, lhs: NodeId, rhs: NodeId) -> NodeId {
    make_assign(arena, NodeKind::BlockingAssign, lhs, rhs)
}

pub fn nonblocking_assign(arena: &mut Arena, lhs: NodeId, rhs: NodeId) -> NodeId {
    make_assign(arena, NodeKind::NonblockingAssign, lhs, rhs)
}

pub fn continuous_assign(arena: &mut Arena, lhs: NodeId, rhs: NodeId) -> NodeId {
    make_assign(arena, NodeKind::ContinuousAssign, lhs, rhs)
}

pub fn conditional_statement(
    arena: &mut Arena,
    cond: NodeId,
    then_branch: NodeId,
    else_branch: NodeId,
) -> NodeId {
    let id = arena.insert(NodeKind::ConditionalStatement(ConditionalStatementNode {
        cond,
        then_branch,
        else_branch,
    }));
    arena.attach(id, cond);
    arena.attach(id, then_branch);
    arena.attach(id, else_branch);
    id
}

pub fn case_item(arena: &mut Arena, exprs: Vec<NodeId>, stmt: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::CaseItem(CaseItemNode {
        exprs: exprs.clone(),
        stmt,
    }));
    for e in exprs {
        arena.attach(id, e);
    }
    arena.attach(id, stmt);
    id
}

pub fn case_statement(arena: &mut Arena, kind: CaseKind, cond: NodeId, items: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::CaseStatement(CaseStatementNode {
        kind,
        cond,
        items: items.clone(),
    }));
    arena.attach(id, cond);
    for i in items {
        arena.attach(id, i);
    }
    id
}

pub fn event(arena: &mut Arena, kind: EventKind, expr: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::Event(EventNode { kind, expr }));
    arena.attach(id, expr);
    id
}

pub fn event_control(arena: &mut Arena, events: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::EventControl(EventControlNode {
        events: events.clone(),
    }));
    for e in events {
        arena.attach(id, e);
    }
    id
}

pub fn timing_control_statement(arena: &mut Arena, ctrl: NodeId, stmt: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::TimingControlStatement(
        TimingControlStatementNode { ctrl, stmt },
    ));
    arena.attach(id, ctrl);
    arena.attach(id, stmt);
    id
}

pub fn sys_task_enable(arena: &mut Arena, name: &str, args: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::SysTaskEnable(SysTaskEnableNode {
        name: name.to_string(),
        args: args.clone(),
    }));
    for a in args {
        arena.attach(id, a);
    }
    id
}

pub fn always(arena: &mut Arena, stmt: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::AlwaysConstruct(AlwaysConstructNode { stmt }));
    arena.attach(id, stmt);
    id
}

pub fn initial(arena: &mut Arena, stmt: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::InitialConstruct(InitialConstructNode { stmt }));
    arena.attach(id, stmt);
    id
}

pub fn net_decl(arena: &mut Arena, name: &str, width: Option<NodeId>, arity: Vec<u32>) -> NodeId {
    let id = arena.insert(NodeKind::NetDeclaration(NetDeclNode {
        name: name.to_string(),
        width,
        arity,
    }));
    if let Some(w) = width {
        arena.attach(id, w);
    }
    id
}

pub fn reg_decl(arena: &mut Arena, name: &str, width: Option<NodeId>, arity: Vec<u32>) -> NodeId {
    let id = arena.insert(NodeKind::RegDeclaration(RegDeclNode {
        name: name.to_string(),
        width,
        arity,
    }));
    if let Some(w) = width {
        arena.attach(id, w);
    }
    id
}

pub fn param_decl(arena: &mut Arena, name: &str, value: NodeId) -> NodeId {
    let id = arena.insert(NodeKind::ParamDeclaration(ParamDeclNode {
        name: name.to_string(),
        value,
    }));
    arena.attach(id, value);
    id
}

pub fn genvar_decl(arena: &mut Arena, name: &str) -> NodeId {
    arena.insert(NodeKind::GenvarDeclaration(GenvarDeclNode {
        name: name.to_string(),
    }))
}

pub fn port_decl(arena: &mut Arena, name: &str, dir: PortDirection) -> NodeId {
    arena.insert(NodeKind::PortDeclaration(PortDeclNode {
        name: name.to_string(),
        dir,
    }))
}

pub fn module_inst(
    arena: &mut Arena,
    module_name: &str,
    inst_name: &str,
    params: Vec<ParamAssignment>,
    ports: Vec<PortConnection>,
) -> NodeId {
    let id = arena.insert(NodeKind::ModuleInstantiation(ModuleInstNode {
        module_name: module_name.to_string(),
        inst_name: inst_name.to_string(),
        params: params.clone(),
        ports: ports.clone(),
        inst: std::cell::RefCell::new(None),
    }));
    for p in &params {
        arena.attach(id, p.value);
    }
    for p in &ports {
        arena.attach(id, p.connection);
    }
    id
}

pub fn generate_block(arena: &mut Arena, items: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::GenerateBlock(GenerateBlockNode {
        items: items.clone(),
    }));
    for i in items {
        arena.attach(id, i);
    }
    id
}

pub fn generate_if(
    arena: &mut Arena,
    cond: NodeId,
    then_block: NodeId,
    else_block: Option<NodeId>,
) -> NodeId {
    let id = arena.insert(NodeKind::GenerateIf(GenerateIfNode {
        cond,
        then_block,
        else_block,
        gen: std::cell::RefCell::new(None),
    }));
    arena.attach(id, cond);
    arena.attach(id, then_block);
    if let Some(e) = else_block {
        arena.attach(id, e);
    }
    id
}

pub fn generate_for(
    arena: &mut Arena,
    genvar: &str,
    init: NodeId,
    cond: NodeId,
    update_lhs: &str,
    update_rhs: NodeId,
    body: NodeId,
) -> NodeId {
    let id = arena.insert(NodeKind::GenerateFor(GenerateForNode {
        genvar: genvar.to_string(),
        init,
        cond,
        update_lhs: update_lhs.to_string(),
        update_rhs,
        body,
        gen: std::cell::RefCell::new(None),
    }));
    arena.attach(id, init);
    arena.attach(id, cond);
    arena.attach(id, update_rhs);
    arena.attach(id, body);
    id
}

pub fn module_decl(arena: &mut Arena, name: &str, ports: Vec<NodeId>, items: Vec<NodeId>) -> NodeId {
    let id = arena.insert(NodeKind::ModuleDeclaration(ModuleDeclNode {
        name: name.to_string(),
        ports: ports.clone(),
        items: items.clone(),
    }));
    for p in ports {
        arena.attach(id, p);
    }
    for i in items {
        arena.attach(id, i);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_toggle_flop() {
        let mut arena = Arena::new();
        let q = identifier(&mut arena, "q");
        let not_q = unary(&mut arena, UnaryOp::BitNot, identifier(&mut arena, "q"));
        let assign = nonblocking_assign(&mut arena, q, not_q);
        let clk = event(&mut arena, EventKind::Posedge, identifier(&mut arena, "clk"));
        let ctrl = event_control(&mut arena, vec![clk]);
        let timed = timing_control_statement(&mut arena, ctrl, assign);
        let body = always(&mut arena, timed);

        let module = module_decl(
            &mut arena,
            "toggle",
            vec![port_decl(&mut arena, "clk", PortDirection::Input)],
            vec![
                reg_decl(&mut arena, "q", None, vec![]),
                body,
            ],
        );

        assert!(arena.get(module).is(super::tags::MODULE_DECLARATION));
        assert_eq!(arena.get(assign).parent(), Some(timed));
    }
}
