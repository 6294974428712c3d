//! Per-module fact gathering: which names are declared locally vs.
//! escape to an outer scope, which are ports, which are ever the target
//! of a nonblocking assign (and therefore need state storage), and which
//! are read vs. written. Feeds the backend's variable-table layout and
//! the text-mangle pass's declaration rewriting.

use std::collections::{HashMap, HashSet};

use crate::ast::node::*;
use crate::ast::ops::PortDirection;
use crate::ast::{Arena, NodeId, NodeKind};

#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    pub local: HashSet<String>,
    pub external: HashSet<String>,
    pub input: HashSet<String>,
    pub output: HashSet<String>,
    pub stateful: HashSet<String>,
    pub reads: HashSet<String>,
    pub writes: HashSet<String>,
    pub ports: HashMap<String, PortDirection>,
}

impl ModuleInfo {
    pub fn build(arena: &Arena, module: NodeId) -> ModuleInfo {
        let m = match arena.kind(module) {
            NodeKind::ModuleDeclaration(m) => m,
            _ => panic!("module_info::build called on a non-module node"),
        };

        let mut info = ModuleInfo::default();

        for &port in &m.ports {
            if let NodeKind::PortDeclaration(p) = arena.kind(port) {
                info.ports.insert(p.name.clone(), p.dir);
                info.local.insert(p.name.clone());
                match p.dir {
                    PortDirection::Input => {
                        info.input.insert(p.name.clone());
                    }
                    PortDirection::Output => {
                        info.output.insert(p.name.clone());
                    }
                    PortDirection::Inout => {
                        info.input.insert(p.name.clone());
                        info.output.insert(p.name.clone());
                    }
                }
            }
        }

        for &item in &m.items {
            declare(arena, item, &mut info);
        }

        for &item in &m.items {
            collect_rw(arena, item, &mut info, false);
        }

        info.external = info
            .reads
            .union(&info.writes)
            .filter(|name| !info.local.contains(*name))
            .cloned()
            .collect();

        info
    }
}

fn declare(arena: &Arena, id: NodeId, info: &mut ModuleInfo) {
    match arena.kind(id) {
        NodeKind::NetDeclaration(n) => {
            info.local.insert(n.name.clone());
        }
        NodeKind::RegDeclaration(n) => {
            info.local.insert(n.name.clone());
        }
        NodeKind::ParamDeclaration(n) => {
            info.local.insert(n.name.clone());
        }
        NodeKind::GenvarDeclaration(n) => {
            info.local.insert(n.name.clone());
        }
        NodeKind::ModuleInstantiation(n) => {
            info.local.insert(n.inst_name.clone());
        }
        NodeKind::GenerateBlock(b) => {
            for &c in &b.items {
                declare(arena, c, info);
            }
        }
        NodeKind::GenerateIf(g) => {
            declare(arena, g.then_block, info);
            if let Some(e) = g.else_block {
                declare(arena, e, info);
            }
        }
        NodeKind::GenerateCase(g) => {
            for item in &g.items {
                declare(arena, item.block, info);
            }
        }
        NodeKind::GenerateFor(g) => declare(arena, g.body, info),
        _ => {}
    }
}

fn collect_rw(arena: &Arena, id: NodeId, info: &mut ModuleInfo, in_nonblocking: bool) {
    match arena.kind(id) {
        NodeKind::AlwaysConstruct(a) => collect_rw(arena, a.stmt, info, in_nonblocking),
        NodeKind::InitialConstruct(a) => collect_rw(arena, a.stmt, info, in_nonblocking),
        NodeKind::SeqBlock(b) => {
            for &s in &b.stmts {
                collect_rw(arena, s, info, in_nonblocking);
            }
        }
        NodeKind::TimingControlStatement(t) => {
            collect_reads(arena, t.ctrl, info);
            collect_rw(arena, t.stmt, info, in_nonblocking);
        }
        NodeKind::ContinuousAssign(a) => {
            collect_reads(arena, a.rhs, info);
            collect_writes(arena, a.lhs, info, false);
        }
        NodeKind::BlockingAssign(a) => {
            collect_reads(arena, a.rhs, info);
            collect_writes(arena, a.lhs, info, false);
        }
        NodeKind::NonblockingAssign(a) => {
            collect_reads(arena, a.rhs, info);
            collect_writes(arena, a.lhs, info, true);
        }
        NodeKind::ConditionalStatement(c) => {
            collect_reads(arena, c.cond, info);
            collect_rw(arena, c.then_branch, info, in_nonblocking);
            collect_rw(arena, c.else_branch, info, in_nonblocking);
        }
        NodeKind::CaseStatement(c) => {
            collect_reads(arena, c.cond, info);
            for &item in &c.items {
                collect_rw(arena, item, info, in_nonblocking);
            }
        }
        NodeKind::CaseItem(c) => {
            for &e in &c.exprs {
                collect_reads(arena, e, info);
            }
            collect_rw(arena, c.stmt, info, in_nonblocking);
        }
        NodeKind::SysTaskEnable(s) => {
            for &a in &s.args {
                collect_reads(arena, a, info);
            }
        }
        NodeKind::ModuleInstantiation(m) => {
            for p in &m.params {
                collect_reads(arena, p.value, info);
            }
            for p in &m.ports {
                collect_reads(arena, p.connection, info);
            }
        }
        NodeKind::GenerateBlock(b) => {
            for &c in &b.items {
                collect_rw(arena, c, info, in_nonblocking);
            }
        }
        NodeKind::GenerateIf(g) => {
            collect_reads(arena, g.cond, info);
            collect_rw(arena, g.then_block, info, in_nonblocking);
            if let Some(e) = g.else_block {
                collect_rw(arena, e, info, in_nonblocking);
            }
        }
        NodeKind::GenerateCase(g) => {
            collect_reads(arena, g.cond, info);
            for item in &g.items {
                collect_rw(arena, item.block, info, in_nonblocking);
            }
        }
        NodeKind::GenerateFor(g) => collect_rw(arena, g.body, info, in_nonblocking),
        _ => {}
    }
}

fn collect_reads(arena: &Arena, id: NodeId, info: &mut ModuleInfo) {
    match arena.kind(id) {
        NodeKind::Identifier(n) => {
            info.reads.insert(n.name.clone());
            for &idx in &n.indices {
                collect_reads(arena, idx, info);
            }
        }
        NodeKind::Number(_) => {}
        NodeKind::BinaryExpr(b) => {
            collect_reads(arena, b.lhs, info);
            collect_reads(arena, b.rhs, info);
        }
        NodeKind::UnaryExpr(u) => collect_reads(arena, u.operand, info),
        NodeKind::ConcatExpr(c) => {
            for &e in &c.exprs {
                collect_reads(arena, e, info);
            }
        }
        NodeKind::ConditionalExpr(c) => {
            collect_reads(arena, c.cond, info);
            collect_reads(arena, c.then_branch, info);
            collect_reads(arena, c.else_branch, info);
        }
        _ => {}
    }
}

fn collect_writes(arena: &Arena, id: NodeId, info: &mut ModuleInfo, stateful: bool) {
    if let NodeKind::Identifier(n) = arena.kind(id) {
        info.writes.insert(n.name.clone());
        if stateful {
            info.stateful.insert(n.name.clone());
        }
        for &idx in &n.indices {
            collect_reads(arena, idx, info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;
    use crate::ast::ops::EventKind;

    #[test]
    fn classifies_ports_and_stateful_regs() {
        let mut arena = Arena::new();
        let clk = builders::port_decl(&mut arena, "clk", PortDirection::Input);
        let q = builders::reg_decl(&mut arena, "q", None, vec![]);
        let d_ref = builders::identifier(&mut arena, "d");
        let q_lhs = builders::identifier(&mut arena, "q");
        let nb = builders::nonblocking_assign(&mut arena, q_lhs, d_ref);
        let clk_ref = builders::identifier(&mut arena, "clk");
        let ev = builders::event(&mut arena, EventKind::Posedge, clk_ref);
        let ctrl = builders::event_control(&mut arena, vec![ev]);
        let timed = builders::timing_control_statement(&mut arena, ctrl, nb);
        let always = builders::always(&mut arena, timed);
        let d = builders::port_decl(&mut arena, "d", PortDirection::Input);

        let module = builders::module_decl(&mut arena, "ff", vec![clk, d], vec![q, always]);
        let info = ModuleInfo::build(&arena, module);

        assert!(info.input.contains("clk"));
        assert!(info.input.contains("d"));
        assert!(info.local.contains("q"));
        assert!(info.stateful.contains("q"));
        assert!(info.reads.contains("d"));
        assert!(info.writes.contains("q"));
    }
}
