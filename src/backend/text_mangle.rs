//! Rewrites a module's body into the restricted form the `sync` backend's
//! interpreter actually executes: declarations become table lookups
//! rather than AST nodes, non-blocking assigns become shadow writes, and
//! system tasks become `__task_id` writes plus a side table the runtime
//! recovers the call from.

use std::collections::HashMap;

use crate::analysis::ModuleInfo;
use crate::ast::node::*;
use crate::ast::{Arena, NodeId, NodeKind};
use crate::backend::var_table::VarTable;

/// A system task call site, captured by `__task_id`'s value so the
/// runtime can recover the original call without re-walking the AST.
#[derive(Debug, Clone)]
pub struct SysTaskTemplate {
    pub name: String,
    pub args: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct TextMangleResult {
    pub var_table: VarTable,
    pub tasks: Vec<SysTaskTemplate>,
    /// `fd -> __feof_<fd>` slot names referenced by rewritten `feof` calls.
    pub feof_slots: HashMap<String, String>,
}

const MANGLED_TASKS: &[&str] = &[
    "$display", "$write", "$finish", "$fseek", "$fflush", "$fopen", "$get", "$put", "$restart",
    "$retarget", "$save",
];

pub struct TextMangle {
    next_task_id: u32,
    task_argument_slots: Vec<String>,
    result: TextMangleResult,
}

impl TextMangle {
    pub fn run(arena: &mut Arena, module: NodeId, info: &ModuleInfo) -> TextMangleResult {
        let mut pass = TextMangle {
            next_task_id: 1,
            task_argument_slots: Vec::new(),
            result: TextMangleResult::default(),
        };
        pass.strip_declarations(arena, module);
        let items = match arena.kind(module) {
            NodeKind::ModuleDeclaration(m) => m.items.clone(),
            _ => Vec::new(),
        };
        for item in items {
            pass.mangle_item(arena, item);
        }
        pass.result.var_table = VarTable::build(info, &pass.task_argument_slots);
        pass.result
    }

    /// Declarations are dropped from the item list once captured; the
    /// identifiers they introduce stay as plain names, resolved through
    /// `VarTable` at evaluation time rather than rewritten in the tree.
    fn strip_declarations(&mut self, arena: &mut Arena, module: NodeId) {
        let (kept, dropped): (Vec<NodeId>, Vec<NodeId>) = if let NodeKind::ModuleDeclaration(m) =
            arena.kind(module)
        {
            m.items.iter().partition(|&&item| {
                !matches!(
                    arena.kind(item),
                    NodeKind::NetDeclaration(_)
                        | NodeKind::RegDeclaration(_)
                        | NodeKind::ParamDeclaration(_)
                        | NodeKind::GenvarDeclaration(_)
                )
            })
        } else {
            (Vec::new(), Vec::new())
        };
        if let NodeKind::ModuleDeclaration(m) = &mut arena.get_mut(module).kind {
            m.items = kept;
        }
        for item in dropped {
            arena.detach(item);
            arena.erase(item);
        }
    }

    fn mangle_item(&mut self, arena: &mut Arena, id: NodeId) {
        match arena.kind(id).clone() {
            NodeKind::AlwaysConstruct(a) => self.mangle_stmt(arena, a.stmt),
            NodeKind::InitialConstruct(a) => self.mangle_stmt(arena, a.stmt),
            NodeKind::ContinuousAssign(_) => {}
            _ => {}
        }
    }

    fn mangle_stmt(&mut self, arena: &mut Arena, id: NodeId) {
        match arena.kind(id).clone() {
            NodeKind::SeqBlock(b) => {
                for &s in &b.stmts {
                    self.mangle_stmt(arena, s);
                }
            }
            NodeKind::TimingControlStatement(t) => self.mangle_stmt(arena, t.stmt),
            NodeKind::ConditionalStatement(c) => {
                self.mangle_stmt(arena, c.then_branch);
                self.mangle_stmt(arena, c.else_branch);
            }
            NodeKind::CaseStatement(c) => {
                for &item in &c.items {
                    self.mangle_stmt(arena, item);
                }
            }
            NodeKind::CaseItem(c) => self.mangle_stmt(arena, c.stmt),
            NodeKind::SysTaskEnable(s) => {
                let rewritten = self.mangle_sys_task(arena, id, &s);
                arena.replace_child(
                    arena.get(id).parent().expect("sys task must have a parent"),
                    id,
                    rewritten,
                );
            }
            _ => {}
        }
    }

    fn mangle_sys_task(&mut self, arena: &mut Arena, id: NodeId, s: &SysTaskEnableNode) -> NodeId {
        if s.name == "$feof" {
            return self.mangle_feof(arena, s);
        }
        if !MANGLED_TASKS.contains(&s.name.as_str()) {
            return id;
        }
        let task_id = self.next_task_id;
        self.next_task_id += 1;
        self.result.tasks.push(SysTaskTemplate {
            name: s.name.clone(),
            args: s.args.clone(),
        });
        for (i, _) in s.args.iter().enumerate() {
            self.task_argument_slots
                .push(format!("__task_arg_{task_id}_{i}"));
        }

        let lhs = crate::ast::builders::identifier(arena, "__task_id");
        let rhs = crate::ast::builders::number(arena, 32, task_id as u64);
        crate::ast::builders::blocking_assign(arena, lhs, rhs)
    }

    fn mangle_feof(&mut self, arena: &mut Arena, s: &SysTaskEnableNode) -> NodeId {
        let fd_name = match s.args.first() {
            Some(&arg) => describe_fd(arena, arg),
            None => "0".to_string(),
        };
        let slot = format!("__feof_{fd_name}");
        self.result.feof_slots.insert(fd_name, slot.clone());
        crate::ast::builders::identifier(arena, &slot)
    }
}

fn describe_fd(arena: &Arena, id: NodeId) -> String {
    match arena.kind(id) {
        NodeKind::Identifier(n) => n.name.clone(),
        NodeKind::Number(n) => n.value.to_u64().to_string(),
        _ => "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;

    #[test]
    fn strips_declarations_and_keeps_always_blocks() {
        let mut arena = Arena::new();
        let q = builders::reg_decl(&mut arena, "q", None, vec![]);
        let lhs = builders::identifier(&mut arena, "q");
        let rhs = builders::number(&mut arena, 1, 1);
        let assign = builders::blocking_assign(&mut arena, lhs, rhs);
        let block = builders::seq_block(&mut arena, vec![assign]);
        let always = builders::always(&mut arena, block);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![q, always]);

        let info = ModuleInfo::build(&arena, module);
        let _ = TextMangle::run(&mut arena, module, &info);
        if let NodeKind::ModuleDeclaration(m) = arena.kind(module) {
            assert_eq!(m.items.len(), 1);
            assert!(matches!(arena.kind(m.items[0]), NodeKind::AlwaysConstruct(_)));
        }
    }

    #[test]
    fn rewrites_display_into_a_task_id_write() {
        let mut arena = Arena::new();
        let arg = builders::number(&mut arena, 8, 65);
        let display = builders::sys_task_enable(&mut arena, "$display", vec![arg]);
        let block = builders::seq_block(&mut arena, vec![display]);
        let initial = builders::initial(&mut arena, block);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![initial]);

        let info = ModuleInfo::build(&arena, module);
        let result = TextMangle::run(&mut arena, module, &info);
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].name, "$display");

        if let NodeKind::InitialConstruct(i) = arena.kind(initial) {
            if let NodeKind::SeqBlock(b) = arena.kind(i.stmt) {
                assert!(matches!(
                    arena.kind(b.stmts[0]),
                    NodeKind::BlockingAssign(_)
                ));
            }
        }
    }
}
