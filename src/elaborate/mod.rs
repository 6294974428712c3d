//! Generate-block expansion, parameter resolution, and instance
//! resolution/inlining.

use thiserror::Error;

use crate::analysis::{EvalError, Evaluate, ResolveError};
use crate::ast::node::*;
use crate::ast::ops::CaseKind;
use crate::ast::{Arena, NodeId, NodeKind};

#[derive(Debug, Error)]
pub enum ElaborateError {
    #[error(transparent)]
    Resolve(#[from] Box<ResolveError>),
    #[error("generate condition is not a constant: {0}")]
    Eval(#[from] EvalError),
    #[error("instantiation of undeclared module `{0}`")]
    UndeclaredModule(String),
}

/// Expands `generate if/case/for` constructs and resolves module
/// instantiations against a table of known module declarations.
pub struct Elaborate<'a> {
    /// Module declarations known at elaboration time, keyed by name.
    pub modules: &'a std::collections::HashMap<String, NodeId>,
    pub enable_inlining: bool,
}

impl<'a> Elaborate<'a> {
    pub fn new(modules: &'a std::collections::HashMap<String, NodeId>) -> Self {
        Elaborate {
            modules,
            enable_inlining: false,
        }
    }

    /// Expand every generate construct reachable from `module`'s item
    /// list, in place, and resolve every instantiation's `inst` decoration.
    pub fn run(&self, arena: &mut Arena, module: NodeId) -> Result<(), ElaborateError> {
        let items = match arena.kind(module) {
            NodeKind::ModuleDeclaration(m) => m.items.clone(),
            _ => return Ok(()),
        };
        for item in items {
            self.elaborate_item(arena, item)?;
        }
        Ok(())
    }

    fn elaborate_item(&self, arena: &mut Arena, item: NodeId) -> Result<(), ElaborateError> {
        match arena.kind(item) {
            NodeKind::GenerateIf(_) => self.elaborate_if(arena, item),
            NodeKind::GenerateCase(_) => self.elaborate_case(arena, item),
            NodeKind::GenerateFor(_) => self.elaborate_for(arena, item),
            NodeKind::ModuleInstantiation(_) => self.elaborate_instance(arena, item),
            _ => Ok(()),
        }
    }

    fn elaborate_if(&self, arena: &mut Arena, id: NodeId) -> Result<(), ElaborateError> {
        let already = if let NodeKind::GenerateIf(g) = arena.kind(id) {
            *g.gen.borrow()
        } else {
            unreachable!()
        };
        if already.is_some() {
            return Ok(());
        }
        let (cond, then_block, else_block) = if let NodeKind::GenerateIf(g) = arena.kind(id) {
            (g.cond, g.then_block, g.else_block)
        } else {
            unreachable!()
        };
        let taken = Evaluate::eval(arena, cond)?.as_bool();
        let chosen = if taken { Some(then_block) } else { else_block };
        let expanded = match chosen {
            Some(block) => {
                let clone = arena.clone_subtree(block);
                if let NodeKind::GenerateBlock(b) = arena.kind(clone).clone() {
                    for &item in &b.items {
                        self.elaborate_item(arena, item)?;
                    }
                }
                Some(clone)
            }
            None => None,
        };
        if let NodeKind::GenerateIf(g) = &arena.get(id).kind {
            *g.gen.borrow_mut() = expanded;
        }
        if let Some(e) = expanded {
            arena.attach(id, e);
        }
        Ok(())
    }

    fn elaborate_case(&self, arena: &mut Arena, id: NodeId) -> Result<(), ElaborateError> {
        let already = if let NodeKind::GenerateCase(g) = arena.kind(id) {
            *g.gen.borrow()
        } else {
            unreachable!()
        };
        if already.is_some() {
            return Ok(());
        }
        let (cond, items): (NodeId, Vec<GenerateCaseItem>) =
            if let NodeKind::GenerateCase(g) = arena.kind(id) {
                (g.cond, g.items.clone())
            } else {
                unreachable!()
            };
        let cond_value = Evaluate::eval(arena, cond)?;
        let mut chosen = None;
        let mut default = None;
        for item in &items {
            if item.exprs.is_empty() {
                default = Some(item.block);
                continue;
            }
            for &e in &item.exprs {
                let v = Evaluate::eval(arena, e)?;
                if v.eq_value(&cond_value) {
                    chosen = Some(item.block);
                    break;
                }
            }
            if chosen.is_some() {
                break;
            }
        }
        let selected = chosen.or(default);
        let expanded = match selected {
            Some(block) => {
                let clone = arena.clone_subtree(block);
                if let NodeKind::GenerateBlock(b) = arena.kind(clone).clone() {
                    for &item in &b.items {
                        self.elaborate_item(arena, item)?;
                    }
                }
                Some(clone)
            }
            None => None,
        };
        if let NodeKind::GenerateCase(g) = &arena.get(id).kind {
            *g.gen.borrow_mut() = expanded;
        }
        if let Some(e) = expanded {
            arena.attach(id, e);
        }
        Ok(())
    }

    fn elaborate_for(&self, arena: &mut Arena, id: NodeId) -> Result<(), ElaborateError> {
        let already = if let NodeKind::GenerateFor(g) = arena.kind(id) {
            *g.gen.borrow()
        } else {
            unreachable!()
        };
        if already.is_some() {
            return Ok(());
        }
        let (genvar, init, cond, update_rhs, body) = if let NodeKind::GenerateFor(g) = arena.kind(id) {
            (g.genvar.clone(), g.init, g.cond, g.update_rhs, g.body)
        } else {
            unreachable!()
        };

        let mut loop_value = Evaluate::eval(arena, init)?;
        let mut unrolled = Vec::new();
        const MAX_ITERATIONS: u32 = 4096;
        let mut guard = 0;
        loop {
            let synthetic_param = Self::bind_genvar(arena, &genvar, &loop_value);
            bind_genvar_refs(arena, cond, synthetic_param);
            let holds = Evaluate::eval(arena, cond)?.as_bool();
            if !holds {
                arena.erase(synthetic_param);
                break;
            }

            bind_genvar_refs(arena, body, synthetic_param);
            let clone = arena.clone_subtree(body);
            if let NodeKind::GenerateBlock(b) = arena.kind(clone).clone() {
                for &item in &b.items {
                    self.elaborate_item(arena, item)?;
                }
            }
            unrolled.push(clone);

            bind_genvar_refs(arena, update_rhs, synthetic_param);
            loop_value = Evaluate::eval(arena, update_rhs)?;
            arena.erase(synthetic_param);

            guard += 1;
            if guard > MAX_ITERATIONS {
                break;
            }
        }

        let joined = arena.insert(NodeKind::GenerateBlock(GenerateBlockNode {
            items: unrolled.clone(),
        }));
        for item in &unrolled {
            arena.attach(joined, *item);
        }
        if let NodeKind::GenerateFor(g) = &arena.get(id).kind {
            *g.gen.borrow_mut() = Some(joined);
        }
        arena.attach(id, joined);
        Ok(())
    }

    /// Inserts a synthetic `param` node bound to `value`, detached from
    /// any scope (generate-for unrolling is constant-expression-only, so
    /// lookups are satisfied entirely by [`bind_genvar_refs`] stamping the
    /// resolution cache directly rather than via scope-chain lookup).
    fn bind_genvar(arena: &mut Arena, genvar: &str, value: &crate::ast::Bits) -> NodeId {
        let lit = arena.insert(NodeKind::Number(NumberNode {
            value: *value,
            flags: crate::ast::NumberFlags::new(
                value.width(),
                value.is_signed(),
                crate::ast::NumberFormat::Decimal,
            ),
        }));
        let synthetic_param = arena.insert(NodeKind::ParamDeclaration(ParamDeclNode {
            name: genvar.to_string(),
            value: lit,
        }));
        arena.attach(synthetic_param, lit);
        synthetic_param
    }

    fn elaborate_instance(&self, arena: &mut Arena, id: NodeId) -> Result<(), ElaborateError> {
        let already = if let NodeKind::ModuleInstantiation(n) = arena.kind(id) {
            n.inst.borrow().is_some()
        } else {
            unreachable!()
        };
        if already {
            return Ok(());
        }
        let module_name = if let NodeKind::ModuleInstantiation(n) = arena.kind(id) {
            n.module_name.clone()
        } else {
            unreachable!()
        };
        let decl = *self
            .modules
            .get(&module_name)
            .ok_or_else(|| ElaborateError::UndeclaredModule(module_name.clone()))?;
        let clone = arena.clone_subtree(decl);

        if let NodeKind::ModuleInstantiation(n) = &arena.get(id).kind {
            *n.inst.borrow_mut() = Some(clone);
        }

        if self.enable_inlining {
            let cond = arena.insert(NodeKind::Number(NumberNode {
                value: crate::ast::Bits::truthy(1, true),
                flags: crate::ast::NumberFlags::new(
                    1,
                    false,
                    crate::ast::NumberFormat::Decimal,
                ),
            }));
            let then_block = arena.insert(NodeKind::GenerateBlock(GenerateBlockNode {
                items: vec![clone],
            }));
            arena.attach(then_block, clone);
            let gate = arena.insert(NodeKind::GenerateIf(GenerateIfNode {
                cond,
                then_block,
                else_block: None,
                gen: std::cell::RefCell::new(Some(then_block)),
            }));
            arena.attach(gate, cond);
            arena.attach(gate, then_block);
            arena.attach(id, gate);
        }
        Ok(())
    }
}

/// Rewrites every identifier named `genvar` under `root` to resolve to
/// `synthetic_param`, for evaluating a `generate for` step/condition
/// expression against the loop's current value.
fn bind_genvar_refs(arena: &Arena, root: NodeId, synthetic_param: NodeId) {
    let genvar_name = if let NodeKind::ParamDeclaration(p) = arena.kind(synthetic_param) {
        p.name.clone()
    } else {
        return;
    };
    fn walk(arena: &Arena, id: NodeId, name: &str, target: NodeId) {
        match arena.kind(id) {
            NodeKind::Identifier(n) => {
                if n.name == name {
                    n.resolution.set(Some(target));
                    n.needs_update.set(false);
                }
            }
            NodeKind::BinaryExpr(b) => {
                walk(arena, b.lhs, name, target);
                walk(arena, b.rhs, name, target);
            }
            NodeKind::UnaryExpr(u) => walk(arena, u.operand, name, target),
            NodeKind::ConcatExpr(c) => {
                for &e in &c.exprs {
                    walk(arena, e, name, target);
                }
            }
            NodeKind::ConditionalExpr(c) => {
                walk(arena, c.cond, name, target);
                walk(arena, c.then_branch, name, target);
                walk(arena, c.else_branch, name, target);
            }
            _ => {}
        }
    }
    walk(arena, root, &genvar_name, synthetic_param);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;

    #[test]
    fn expands_generate_if_true_branch() {
        let mut arena = Arena::new();
        let cond = builders::number(&mut arena, 1, 1);
        let then_item = builders::net_decl(&mut arena, "a", None, vec![]);
        let then_block = builders::generate_block(&mut arena, vec![then_item]);
        let else_item = builders::net_decl(&mut arena, "b", None, vec![]);
        let else_block = builders::generate_block(&mut arena, vec![else_item]);
        let gate = builders::generate_if(&mut arena, cond, then_block, Some(else_block));

        let modules = std::collections::HashMap::new();
        let pass = Elaborate::new(&modules);
        pass.elaborate_if(&mut arena, gate).unwrap();

        if let NodeKind::GenerateIf(g) = arena.kind(gate) {
            let expanded = g.gen.borrow().unwrap();
            if let NodeKind::GenerateBlock(b) = arena.kind(expanded) {
                assert_eq!(b.items.len(), 1);
                if let NodeKind::NetDeclaration(n) = arena.kind(b.items[0]) {
                    assert_eq!(n.name, "a");
                } else {
                    panic!("expected net declaration");
                }
            } else {
                panic!("expected generate block");
            }
        } else {
            panic!("expected generate if");
        }
    }
}
