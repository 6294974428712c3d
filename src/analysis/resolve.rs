//! Identifier resolution: walk the scope chain outward from an
//! identifier's nearest enclosing scope and cache the declaration it
//! names.

use std::cell::RefCell;
use std::collections::HashMap;

use thiserror::Error;

use crate::ast::node::IdentifierNode;
use crate::ast::{Arena, NodeId, NodeKind, Visitor};

use super::navigate::ScopeIndex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unresolved identifier `{0}`")]
    Unresolved(String),
}

/// A [`Visitor`] that resolves every [`Identifier`](crate::ast::node::IdentifierNode)
/// it reaches, caching the result in the node's `resolution`/`needs_update`
/// cells. Scope indices are built lazily and memoized for the lifetime of
/// this `Resolve` instance.
pub struct Resolve {
    scopes: RefCell<HashMap<NodeId, ScopeIndex>>,
    pub errors: Vec<ResolveError>,
}

impl Resolve {
    pub fn new() -> Self {
        Resolve {
            scopes: RefCell::new(HashMap::new()),
            errors: Vec::new(),
        }
    }

    /// Resolve every identifier reachable from `root`.
    pub fn run(arena: &Arena, root: NodeId) -> Result<(), Vec<ResolveError>> {
        let mut pass = Resolve::new();
        pass.visit(arena, root);
        if pass.errors.is_empty() {
            Ok(())
        } else {
            Err(pass.errors)
        }
    }

    fn scope_chain(&self, arena: &Arena, from: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cur = arena.get(from).parent();
        while let Some(id) = cur {
            if is_scope(arena, id) {
                chain.push(id);
            }
            cur = arena.get(id).parent();
        }
        chain
    }

    fn lookup(&self, arena: &Arena, from: NodeId, name: &str) -> Option<NodeId> {
        for scope in self.scope_chain(arena, from) {
            let mut scopes = self.scopes.borrow_mut();
            let index = scopes
                .entry(scope)
                .or_insert_with(|| ScopeIndex::build(arena, scope));
            if let Some(found) = index.lookup(name) {
                return Some(found);
            }
        }
        None
    }
}

impl Default for Resolve {
    fn default() -> Self {
        Resolve::new()
    }
}

fn is_scope(arena: &Arena, id: NodeId) -> bool {
    matches!(
        arena.kind(id),
        NodeKind::ModuleDeclaration(_) | NodeKind::GenerateBlock(_)
    )
}

impl Visitor for Resolve {
    fn visit_identifier(&mut self, arena: &Arena, id: NodeId, n: &IdentifierNode) {
        for &idx in &n.indices {
            self.visit(arena, idx);
        }
        if !n.needs_update.get() {
            return;
        }
        match self.lookup(arena, id, &n.name) {
            Some(decl) => {
                n.resolution.set(Some(decl));
                n.needs_update.set(false);
            }
            None => self.errors.push(ResolveError::Unresolved(n.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;
    use crate::ast::ops::PortDirection;

    #[test]
    fn resolves_a_port_reference() {
        let mut arena = Arena::new();
        let clk_decl = builders::port_decl(&mut arena, "clk", PortDirection::Input);
        let clk_ref = builders::identifier(&mut arena, "clk");
        let event = builders::event(&mut arena, crate::ast::ops::EventKind::Posedge, clk_ref);
        let ctrl = builders::event_control(&mut arena, vec![event]);
        let body = builders::seq_block(&mut arena, vec![]);
        let timed = builders::timing_control_statement(&mut arena, ctrl, body);
        let always = builders::always(&mut arena, timed);
        let _module = builders::module_decl(&mut arena, "m", vec![clk_decl], vec![always]);

        Resolve::run(&arena, _module).unwrap();
        if let NodeKind::Identifier(n) = arena.kind(clk_ref) {
            assert_eq!(n.resolution.get(), Some(clk_decl));
        } else {
            panic!("expected identifier");
        }
    }

    #[test]
    fn unresolved_identifier_is_an_error() {
        let mut arena = Arena::new();
        let bad_ref = builders::identifier(&mut arena, "nope");
        let assign = builders::blocking_assign(&mut arena, bad_ref, builders::number(&mut arena, 1, 0));
        let module = builders::module_decl(&mut arena, "m", vec![], vec![
            builders::always(&mut arena, builders::seq_block(&mut arena, vec![assign])),
        ]);

        let result = Resolve::run(&arena, module);
        assert!(result.is_err());
    }
}
