//! Scope-chain indexing: a per-scope symbol table with a generation
//! counter so [`Resolve`](super::Resolve) can decide, cheaply, whether a
//! cached resolution is still valid without rebuilding every index on
//! every identifier lookup.

use std::cell::Cell;
use std::collections::HashMap;

use crate::ast::{Arena, NodeId, NodeKind};

/// Symbol table for one scope-bearing node (a module or a generate
/// block). `next_update` is bumped by [`invalidate`](Self::invalidate)
/// whenever the owning scope's declarations change (elaboration splicing
/// in a generate expansion, for instance); callers compare it against a
/// stamp taken at resolution time to know whether to re-resolve.
#[derive(Debug)]
pub struct ScopeIndex {
    names: HashMap<String, NodeId>,
    next_update: Cell<u64>,
}

impl ScopeIndex {
    /// Build an index of every name-introducing declaration directly
    /// inside `scope` (module ports/items, or a generate block's items).
    /// Does not recurse into nested scopes.
    pub fn build(arena: &Arena, scope: NodeId) -> ScopeIndex {
        let mut names = HashMap::new();
        let items: Vec<NodeId> = match arena.kind(scope) {
            NodeKind::ModuleDeclaration(m) => {
                m.ports.iter().chain(m.items.iter()).copied().collect()
            }
            NodeKind::GenerateBlock(b) => b.items.clone(),
            _ => Vec::new(),
        };
        for item in items {
            if let Some(name) = declared_name(arena, item) {
                names.insert(name, item);
            }
        }
        ScopeIndex {
            names,
            next_update: Cell::new(0),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn generation(&self) -> u64 {
        self.next_update.get()
    }

    /// Mark this index stale; the next [`Resolve`](super::Resolve) pass
    /// over identifiers cached against the old generation recomputes.
    pub fn invalidate(&self) {
        self.next_update.set(self.next_update.get() + 1);
    }
}

fn declared_name(arena: &Arena, id: NodeId) -> Option<String> {
    match arena.kind(id) {
        NodeKind::NetDeclaration(n) => Some(n.name.clone()),
        NodeKind::RegDeclaration(n) => Some(n.name.clone()),
        NodeKind::ParamDeclaration(n) => Some(n.name.clone()),
        NodeKind::GenvarDeclaration(n) => Some(n.name.clone()),
        NodeKind::PortDeclaration(n) => Some(n.name.clone()),
        NodeKind::ModuleInstantiation(n) => Some(n.inst_name.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;
    use crate::ast::ops::PortDirection;

    #[test]
    fn indexes_ports_and_declarations() {
        let mut arena = Arena::new();
        let clk = builders::port_decl(&mut arena, "clk", PortDirection::Input);
        let q = builders::reg_decl(&mut arena, "q", None, vec![]);
        let module = builders::module_decl(&mut arena, "m", vec![clk], vec![q]);

        let index = ScopeIndex::build(&arena, module);
        assert_eq!(index.lookup("clk"), Some(clk));
        assert_eq!(index.lookup("q"), Some(q));
        assert_eq!(index.lookup("nope"), None);
    }

    #[test]
    fn invalidate_bumps_generation() {
        let mut arena = Arena::new();
        let m = builders::module_decl(&mut arena, "m", vec![], vec![]);
        let index = ScopeIndex::build(&arena, m);
        let g0 = index.generation();
        index.invalidate();
        assert!(index.generation() > g0);
    }
}
