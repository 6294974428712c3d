//! Process-wide string interner for identifier and module names that are
//! compared often (scope lookups, module-name dispatch in `navigate`).
//! Tokens are monotonic `u32`s and are never recycled, even if the
//! underlying string is later unreachable, so a stored token always
//! resolves.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct Table {
    strings: Vec<Arc<str>>,
    lookup: HashMap<Arc<str>, u32>,
}

impl Table {
    fn new() -> Self {
        Table {
            strings: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&id) = self.lookup.get(s) {
            return Symbol(id);
        }
        let arc: Arc<str> = Arc::from(s);
        let id = self.strings.len() as u32;
        self.strings.push(arc.clone());
        self.lookup.insert(arc, id);
        Symbol(id)
    }

    fn resolve(&self, sym: Symbol) -> Arc<str> {
        self.strings[sym.0 as usize].clone()
    }
}

/// A handle around the shared, process-wide symbol table.
#[derive(Clone)]
pub struct Interner {
    table: Arc<Mutex<Table>>,
}

impl Default for Interner {
    fn default() -> Self {
        Interner {
            table: Arc::new(Mutex::new(Table::new())),
        }
    }
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    pub fn intern(&self, s: &str) -> Symbol {
        self.table.lock().intern(s)
    }

    pub fn resolve(&self, sym: Symbol) -> Arc<str> {
        self.table.lock().resolve(sym)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_yields_same_symbol() {
        let i = Interner::new();
        let a = i.intern("clk");
        let b = i.intern("clk");
        assert_eq!(a, b);
        assert_eq!(&*i.resolve(a), "clk");
    }

    #[test]
    fn distinct_strings_yield_distinct_symbols() {
        let i = Interner::new();
        let a = i.intern("clk");
        let b = i.intern("rst");
        assert_ne!(a, b);
    }
}
