//! Deterministic storage layout for a compiled module: every stateful
//! variable, input, and task-call argument slot gets a fixed `u32`-word
//! offset into one flat backing array, assigned in lexicographic order so
//! two compiles of the same source produce byte-identical layouts.

use std::collections::HashMap;

use crate::analysis::ModuleInfo;

/// Control-register names appended after every user variable, in this
/// fixed order, so their offsets are deterministic for a given
/// user-variable set (same invariant as the user entries themselves).
pub const CONTROL_REGISTERS: &[&str] = &[
    "__there_are_updates",
    "__there_were_tasks",
    "__apply_update",
    "__drop_update",
    "__resume",
    "__reset",
    "__done",
    "__open_loop",
    "__debug",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarEntry {
    pub begin: u32,
    pub elements: u32,
    pub words_per_element: u32,
    pub bits_per_element: u32,
}

impl VarEntry {
    pub fn len_words(&self) -> u32 {
        self.elements * self.words_per_element
    }
}

#[derive(Debug, Clone, Default)]
pub struct VarTable {
    pub storage: Vec<u32>,
    pub entries: HashMap<String, VarEntry>,
}

impl VarTable {
    /// `task_arguments` are the per-task-call-site synthetic names
    /// `text_mangle` needs storage for (formatted-argument slots); see
    /// `backend::text_mangle::SysTaskTemplate`.
    pub fn build(info: &ModuleInfo, task_arguments: &[String]) -> VarTable {
        let mut names: Vec<String> = info
            .stateful
            .union(&info.input)
            .cloned()
            .chain(task_arguments.iter().cloned())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();

        let mut table = VarTable::default();
        for name in names {
            table.push_entry(&name, 1, 1, 32);
        }
        for &reg in CONTROL_REGISTERS {
            table.push_entry(reg, 1, 1, 1);
        }
        table
    }

    fn push_entry(&mut self, name: &str, elements: u32, words_per_element: u32, bits_per_element: u32) {
        let begin = self.storage.len() as u32;
        let entry = VarEntry {
            begin,
            elements,
            words_per_element,
            bits_per_element,
        };
        self.storage
            .resize(self.storage.len() + entry.len_words() as usize, 0);
        self.entries.insert(name.to_string(), entry);
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        let entry = self.entries.get(name)?;
        self.storage.get(entry.begin as usize).copied()
    }

    pub fn set(&mut self, name: &str, value: u32) -> bool {
        let Some(entry) = self.entries.get(name).copied() else {
            return false;
        };
        if let Some(slot) = self.storage.get_mut(entry.begin as usize) {
            *slot = value;
            true
        } else {
            false
        }
    }

    pub fn entry(&self, name: &str) -> Option<&VarEntry> {
        self.entries.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_lexicographic_and_deterministic() {
        let mut info = ModuleInfo::default();
        info.stateful.insert("q".to_string());
        info.input.insert("clk".to_string());
        info.input.insert("d".to_string());

        let a = VarTable::build(&info, &[]);
        let b = VarTable::build(&info, &[]);
        assert_eq!(a.storage.len(), b.storage.len());

        let clk = a.entry("clk").unwrap();
        let d = a.entry("d").unwrap();
        let q = a.entry("q").unwrap();
        assert!(clk.begin < d.begin);
        assert!(d.begin < q.begin);

        let control_begin = a.entry(CONTROL_REGISTERS[0]).unwrap().begin;
        assert!(control_begin > q.begin);
    }
}
