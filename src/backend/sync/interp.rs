//! A small tree-walking interpreter over a machinified, mangled module
//! body, reading and writing [`VarTable`] slots. This is the "minimal
//! backend is a direct AST interpreter" path: no bytecode, no further
//! lowering, just a recursive evaluator over the already-restricted tree
//! `machinify`/`text_mangle` produced.

use std::collections::HashMap;

use crate::ast::node::*;
use crate::ast::ops::{BinaryOp, UnaryOp};
use crate::ast::{Arena, Bits, NodeId, NodeKind};
use crate::backend::var_table::VarTable;
use crate::runtime::Interface;

/// Non-blocking assign targets and the synthesized machine-control
/// registers (`__state[i]`, `__task_id[i]`, `__continue`) don't belong to
/// a module's own stateful/input vocabulary, so they live in a side
/// table the interpreter owns rather than in `VarTable` itself.
#[derive(Debug, Default)]
pub struct Registers {
    values: HashMap<String, u32>,
    shadow: HashMap<String, u32>,
    dirty: std::collections::HashSet<String>,
}

impl Registers {
    pub fn get(&self, key: &str) -> u32 {
        *self.values.get(key).unwrap_or(&0)
    }

    pub fn set(&mut self, key: &str, value: u32) {
        self.values.insert(key.to_string(), value);
    }

    fn set_shadow(&mut self, key: &str, value: u32) {
        self.shadow.insert(key.to_string(), value);
        self.dirty.insert(key.to_string());
    }

    pub fn there_are_updates(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Copies every dirty shadow slot into its current value: into
    /// `vars` if the name is one of the module's own stateful/input
    /// variables, into this engine's own register map otherwise (the
    /// synthesized machine-control registers never appear in `VarTable`).
    pub fn apply_updates(&mut self, vars: &mut VarTable) {
        for key in self.dirty.drain().collect::<Vec<_>>() {
            if let Some(v) = self.shadow.remove(&key) {
                if vars.entry(&key).is_some() {
                    vars.set(&key, v);
                } else {
                    self.values.insert(key, v);
                }
            }
        }
    }
}

fn key(name: &str, index: Option<u32>) -> String {
    match index {
        Some(i) => format!("{name}[{i}]"),
        None => name.to_string(),
    }
}

pub struct Interp<'a> {
    pub arena: &'a Arena,
    pub vars: &'a mut VarTable,
    pub regs: &'a mut Registers,
    /// The last non-zero `__task_id` write seen during this interpreter's
    /// lifetime, if any; the synchronous backend resolves tasks
    /// immediately, so this is read back once per state's statement list
    /// rather than suspending mid-execution.
    pub task_fired: Option<u32>,
}

impl<'a> Interp<'a> {
    fn resolve_index(&self, n: &IdentifierNode) -> Option<u32> {
        n.indices.first().map(|&e| self.eval(e).to_u64() as u32)
    }

    fn read(&self, n: &IdentifierNode) -> u32 {
        let idx = self.resolve_index(n);
        let k = key(&n.name, idx);
        if self.vars.entry(&k).is_some() {
            self.vars.get(&k).unwrap_or(0)
        } else {
            self.regs.get(&k)
        }
    }

    fn write_blocking(&mut self, n: &IdentifierNode, value: u32) {
        let idx = self.resolve_index(n);
        let k = key(&n.name, idx);
        if self.vars.entry(&k).is_some() {
            self.vars.set(&k, value);
        } else {
            self.regs.set(&k, value);
        }
    }

    fn write_nonblocking(&mut self, n: &IdentifierNode, value: u32) {
        let idx = self.resolve_index(n);
        let k = key(&n.name, idx);
        self.regs.set_shadow(&k, value);
    }

    pub fn eval(&self, id: NodeId) -> Bits {
        match self.arena.kind(id) {
            NodeKind::Number(n) => n.value,
            NodeKind::Identifier(n) => Bits::from_u64(32, self.read(n) as u64),
            NodeKind::BinaryExpr(b) => {
                let lhs = self.eval(b.lhs);
                let rhs = self.eval(b.rhs);
                eval_binary(b.op, &lhs, &rhs)
            }
            NodeKind::UnaryExpr(u) => {
                let v = self.eval(u.operand);
                eval_unary(u.op, &v)
            }
            NodeKind::ConcatExpr(c) => {
                let parts: Vec<Bits> = c.exprs.iter().map(|&e| self.eval(e)).collect();
                Bits::concat(&parts).unwrap_or_else(|| Bits::from_u64(1, 0))
            }
            NodeKind::ConditionalExpr(c) => {
                if self.eval(c.cond).as_bool() {
                    self.eval(c.then_branch)
                } else {
                    self.eval(c.else_branch)
                }
            }
            _ => Bits::from_u64(1, 0),
        }
    }

    /// Executes one statement. Control never suspends mid-statement-list:
    /// a `__task_id` write just records [`Self::task_fired`] and keeps
    /// going, so the state-transition jump machinify placed right after
    /// the landmark still runs in the same step.
    pub fn exec(&mut self, id: NodeId, interface: &mut dyn Interface) {
        match self.arena.kind(id).clone() {
            NodeKind::SeqBlock(b) => {
                for s in b.stmts {
                    self.exec(s, interface);
                }
            }
            NodeKind::BlockingAssign(a) => {
                let value = self.eval(a.rhs).to_u64() as u32;
                if let NodeKind::Identifier(n) = self.arena.kind(a.lhs) {
                    let is_task_id = n.name == crate::backend::machinify::TASK_ID_REG;
                    self.write_blocking(n, value);
                    if is_task_id && value != 0 {
                        self.task_fired = Some(value);
                    }
                }
            }
            NodeKind::NonblockingAssign(a) => {
                let value = self.eval(a.rhs).to_u64() as u32;
                if let NodeKind::Identifier(n) = self.arena.kind(a.lhs) {
                    self.write_nonblocking(n, value);
                }
            }
            NodeKind::ConditionalStatement(c) => {
                if self.eval(c.cond).as_bool() {
                    self.exec(c.then_branch, interface);
                } else {
                    self.exec(c.else_branch, interface);
                }
            }
            NodeKind::CaseStatement(c) => {
                let cond = self.eval(c.cond);
                let mut matched = false;
                for &item in &c.items {
                    if let NodeKind::CaseItem(ci) = self.arena.kind(item) {
                        if ci.exprs.is_empty() {
                            continue;
                        }
                        if ci.exprs.iter().any(|&e| self.eval(e).eq_value(&cond)) {
                            self.exec(ci.stmt, interface);
                            matched = true;
                            break;
                        }
                    }
                }
                if !matched {
                    for &item in &c.items {
                        if let NodeKind::CaseItem(ci) = self.arena.kind(item) {
                            if ci.exprs.is_empty() {
                                self.exec(ci.stmt, interface);
                                break;
                            }
                        }
                    }
                }
            }
            NodeKind::ContinuousAssign(a) => {
                let value = self.eval(a.rhs).to_u64() as u32;
                if let NodeKind::Identifier(n) = self.arena.kind(a.lhs) {
                    self.write_blocking(n, value);
                }
            }
            _ => {}
        }
    }
}

fn eval_binary(op: BinaryOp, lhs: &Bits, rhs: &Bits) -> Bits {
    use BinaryOp::*;
    match op {
        Add => lhs.add(rhs),
        Sub => lhs.sub(rhs),
        Mul => lhs.mul(rhs),
        Div => lhs.div(rhs).unwrap_or_else(|| Bits::from_u64(lhs.width(), 0)),
        Mod => lhs.rem(rhs).unwrap_or_else(|| Bits::from_u64(lhs.width(), 0)),
        BitAnd => lhs.bitand(rhs),
        BitOr => lhs.bitor(rhs),
        BitXor => lhs.bitxor(rhs),
        LogAnd => Bits::truthy(1, lhs.as_bool() && rhs.as_bool()),
        LogOr => Bits::truthy(1, lhs.as_bool() || rhs.as_bool()),
        Eq => Bits::truthy(1, lhs.eq_value(rhs)),
        Neq => Bits::truthy(1, !lhs.eq_value(rhs)),
        Lt => Bits::truthy(1, lhs.compare(rhs) == std::cmp::Ordering::Less),
        Leq => Bits::truthy(1, lhs.compare(rhs) != std::cmp::Ordering::Greater),
        Gt => Bits::truthy(1, lhs.compare(rhs) == std::cmp::Ordering::Greater),
        Geq => Bits::truthy(1, lhs.compare(rhs) != std::cmp::Ordering::Less),
        Shl => lhs.shl(rhs.to_u64() as u32),
        Shr => lhs.shr(rhs.to_u64() as u32),
    }
}

fn eval_unary(op: UnaryOp, v: &Bits) -> Bits {
    use UnaryOp::*;
    match op {
        Neg => v.negate(),
        LogNot => Bits::truthy(1, !v.as_bool()),
        BitNot => v.bitnot(),
        ReduceAnd => Bits::truthy(1, v.reduce_and()),
        ReduceOr => Bits::truthy(1, v.reduce_or()),
        ReduceXor => Bits::truthy(1, v.reduce_xor()),
        ReduceNand => Bits::truthy(1, v.reduce_nand()),
        ReduceNor => Bits::truthy(1, v.reduce_nor()),
        ReduceXnor => Bits::truthy(1, v.reduce_xnor()),
    }
}
