//! Converts an edge-triggered `always` block into a continuation-passing
//! state machine, splitting at every system-task landmark
//! (`__task_id` write) so the scheduler can suspend a module mid-statement
//! while a task (`$display`, `$fopen`, ...) is in flight.
//!
//! Grounded on `examples/original_source/src/target/core/avmm/machinify.h`:
//! the state-splitting rules below (task-landmark split, conditional/case
//! branch-then-join) are a direct Rust port of that header's algorithm.

use crate::ast::node::*;
use crate::ast::ops::{BinaryOp, EventKind};
use crate::ast::{builders, Arena, NodeId, NodeKind};

pub const TASK_ID_REG: &str = "__task_id";
pub const STATE_REG: &str = "__state";
pub const CONTINUE_REG: &str = "__continue";
pub const RESET_REG: &str = "__reset";

/// One machinified `always` block: a sequence of states (each a flat
/// instruction list) plus the machine's index among its module's machines
/// and the index of its terminal "done" state.
pub struct Machine {
    pub index: u32,
    states: Vec<Vec<NodeId>>,
    pub final_state: u32,
}

impl Machine {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state_stmts(&self, state: usize) -> &[NodeId] {
        &self.states[state]
    }
}

pub struct Machinify;

impl Machinify {
    /// Walk `module`'s items; every edge-triggered `always` construct is
    /// purged from the item list and machinified, returned separately
    /// (mirrors `purge_items` from the header: nothing dangles in the
    /// tree). Combinational (`@(*)`/level-sensitive) always blocks are
    /// left untouched.
    pub fn run(arena: &mut Arena, module: NodeId) -> Vec<Machine> {
        let items = match arena.kind(module) {
            NodeKind::ModuleDeclaration(m) => m.items.clone(),
            _ => return Vec::new(),
        };

        let mut machines = Vec::new();
        let mut keep = Vec::new();
        let mut index = 0u32;

        for item in items {
            if let NodeKind::AlwaysConstruct(a) = arena.kind(item).clone() {
                if edge_triggered(arena, a.stmt) {
                    let body = match arena.kind(a.stmt) {
                        NodeKind::TimingControlStatement(t) => t.stmt,
                        _ => a.stmt,
                    };
                    let machine = Generate::run(arena, body, index);
                    machines.push(machine);
                    index += 1;
                    continue;
                }
            }
            keep.push(item);
        }

        if let NodeKind::ModuleDeclaration(m) = &mut arena.get_mut(module).kind {
            m.items = keep;
        }

        machines
    }
}

/// True if `stmt` (an always block's body) is gated by an edge-list event
/// control (`@(posedge clk)`, not `@(*)`).
fn edge_triggered(arena: &Arena, stmt: NodeId) -> bool {
    if let NodeKind::TimingControlStatement(t) = arena.kind(stmt) {
        if let NodeKind::EventControl(ctrl) = arena.kind(t.ctrl) {
            return ctrl.events.iter().any(|&e| {
                matches!(
                    arena.kind(e),
                    NodeKind::Event(ev) if ev.kind == EventKind::Posedge || ev.kind == EventKind::Negedge
                )
            });
        }
    }
    false
}

/// Short-circuiting check for a `__task_id` write anywhere under `id`.
fn contains_task_landmark(arena: &Arena, id: NodeId) -> bool {
    if is_task_id_assign(arena, id) {
        return true;
    }
    arena
        .children_of(id)
        .into_iter()
        .any(|c| contains_task_landmark(arena, c))
}

fn is_task_id_assign(arena: &Arena, id: NodeId) -> bool {
    if let NodeKind::BlockingAssign(a) = arena.kind(id) {
        if let NodeKind::Identifier(n) = arena.kind(a.lhs) {
            return n.name == TASK_ID_REG;
        }
    }
    false
}

fn is_empty_seq(arena: &Arena, id: NodeId) -> bool {
    matches!(arena.kind(id), NodeKind::SeqBlock(b) if b.stmts.is_empty())
}

struct Generate<'a> {
    arena: &'a mut Arena,
    states: Vec<Vec<NodeId>>,
    idx: u32,
}

impl<'a> Generate<'a> {
    fn run(arena: &'a mut Arena, trigger: NodeId, idx: u32) -> Machine {
        let mut gen = Generate {
            arena,
            states: vec![Vec::new()],
            idx,
        };
        let mut cur = 0usize;
        cur = gen.process(trigger, cur, true);
        // A freshly seeded machine (no task landmark ever split it) stays
        // at state 0 forever, re-running its whole body every edge, same
        // as an ordinary always block; only a machine that actually split
        // needs an empty terminal state to mark completion.
        if gen.states.len() > 1 && !gen.states[cur].is_empty() {
            let done = gen.states.len();
            gen.states.push(Vec::new());
            let jump = gen.build_state_jump(done as u32);
            gen.states[cur].push(jump);
            cur = done;
        }
        Machine {
            index: idx,
            states: gen.states,
            final_state: cur as u32,
        }
    }

    /// Process one statement (possibly a `SeqBlock` wrapping many) into
    /// the state list, returning the state index to continue appending
    /// into afterward.
    fn process(&mut self, stmt: NodeId, mut cur: usize, is_last: bool) -> usize {
        match self.arena.kind(stmt).clone() {
            NodeKind::SeqBlock(b) => {
                let n = b.stmts.len();
                for (i, s) in b.stmts.into_iter().enumerate() {
                    cur = self.process_one(s, cur, is_last && i + 1 == n);
                }
                cur
            }
            _ => self.process_one(stmt, cur, is_last),
        }
    }

    fn process_one(&mut self, stmt: NodeId, cur: usize, is_last: bool) -> usize {
        if is_task_id_assign(self.arena, stmt) {
            let cloned = self.rescope(stmt);
            self.states[cur].push(cloned);
            if !is_last {
                let next = self.states.len();
                self.states.push(Vec::new());
                let jump = self.build_state_jump(next as u32);
                self.states[cur].push(jump);
                return next;
            }
            return cur;
        }

        match self.arena.kind(stmt).clone() {
            NodeKind::ConditionalStatement(c) => {
                self.process_conditional(stmt, c, cur, is_last)
            }
            NodeKind::CaseStatement(c) => self.process_case(stmt, c, cur, is_last),
            _ => {
                self.states[cur].push(stmt);
                cur
            }
        }
    }

    fn process_conditional(
        &mut self,
        original: NodeId,
        c: ConditionalStatementNode,
        cur: usize,
        is_last: bool,
    ) -> usize {
        let then_has = contains_task_landmark(self.arena, c.then_branch);
        let else_has = contains_task_landmark(self.arena, c.else_branch);
        if !then_has && !else_has {
            self.states[cur].push(original);
            return cur;
        }

        let else_trivial = is_empty_seq(self.arena, c.else_branch);

        let then_state = self.states.len();
        self.states.push(Vec::new());
        let then_exit = self.process(c.then_branch, then_state, is_last);

        let else_state = if else_trivial {
            None
        } else {
            let s = self.states.len();
            self.states.push(Vec::new());
            Some(self.process(c.else_branch, s, is_last))
        };

        // A join state is always allocated once either arm contains a task
        // landmark, even in the last-statement/empty-else case the header
        // skips it for: one extra trivial state is cheaper than threading
        // the "no join" case through correctly.
        let join = self.states.len();
        self.states.push(Vec::new());
        let jump_then = self.build_state_jump(join as u32);
        self.states[then_exit].push(jump_then);
        if let Some(else_exit) = else_state {
            let jump_else = self.build_state_jump(join as u32);
            self.states[else_exit].push(jump_else);
        }

        let else_target = else_state.unwrap_or(join);
        let dispatch = self.build_dispatch_if(c.cond, then_state as u32, else_target as u32);
        self.states[cur].push(dispatch);

        join
    }

    fn process_case(
        &mut self,
        original: NodeId,
        c: CaseStatementNode,
        cur: usize,
        is_last: bool,
    ) -> usize {
        let any_task = c
            .items
            .iter()
            .any(|&item| contains_task_landmark(self.arena, item));
        if !any_task {
            self.states[cur].push(original);
            return cur;
        }

        let join = self.states.len();
        self.states.push(Vec::new());

        let mut arms = Vec::new();
        for &item in &c.items {
            let (exprs, body) = if let NodeKind::CaseItem(ci) = self.arena.kind(item) {
                (ci.exprs.clone(), ci.stmt)
            } else {
                continue;
            };
            let state = self.states.len();
            self.states.push(Vec::new());
            let exit = self.process(body, state, is_last);
            let jump = self.build_state_jump(join as u32);
            self.states[exit].push(jump);
            arms.push((exprs, state as u32));
        }

        let dispatch = self.build_dispatch_case(c.cond, arms);
        self.states[cur].push(dispatch);
        join
    }

    /// Rebuild `stmt` (a `__task_id := rhs` blocking assign) with the
    /// machine's index prefixed onto the target, so multiple machines
    /// sharing one `__task_id` array each write their own slot.
    fn rescope(&mut self, stmt: NodeId) -> NodeId {
        let rhs = match self.arena.kind(stmt) {
            NodeKind::BlockingAssign(a) => a.rhs,
            _ => unreachable!("rescope called on a non-task-id assign"),
        };
        let rhs_clone = self.arena.clone_subtree(rhs);
        let lhs = self.indexed_reg(TASK_ID_REG);
        builders::blocking_assign(self.arena, lhs, rhs_clone)
    }

    fn indexed_reg(&mut self, name: &str) -> NodeId {
        let idx_lit = builders::number(self.arena, 32, self.idx as u64);
        builders::indexed(self.arena, name, vec![idx_lit])
    }

    fn build_state_jump(&mut self, target: u32) -> NodeId {
        let lhs = self.indexed_reg(STATE_REG);
        let rhs = builders::number(self.arena, 32, target as u64);
        builders::blocking_assign(self.arena, lhs, rhs)
    }

    fn build_dispatch_if(&mut self, cond: NodeId, then_state: u32, else_state: u32) -> NodeId {
        let lhs_then = self.indexed_reg(STATE_REG);
        let rhs_then = builders::number(self.arena, 32, then_state as u64);
        let then_assign = builders::blocking_assign(self.arena, lhs_then, rhs_then);
        let lhs_else = self.indexed_reg(STATE_REG);
        let rhs_else = builders::number(self.arena, 32, else_state as u64);
        let else_assign = builders::blocking_assign(self.arena, lhs_else, rhs_else);
        builders::conditional_statement(self.arena, cond, then_assign, else_assign)
    }

    fn build_dispatch_case(&mut self, cond: NodeId, arms: Vec<(Vec<NodeId>, u32)>) -> NodeId {
        let mut items = Vec::new();
        for (exprs, target) in arms {
            let lhs = self.indexed_reg(STATE_REG);
            let rhs = builders::number(self.arena, 32, target as u64);
            let assign = builders::blocking_assign(self.arena, lhs, rhs);
            items.push(builders::case_item(self.arena, exprs, assign));
        }
        builders::case_statement(self.arena, crate::ast::ops::CaseKind::Case, cond, items)
    }
}

/// OR-reduce `state[i] == final_state[i]` across every machine in a
/// module — used to gate the clocked block's overall "settled" signal.
pub fn all_final(arena: &mut Arena, machines: &[Machine]) -> NodeId {
    let mut terms = Vec::new();
    for m in machines {
        let idx_lit = builders::number(arena, 32, m.index as u64);
        let state_ref = builders::indexed(arena, STATE_REG, vec![idx_lit]);
        let final_lit = builders::number(arena, 32, m.final_state as u64);
        terms.push(builders::binary(arena, BinaryOp::Eq, state_ref, final_lit));
    }
    reduce(arena, terms, BinaryOp::LogAnd, true)
}

/// OR-reduce `task_id[i] != 0` across every machine — true while any
/// machine still has a pending task.
pub fn there_were_tasks(arena: &mut Arena, machines: &[Machine]) -> NodeId {
    let mut terms = Vec::new();
    for m in machines {
        let idx_lit = builders::number(arena, 32, m.index as u64);
        let task_ref = builders::indexed(arena, TASK_ID_REG, vec![idx_lit]);
        let zero = builders::number(arena, 32, 0);
        terms.push(builders::binary(arena, BinaryOp::Neq, task_ref, zero));
    }
    reduce(arena, terms, BinaryOp::LogOr, false)
}

fn reduce(arena: &mut Arena, terms: Vec<NodeId>, op: BinaryOp, empty_value: bool) -> NodeId {
    let mut iter = terms.into_iter();
    match iter.next() {
        None => builders::number(arena, 1, empty_value as u64),
        Some(first) => iter.fold(first, |acc, t| builders::binary(arena, op, acc, t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;

    fn posedge_clk_always(arena: &mut Arena, body: NodeId) -> NodeId {
        let clk = builders::identifier(arena, "clk");
        let ev = builders::event(arena, EventKind::Posedge, clk);
        let ctrl = builders::event_control(arena, vec![ev]);
        let timed = builders::timing_control_statement(arena, ctrl, body);
        builders::always(arena, timed)
    }

    #[test]
    fn no_task_block_yields_one_state() {
        let mut arena = Arena::new();
        let q = builders::identifier(&mut arena, "q");
        let d = builders::identifier(&mut arena, "d");
        let assign = builders::nonblocking_assign(&mut arena, q, d);
        let body = builders::seq_block(&mut arena, vec![assign]);
        let always = posedge_clk_always(&mut arena, body);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![always]);

        let machines = Machinify::run(&mut arena, module);
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].state_count(), 1);
        assert_eq!(machines[0].final_state, 0);
    }

    #[test]
    fn single_task_landmark_splits_into_two_states() {
        let mut arena = Arena::new();
        let task_id = builders::identifier(&mut arena, "__task_id");
        let one = builders::number(&mut arena, 32, 1);
        let task_assign = builders::blocking_assign(&mut arena, task_id, one);
        let q = builders::identifier(&mut arena, "q");
        let d = builders::identifier(&mut arena, "d");
        let trailing = builders::nonblocking_assign(&mut arena, q, d);
        let body = builders::seq_block(&mut arena, vec![task_assign, trailing]);
        let always = posedge_clk_always(&mut arena, body);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![always]);

        let machines = Machinify::run(&mut arena, module);
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].state_count(), 3);
        assert_eq!(machines[0].final_state, 2);
    }

    #[test]
    fn combinational_always_is_left_alone() {
        let mut arena = Arena::new();
        let star = builders::identifier(&mut arena, "*");
        let ev = builders::event(&mut arena, EventKind::Edge, star);
        let ctrl = builders::event_control(&mut arena, vec![ev]);
        let body = builders::seq_block(&mut arena, vec![]);
        let timed = builders::timing_control_statement(&mut arena, ctrl, body);
        let always = builders::always(&mut arena, timed);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![always]);

        let machines = Machinify::run(&mut arena, module);
        assert!(machines.is_empty());
        if let NodeKind::ModuleDeclaration(m) = arena.kind(module) {
            assert_eq!(m.items.len(), 1);
        }
    }
}
