//! The synchronous backend: `SyncEngine` implements [`Engine`] directly
//! over a [`VarTable`] plus a machinified, mangled module body, using a
//! small tree-walking interpreter rather than a further lowering to
//! bytecode or native code.

pub mod interp;

use std::collections::HashMap;

use thiserror::Error;

use crate::analysis::ModuleInfo;
use crate::ast::{Arena, Bits, NodeId};
use crate::backend::machinify::{self, Machine, Machinify};
use crate::backend::text_mangle::{SysTaskTemplate, TextMangle};
use crate::backend::var_table::VarTable;
use crate::elaborate::{Elaborate, ElaborateError};
use crate::runtime::{Engine, EngineError, Interface};
use interp::{Interp, Registers};

/// Recursively unwraps nested `SeqBlock`s into their leaf statements, so
/// [`SyncEngine::run_initial`] can dispatch a fired task between every
/// individual statement instead of only after the whole body runs.
fn flatten_stmt(arena: &Arena, id: NodeId, out: &mut Vec<NodeId>) {
    match arena.kind(id) {
        crate::ast::NodeKind::SeqBlock(b) => {
            for &s in &b.stmts {
                flatten_stmt(arena, s, out);
            }
        }
        _ => out.push(id),
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Elaborate(#[from] ElaborateError),
}

/// A compiled module, ready to be driven by a [`crate::runtime::Scheduler`].
pub struct SyncEngine {
    arena: Arena,
    machines: Vec<Machine>,
    continuous_assigns: Vec<NodeId>,
    var_table: VarTable,
    regs: Registers,
    tasks: Vec<SysTaskTemplate>,
    feof_slots: HashMap<String, String>,
    /// Whether any machine fired a system task during the most recent
    /// `evaluate()`; tasks resolve synchronously, so the `__task_id`
    /// registers themselves are always zero again by the time a caller
    /// could observe them.
    last_step_had_tasks: bool,
    /// `initial` construct bodies, run exactly once before the first
    /// `evaluate()`'s continuous assigns and state machines.
    initial_stmts: Vec<NodeId>,
    ran_initial: bool,
    /// `machinify::all_final` composed across every machine in the
    /// module, built once at compile time; evaluated as a post-step
    /// invariant check rather than spliced into a synthesized hardware
    /// block (this backend interprets each `Machine` directly, it never
    /// assembles one monolithic clocked-block AST).
    settled_expr: Option<NodeId>,
    /// `machinify::there_were_tasks` composed across every machine,
    /// same compile-time construction as `settled_expr`.
    pending_tasks_expr: Option<NodeId>,
}

impl SyncEngine {
    /// Runs elaborate -> module_info -> machinify -> text_mangle -> var
    /// table build, in that order, and assembles the resulting pieces
    /// into a runnable engine.
    pub fn compile(
        mut arena: Arena,
        module: NodeId,
        modules: &HashMap<String, NodeId>,
    ) -> Result<SyncEngine, CompileError> {
        Elaborate::new(modules).run(&mut arena, module)?;

        let info = ModuleInfo::build(&arena, module);

        // `TextMangle` must run before `Machinify`: machinify.h's own
        // header comment says this pass "uses system tasks as landmarks,
        // but recall that they've been replaced by non-blocking assigns to
        // __next_task_id in pass 1" — the landmark doesn't exist until
        // text-mangling plants it, so machinify has nothing to split on if
        // it runs first.
        let mangled = TextMangle::run(&mut arena, module, &info);
        let machines = Machinify::run(&mut arena, module);

        let (continuous_assigns, initial_stmts) = if let crate::ast::NodeKind::ModuleDeclaration(m) =
            arena.kind(module)
        {
            let continuous = m
                .items
                .iter()
                .copied()
                .filter(|&item| {
                    matches!(arena.kind(item), crate::ast::NodeKind::ContinuousAssign(_))
                })
                .collect();
            let initial = m
                .items
                .iter()
                .copied()
                .filter_map(|item| match arena.kind(item) {
                    crate::ast::NodeKind::InitialConstruct(i) => Some(i.stmt),
                    _ => None,
                })
                .collect();
            (continuous, initial)
        } else {
            (Vec::new(), Vec::new())
        };

        let mut regs = Registers::default();
        for m in &machines {
            regs.set(&format!("__state[{}]", m.index), 0);
            regs.set(&format!("__task_id[{}]", m.index), 0);
            regs.set(&format!("{}[{}]", machinify::CONTINUE_REG, m.index), 0);
            regs.set(&format!("{}[{}]", machinify::RESET_REG, m.index), 0);
        }

        let settled_expr = if machines.is_empty() {
            None
        } else {
            Some(machinify::all_final(&mut arena, &machines))
        };
        let pending_tasks_expr = if machines.is_empty() {
            None
        } else {
            Some(machinify::there_were_tasks(&mut arena, &machines))
        };

        Ok(SyncEngine {
            arena,
            machines,
            continuous_assigns,
            var_table: mangled.var_table,
            regs,
            tasks: mangled.tasks,
            feof_slots: mangled.feof_slots,
            last_step_had_tasks: false,
            initial_stmts,
            ran_initial: false,
            settled_expr,
            pending_tasks_expr,
        })
    }

    fn interp(&mut self) -> Interp<'_> {
        Interp {
            arena: &self.arena,
            vars: &mut self.var_table,
            regs: &mut self.regs,
            task_fired: None,
        }
    }

    pub fn feof_slot(&self, fd: &str) -> Option<&str> {
        self.feof_slots.get(fd).map(String::as_str)
    }

    pub fn task_template(&self, task_id: u32) -> Option<&SysTaskTemplate> {
        self.tasks.get(task_id.checked_sub(1)? as usize)
    }

    /// Runs one machine through this clock edge. A trivial single-state
    /// machine (no task landmark ever split it) has `final_state` equal to
    /// its only state, so it always re-runs its whole body; a multi-state
    /// machine parked at `final_state` from the previous edge first rolls
    /// over to state 0, then drains every state it reaches this edge —
    /// `__continue` pulsing once per task landmark — since tasks resolve
    /// synchronously and there is no real suspend/resume across scheduler
    /// steps (see the synchronous-task-resolution decision in DESIGN.md).
    fn run_machine_step(&mut self, machine_idx: usize, interface: &mut dyn Interface) {
        let (index, final_state) = {
            let m = &self.machines[machine_idx];
            (m.index, m.final_state)
        };
        let state_key = format!("{}[{}]", machinify::STATE_REG, index);
        let continue_key = format!("{}[{}]", machinify::CONTINUE_REG, index);
        let reset_key = format!("{}[{}]", machinify::RESET_REG, index);

        if self.regs.get(&state_key) == final_state {
            self.regs.set(&state_key, 0);
            self.regs.set(&reset_key, 0);
        }

        self.regs.set(&continue_key, 1);
        while self.regs.get(&continue_key) != 0 {
            let state = self.regs.get(&state_key);
            let stmts: Vec<NodeId> = self.machines[machine_idx]
                .state_stmts(state as usize)
                .to_vec();

            let task_fired = {
                let mut interp = self.interp();
                for stmt in stmts {
                    interp.exec(stmt, interface);
                }
                interp.task_fired
            };
            if let Some(task_id) = task_fired {
                self.last_step_had_tasks = true;
                self.dispatch_task(index, task_id, interface);
            }

            let next_state = self.regs.get(&state_key);
            if next_state == state || next_state == final_state {
                self.regs.set(&continue_key, 0);
                self.regs.set(&reset_key, (next_state == final_state) as u32);
            }
        }
    }

    /// Runs every `initial` construct body once, dispatching any system
    /// task it fires the same way a machine step would. `initial` blocks
    /// have no `__state`/`__task_id` machine index of their own, so the
    /// fired task is looked up and cleared directly rather than through
    /// [`Self::dispatch_task`].
    ///
    /// Unlike an `always` block, `initial` statements are never split by
    /// [`Machinify`]: a whole `initial` body executes in one
    /// [`Interp::exec`] call, and `task_fired` only remembers the last
    /// landmark seen. Flattening the body's top-level `SeqBlock`s and
    /// dispatching after each individual statement keeps every `$display`/
    /// `$finish`/... visible, matching `initial`'s "runs to completion,
    /// printing as it goes" semantics; a task landmark nested inside a
    /// conditional or case arm still only surfaces once its enclosing
    /// statement finishes, same narrowing `always` blocks would need
    /// machinify's state-splitting to avoid.
    fn run_initial(&mut self, interface: &mut dyn Interface) {
        let stmts = self.initial_stmts.clone();
        let mut flat = Vec::new();
        for stmt in stmts {
            flatten_stmt(&self.arena, stmt, &mut flat);
        }
        for stmt in flat {
            let task_fired = {
                let mut interp = self.interp();
                interp.exec(stmt, interface);
                interp.task_fired
            };
            if let Some(task_id) = task_fired {
                self.last_step_had_tasks = true;
                if let Some(template) = self.task_template(task_id) {
                    match template.name.as_str() {
                        "$finish" => interface.finish(0),
                        "$display" => interface.display(&template.name),
                        "$write" => interface.write(&template.name),
                        _ => interface.info(&template.name),
                    }
                }
            }
        }
        self.ran_initial = true;
    }

    fn dispatch_task(&mut self, machine_index: u32, task_id: u32, interface: &mut dyn Interface) {
        if let Some(template) = self.task_template(task_id) {
            match template.name.as_str() {
                "$finish" => interface.finish(0),
                "$display" => interface.display(&template.name),
                "$write" => interface.write(&template.name),
                _ => interface.info(&template.name),
            }
        }
        let task_key = format!("{}[{}]", machinify::TASK_ID_REG, machine_index);
        self.regs.set(&task_key, 0);
    }
}

impl Engine for SyncEngine {
    fn get_state(&self, name: &str) -> Option<Bits> {
        self.var_table
            .get(name)
            .map(|v| Bits::from_u64(32, v as u64))
    }

    fn set_state(&mut self, name: &str, value: Bits) -> bool {
        self.var_table.set(name, value.to_u64() as u32)
    }

    fn get_input(&self, name: &str) -> Option<Bits> {
        self.get_state(name)
    }

    fn set_input(&mut self, name: &str, value: Bits) -> bool {
        self.set_state(name, value)
    }

    fn finalize(&mut self) {}

    fn evaluate(&mut self, interface: &mut dyn Interface) -> Result<(), EngineError> {
        self.last_step_had_tasks = false;
        if !self.ran_initial {
            self.run_initial(interface);
        }
        let continuous = self.continuous_assigns.clone();
        for stmt in continuous {
            let mut interp = self.interp();
            interp.exec(stmt, interface);
        }
        for idx in 0..self.machines.len() {
            self.run_machine_step(idx, interface);
        }
        if let Some(settled) = self.settled_expr {
            debug_assert!(
                self.interp().eval(settled).as_bool(),
                "every machine must be parked at its final state once a step completes"
            );
        }
        if let Some(pending) = self.pending_tasks_expr {
            // Tasks resolve synchronously: `dispatch_task` clears a
            // machine's `__task_id` slot the instant it fires, so by the
            // time a step finishes none should be left dangling, whether
            // or not `last_step_had_tasks` is set for this step.
            debug_assert!(
                !self.interp().eval(pending).as_bool(),
                "no machine should leave a __task_id slot set once a step completes"
            );
        }
        Ok(())
    }

    fn there_are_updates(&self) -> bool {
        self.regs.there_are_updates()
    }

    fn update(&mut self) -> Result<(), EngineError> {
        self.regs.apply_updates(&mut self.var_table);
        Ok(())
    }

    fn there_were_tasks(&self) -> bool {
        self.last_step_had_tasks
    }

    fn open_loop(&mut self, clk_vid: &str, val: Bits, target_iterations: u64) -> Result<u64, EngineError> {
        let mut ran = 0;
        let mut interface = crate::runtime::TracingInterface::default();
        let complement = Bits::new(val.width(), val.is_signed(), (!val.as_bool()) as u128);
        while ran < target_iterations {
            self.set_state(clk_vid, val);
            self.evaluate(&mut interface)?;
            if self.there_are_updates() {
                self.update()?;
            } else {
                self.set_state(clk_vid, complement);
                break;
            }
            self.set_state(clk_vid, complement);
            ran += 1;
        }
        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders;
    use crate::runtime::TracingInterface;

    #[test]
    fn toggle_flop_compiles_and_steps() {
        let mut arena = Arena::new();
        let q_decl = builders::reg_decl(&mut arena, "q", None, vec![]);
        let d_decl = builders::reg_decl(&mut arena, "d", None, vec![]);
        let q = builders::identifier(&mut arena, "q");
        let d = builders::identifier(&mut arena, "d");
        let assign = builders::nonblocking_assign(&mut arena, q, d);
        let body = builders::seq_block(&mut arena, vec![assign]);
        let clk = builders::identifier(&mut arena, "clk");
        let ev = builders::event(&mut arena, crate::ast::ops::EventKind::Posedge, clk);
        let ctrl = builders::event_control(&mut arena, vec![ev]);
        let timed = builders::timing_control_statement(&mut arena, ctrl, body);
        let always = builders::always(&mut arena, timed);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![q_decl, d_decl, always]);

        let modules = HashMap::new();
        let mut engine = SyncEngine::compile(arena, module, &modules).unwrap();
        let mut interface = TracingInterface::default();
        engine.evaluate(&mut interface).unwrap();
        assert!(!engine.there_were_tasks());
    }

    #[test]
    fn initial_block_fires_once() {
        let mut arena = Arena::new();
        let display_args = builders::identifier(&mut arena, "ready");
        let display = builders::sys_task_enable(&mut arena, "$display", vec![display_args]);
        let init_body = builders::seq_block(&mut arena, vec![display]);
        let initial = builders::initial(&mut arena, init_body);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![initial]);

        let modules = HashMap::new();
        let mut engine = SyncEngine::compile(arena, module, &modules).unwrap();
        let mut interface = TracingInterface::default();

        engine.evaluate(&mut interface).unwrap();
        assert!(engine.there_were_tasks());
        assert!(engine.ran_initial);

        engine.evaluate(&mut interface).unwrap();
        assert!(!engine.there_were_tasks());
    }

    /// Every system task in an `initial` block's flat statement list must
    /// be individually observable, not just the last one: `initial` bodies
    /// are never split into machinify states the way `always` blocks are.
    #[test]
    fn initial_block_fires_every_task_in_order() {
        let mut arena = Arena::new();
        let greeting = builders::identifier(&mut arena, "greeting");
        let display = builders::sys_task_enable(&mut arena, "$display", vec![greeting]);
        let finish = builders::sys_task_enable(&mut arena, "$finish", vec![]);
        let init_body = builders::seq_block(&mut arena, vec![display, finish]);
        let initial = builders::initial(&mut arena, init_body);
        let module = builders::module_decl(&mut arena, "m", vec![], vec![initial]);

        let modules = HashMap::new();
        let mut engine = SyncEngine::compile(arena, module, &modules).unwrap();

        #[derive(Default)]
        struct Capture {
            displays: u32,
            finished: bool,
        }
        impl Interface for Capture {
            fn error(&mut self, _m: &str) {}
            fn warning(&mut self, _m: &str) {}
            fn info(&mut self, _m: &str) {}
            fn display(&mut self, _t: &str) {
                self.displays += 1;
            }
            fn write(&mut self, _t: &str) {}
            fn finish(&mut self, _code: i32) {
                self.finished = true;
            }
        }

        let mut capture = Capture::default();
        engine.evaluate(&mut capture).unwrap();
        assert_eq!(capture.displays, 1, "the $display landmark must not be lost");
        assert!(capture.finished);
    }
}
