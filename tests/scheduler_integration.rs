//! Drives a compiled module through `Scheduler::step` the way a host
//! application would, rather than calling `Engine` methods directly.

use std::collections::HashMap;
use std::sync::Arc;

use cascade::ast::{builders, ops::EventKind, Arena};
use cascade::backend::sync::SyncEngine;
use cascade::runtime::{Scheduler, TracingInterface};
use cascade::runtime::pool::ThreadPool;

fn counter_module() -> (Arena, cascade::ast::NodeId) {
    let mut arena = Arena::new();
    let out_decl = builders::reg_decl(&mut arena, "out", None, vec![]);

    let zero = builders::number(&mut arena, 32, 0);
    let out_init_lhs = builders::identifier(&mut arena, "out");
    let init_assign = builders::blocking_assign(&mut arena, out_init_lhs, zero);
    let init_body = builders::seq_block(&mut arena, vec![init_assign]);
    let initial = builders::initial(&mut arena, init_body);

    let out_rhs = builders::identifier(&mut arena, "out");
    let one = builders::number(&mut arena, 32, 1);
    let incremented = builders::binary(&mut arena, cascade::ast::ops::BinaryOp::Add, out_rhs, one);
    let out_lhs = builders::identifier(&mut arena, "out");
    let nb = builders::nonblocking_assign(&mut arena, out_lhs, incremented);
    let body = builders::seq_block(&mut arena, vec![nb]);
    let clk = builders::identifier(&mut arena, "clk");
    let ev = builders::event(&mut arena, EventKind::Posedge, clk);
    let ctrl = builders::event_control(&mut arena, vec![ev]);
    let timed = builders::timing_control_statement(&mut arena, ctrl, body);
    let always = builders::always(&mut arena, timed);

    let module = builders::module_decl(&mut arena, "counter", vec![], vec![out_decl, initial, always]);
    (arena, module)
}

#[test]
fn counter_advances_one_per_step() {
    let (arena, module) = counter_module();
    let modules = HashMap::new();
    let engine = SyncEngine::compile(arena, module, &modules).unwrap();

    let pool = Arc::new(ThreadPool::new(1));
    let mut scheduler = Scheduler::new(vec![Box::new(engine)], pool);
    let mut interface = TracingInterface::default();

    for expected in 1..=3u64 {
        scheduler.step(&mut interface).unwrap();
        let out = scheduler.engine(0).get_state("out").unwrap();
        assert_eq!(out.to_u64(), expected);
    }
}

#[test]
fn clock_engine_runs_ahead_open_loop() {
    let (arena, module) = counter_module();
    let modules = HashMap::new();
    let engine = SyncEngine::compile(arena, module, &modules).unwrap();

    let pool = Arc::new(ThreadPool::new(1));
    let mut scheduler = Scheduler::new(vec![Box::new(engine)], pool);
    scheduler.set_clock_engine(0);
    scheduler.open_loop_target = 5;

    let mut interface = TracingInterface::default();
    scheduler.step(&mut interface).unwrap();

    // one evaluate/update from `step` itself, plus 5 further rounds from
    // the clock engine's open loop.
    let out = scheduler.engine(0).get_state("out").unwrap();
    assert_eq!(out.to_u64(), 6);
}
