//! Machinify throughput across always-block sizes: how state-splitting
//! cost scales with the number of `__task_id` landmarks in a single
//! edge-triggered block, and how that compares to the full compile
//! pipeline (`SyncEngine::compile`) it's one stage of.

use std::collections::HashMap;
use std::time::Duration;

use cascade::ast::ops::EventKind;
use cascade::ast::{builders, Arena, NodeId};
use cascade::backend::machinify::Machinify;
use cascade::backend::sync::SyncEngine;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// A single `always @(posedge clk)` block with `depth` sequential
/// `out <= out + 1; $display(...)` landmarks, each splitting the
/// machine into one more state.
fn landmark_chain_module(depth: u32) -> (Arena, NodeId) {
    let mut arena = Arena::new();
    let out_decl = builders::reg_decl(&mut arena, "out", None, vec![]);

    let mut stmts = Vec::with_capacity(depth as usize * 2);
    for _ in 0..depth {
        let out_rhs = builders::identifier(&mut arena, "out");
        let one = builders::number(&mut arena, 32, 1);
        let sum = builders::binary(&mut arena, cascade::ast::ops::BinaryOp::Add, out_rhs, one);
        let out_lhs = builders::identifier(&mut arena, "out");
        stmts.push(builders::blocking_assign(&mut arena, out_lhs, sum));
        let msg = builders::identifier(&mut arena, "out");
        stmts.push(builders::sys_task_enable(&mut arena, "$display", vec![msg]));
    }
    let body = builders::seq_block(&mut arena, stmts);

    let clk = builders::identifier(&mut arena, "clk");
    let ev = builders::event(&mut arena, EventKind::Posedge, clk);
    let ctrl = builders::event_control(&mut arena, vec![ev]);
    let timed = builders::timing_control_statement(&mut arena, ctrl, body);
    let always = builders::always(&mut arena, timed);

    let module = builders::module_decl(&mut arena, "chain", vec![], vec![out_decl, always]);
    (arena, module)
}

fn bench_machinify(c: &mut Criterion) {
    let mut group = c.benchmark_group("machinify_run");
    for &depth in &[4u32, 32, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || landmark_chain_module(depth),
                |(mut arena, module)| Machinify::run(&mut arena, module),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_full_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_engine_compile");
    for &depth in &[4u32, 32, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || (landmark_chain_module(depth), HashMap::new()),
                |((arena, module), modules)| SyncEngine::compile(arena, module, &modules).unwrap(),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));
    targets = bench_machinify, bench_full_compile
}
criterion_main!(benches);
