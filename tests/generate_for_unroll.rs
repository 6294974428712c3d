//! `generate for` unrolling driven through the public `Elaborate` entry
//! point rather than the crate-private `elaborate_for` the unit tests in
//! `elaborate::mod` exercise directly.

use std::collections::HashMap;

use cascade::ast::builders;
use cascade::ast::{Arena, NodeKind};
use cascade::elaborate::Elaborate;

/// `generate for (i = 0; i < 4; i = i + 1) net w$i;` unrolled into four
/// net declarations, one per genvar value.
#[test]
fn unrolls_fixed_trip_count_loop() {
    let mut arena = Arena::new();
    let genvar = builders::genvar_decl(&mut arena, "i");

    let init = builders::number(&mut arena, 32, 0);
    let i_lt = builders::identifier(&mut arena, "i");
    let four = builders::number(&mut arena, 32, 4);
    let cond = builders::binary(&mut arena, cascade::ast::ops::BinaryOp::Lt, i_lt, four);
    let i_rhs = builders::identifier(&mut arena, "i");
    let one = builders::number(&mut arena, 32, 1);
    let update_rhs = builders::binary(&mut arena, cascade::ast::ops::BinaryOp::Add, i_rhs, one);

    let item = builders::net_decl(&mut arena, "w", None, vec![]);
    let body = builders::generate_block(&mut arena, vec![item]);

    let gen_for = builders::generate_for(&mut arena, "i", init, cond, "i", update_rhs, body);
    let module = builders::module_decl(&mut arena, "m", vec![], vec![genvar, gen_for]);

    let modules = HashMap::new();
    Elaborate::new(&modules).run(&mut arena, module).unwrap();

    let joined = match arena.kind(gen_for) {
        NodeKind::GenerateFor(g) => g.gen.borrow().expect("unrolled block"),
        _ => panic!("expected generate for"),
    };
    match arena.kind(joined) {
        NodeKind::GenerateBlock(b) => assert_eq!(b.items.len(), 4, "one clone per trip"),
        _ => panic!("expected generate block"),
    }
}

/// A loop whose bound is never satisfied (`i < 0` starting from `0`)
/// unrolls to zero iterations rather than looping forever or erroring.
#[test]
fn zero_trip_loop_unrolls_to_empty_block() {
    let mut arena = Arena::new();
    let genvar = builders::genvar_decl(&mut arena, "i");

    let init = builders::number(&mut arena, 32, 0);
    let i_lt = builders::identifier(&mut arena, "i");
    let zero = builders::number(&mut arena, 32, 0);
    let cond = builders::binary(&mut arena, cascade::ast::ops::BinaryOp::Lt, i_lt, zero);
    let i_rhs = builders::identifier(&mut arena, "i");
    let one = builders::number(&mut arena, 32, 1);
    let update_rhs = builders::binary(&mut arena, cascade::ast::ops::BinaryOp::Add, i_rhs, one);

    let item = builders::net_decl(&mut arena, "w", None, vec![]);
    let body = builders::generate_block(&mut arena, vec![item]);

    let gen_for = builders::generate_for(&mut arena, "i", init, cond, "i", update_rhs, body);
    let module = builders::module_decl(&mut arena, "m", vec![], vec![genvar, gen_for]);

    let modules = HashMap::new();
    Elaborate::new(&modules).run(&mut arena, module).unwrap();

    let joined = match arena.kind(gen_for) {
        NodeKind::GenerateFor(g) => g.gen.borrow().expect("unrolled block"),
        _ => panic!("expected generate for"),
    };
    match arena.kind(joined) {
        NodeKind::GenerateBlock(b) => assert!(b.items.is_empty()),
        _ => panic!("expected generate block"),
    }
}
