//! Ring and substitution laws for the polynomial arena.
//!
//! Canonical interning turns semantic equalities into handle equality,
//! so the laws are checked by comparing `PolyId`s directly.

use num_bigint::BigUint;
use num_traits::One;
use polyz_math::pdd::{mod_inverse, PolyArena, PolyId};
use proptest::prelude::*;

const WIDTH: u32 = 4;
const NVARS: u32 = 3;

/// A symbolic polynomial description: a sum of `coeff * vars` monomials.
#[derive(Debug, Clone)]
struct PolyDesc {
    monomials: Vec<(u64, Vec<u32>)>,
}

fn poly_desc() -> impl Strategy<Value = PolyDesc> {
    prop::collection::vec(
        (0u64..16, prop::collection::vec(0u32..NVARS, 0..3)),
        1..4,
    )
    .prop_map(|monomials| PolyDesc { monomials })
}

fn build(arena: &mut PolyArena, desc: &PolyDesc) -> PolyId {
    let mut acc = arena.mk_zero(WIDTH);
    for (coeff, vars) in &desc.monomials {
        let mut term = arena.mk_const(WIDTH, *coeff);
        for &v in vars {
            let var = arena.mk_var(WIDTH, v);
            term = arena.mul(term, var);
        }
        acc = arena.add(acc, term);
    }
    acc
}

proptest! {
    #[test]
    fn prop_add_commutes(a in poly_desc(), b in poly_desc()) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        let pb = build(&mut arena, &b);
        prop_assert_eq!(arena.add(pa, pb), arena.add(pb, pa));
    }

    #[test]
    fn prop_add_associates(a in poly_desc(), b in poly_desc(), c in poly_desc()) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        let pb = build(&mut arena, &b);
        let pc = build(&mut arena, &c);
        let ab = arena.add(pa, pb);
        let bc = arena.add(pb, pc);
        prop_assert_eq!(arena.add(ab, pc), arena.add(pa, bc));
    }

    #[test]
    fn prop_mul_commutes(a in poly_desc(), b in poly_desc()) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        let pb = build(&mut arena, &b);
        prop_assert_eq!(arena.mul(pa, pb), arena.mul(pb, pa));
    }

    #[test]
    fn prop_mul_distributes(a in poly_desc(), b in poly_desc(), c in poly_desc()) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        let pb = build(&mut arena, &b);
        let pc = build(&mut arena, &c);
        let sum = arena.add(pb, pc);
        let lhs = arena.mul(pa, sum);
        let ab = arena.mul(pa, pb);
        let ac = arena.mul(pa, pc);
        prop_assert_eq!(lhs, arena.add(ab, ac));
    }

    #[test]
    fn prop_sub_self_is_zero(a in poly_desc()) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        let diff = arena.sub(pa, pa);
        prop_assert!(arena.is_zero(diff));
    }

    #[test]
    fn prop_isolate_reconstructs(a in poly_desc(), v in 0u32..NVARS) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        if let Some((c, r)) = arena.isolate(pa, v) {
            prop_assert!(!arena.contains_var(c, v));
            prop_assert!(!arena.contains_var(r, v));
            let var = arena.mk_var(WIDTH, v);
            let cv = arena.mul(c, var);
            prop_assert_eq!(arena.add(cv, r), pa);
        }
    }

    #[test]
    fn prop_substitute_matches_eval(
        a in poly_desc(),
        vals in prop::collection::vec(0u64..16, NVARS as usize),
    ) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        // substituting every variable yields the evaluated constant
        let mut ground = pa;
        for v in 0..NVARS {
            ground = arena.substitute(ground, v, &BigUint::from(vals[v as usize]));
        }
        let direct = arena
            .eval(pa, |v| Some(BigUint::from(vals[v as usize])))
            .unwrap();
        prop_assert_eq!(arena.const_value(ground), Some(direct));
    }

    #[test]
    fn prop_substitute_poly_matches_eval(
        a in poly_desc(),
        b in poly_desc(),
        v in 0u32..NVARS,
        vals in prop::collection::vec(0u64..16, NVARS as usize),
    ) {
        let mut arena = PolyArena::new();
        let pa = build(&mut arena, &a);
        let pb = build(&mut arena, &b);
        let composed = arena.substitute_poly(pa, v, pb);
        let lookup = |u: u32| Some(BigUint::from(vals[u as usize]));
        let bval = arena.eval(pb, lookup).unwrap();
        let expected = arena
            .eval(pa, |u| if u == v { Some(bval.clone()) } else { lookup(u) })
            .unwrap();
        prop_assert_eq!(arena.eval(composed, lookup), Some(expected));
    }

    #[test]
    fn prop_mod_inverse(c in 0u64..256, w in 1u32..9) {
        let value = BigUint::from(c) % (BigUint::one() << (w as usize));
        match mod_inverse(&value, w) {
            Some(inv) => {
                let modulus = BigUint::one() << (w as usize);
                prop_assert_eq!((value * inv) % modulus, BigUint::one());
            }
            None => prop_assert!(!value.bit(0)),
        }
    }
}
