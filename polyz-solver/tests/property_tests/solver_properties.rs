//! The solver against brute-force enumeration on small domains.
//!
//! Random constraint systems over 2-3 variables of width 2-3 are small
//! enough to enumerate exhaustively: the solver's verdict must match
//! the enumeration, a `Sat` model must satisfy every constraint, and on
//! `Unsat` the constraints selected by the reported core must already
//! be unsatisfiable on their own.

use num_bigint::BigUint;
use polyz_solver::constraint::signed_value;
use polyz_solver::invariants::check_solver;
use polyz_solver::{PolyId, Solver, SolverResult};
use proptest::prelude::*;

/// A symbolic polynomial: a sum of `coeff * vars` monomials.
#[derive(Debug, Clone)]
struct PolyDesc {
    monomials: Vec<(u64, Vec<u32>)>,
}

/// A symbolic constraint over [`PolyDesc`] polynomials.
#[derive(Debug, Clone)]
enum ConsDesc {
    Eq(PolyDesc),
    Diseq(PolyDesc),
    Ule(PolyDesc, PolyDesc),
    Ult(PolyDesc, PolyDesc),
    Sle(PolyDesc, PolyDesc),
    Slt(PolyDesc, PolyDesc),
}

#[derive(Debug, Clone)]
struct SystemDesc {
    width: u32,
    nvars: u32,
    constraints: Vec<ConsDesc>,
}

fn poly_desc(nvars: u32) -> impl Strategy<Value = PolyDesc> {
    prop::collection::vec(
        (0u64..8, prop::collection::vec(0..nvars, 0..3)),
        1..3,
    )
    .prop_map(|monomials| PolyDesc { monomials })
}

fn cons_desc(nvars: u32) -> impl Strategy<Value = ConsDesc> {
    let p = poly_desc(nvars);
    let q = poly_desc(nvars);
    prop_oneof![
        poly_desc(nvars).prop_map(ConsDesc::Eq),
        poly_desc(nvars).prop_map(ConsDesc::Diseq),
        (p.clone(), q.clone()).prop_map(|(a, b)| ConsDesc::Ule(a, b)),
        (p.clone(), q.clone()).prop_map(|(a, b)| ConsDesc::Ult(a, b)),
        (p.clone(), q.clone()).prop_map(|(a, b)| ConsDesc::Sle(a, b)),
        (p, q).prop_map(|(a, b)| ConsDesc::Slt(a, b)),
    ]
}

fn system_desc() -> impl Strategy<Value = SystemDesc> {
    (2u32..4, 2u32..4).prop_flat_map(|(width, nvars)| {
        prop::collection::vec(cons_desc(nvars), 1..5).prop_map(move |constraints| SystemDesc {
            width,
            nvars,
            constraints,
        })
    })
}

fn eval_poly(desc: &PolyDesc, width: u32, assignment: &[u64]) -> u64 {
    let mask = (1u64 << width) - 1;
    let mut sum = 0u64;
    for (coeff, vars) in &desc.monomials {
        let mut product = *coeff & mask;
        for &v in vars {
            product = product.wrapping_mul(assignment[v as usize]) & mask;
        }
        sum = sum.wrapping_add(product) & mask;
    }
    sum
}

fn eval_cons(desc: &ConsDesc, width: u32, assignment: &[u64]) -> bool {
    let signed = |v: u64| {
        i64::try_from(signed_value(&BigUint::from(v), width)).expect("small signed value")
    };
    match desc {
        ConsDesc::Eq(p) => eval_poly(p, width, assignment) == 0,
        ConsDesc::Diseq(p) => eval_poly(p, width, assignment) != 0,
        ConsDesc::Ule(p, q) => eval_poly(p, width, assignment) <= eval_poly(q, width, assignment),
        ConsDesc::Ult(p, q) => eval_poly(p, width, assignment) < eval_poly(q, width, assignment),
        ConsDesc::Sle(p, q) => {
            signed(eval_poly(p, width, assignment)) <= signed(eval_poly(q, width, assignment))
        }
        ConsDesc::Slt(p, q) => {
            signed(eval_poly(p, width, assignment)) < signed(eval_poly(q, width, assignment))
        }
    }
}

/// Enumerate every assignment; true iff one satisfies all picked
/// constraints.
fn brute_force(system: &SystemDesc, picked: &[bool]) -> bool {
    let domain = 1u64 << system.width;
    let total = domain.pow(system.nvars);
    'outer: for code in 0..total {
        let mut rest = code;
        let mut assignment = Vec::with_capacity(system.nvars as usize);
        for _ in 0..system.nvars {
            assignment.push(rest % domain);
            rest /= domain;
        }
        for (i, c) in system.constraints.iter().enumerate() {
            if picked[i] && !eval_cons(c, system.width, &assignment) {
                continue 'outer;
            }
        }
        return true;
    }
    false
}

fn build_poly(solver: &mut Solver, desc: &PolyDesc, width: u32, vars: &[u32]) -> PolyId {
    let mut acc = solver.mk_const(width, 0u64);
    for (coeff, mvars) in &desc.monomials {
        let mut term = solver.mk_const(width, *coeff);
        for &v in mvars {
            let var = solver.var(vars[v as usize]);
            term = solver.mk_mul(term, var);
        }
        acc = solver.mk_add(acc, term);
    }
    acc
}

fn add_constraint(solver: &mut Solver, desc: &ConsDesc, width: u32, vars: &[u32], tag: u32) {
    match desc {
        ConsDesc::Eq(p) => {
            let p = build_poly(solver, p, width, vars);
            solver.add_eq(p, Some(tag));
        }
        ConsDesc::Diseq(p) => {
            let p = build_poly(solver, p, width, vars);
            solver.add_diseq(p, Some(tag));
        }
        ConsDesc::Ule(p, q) => {
            let p = build_poly(solver, p, width, vars);
            let q = build_poly(solver, q, width, vars);
            solver.add_ule(p, q, Some(tag));
        }
        ConsDesc::Ult(p, q) => {
            let p = build_poly(solver, p, width, vars);
            let q = build_poly(solver, q, width, vars);
            solver.add_ult(p, q, Some(tag));
        }
        ConsDesc::Sle(p, q) => {
            let p = build_poly(solver, p, width, vars);
            let q = build_poly(solver, q, width, vars);
            solver.add_sle(p, q, Some(tag));
        }
        ConsDesc::Slt(p, q) => {
            let p = build_poly(solver, p, width, vars);
            let q = build_poly(solver, q, width, vars);
            solver.add_slt(p, q, Some(tag));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_verdict_matches_enumeration(system in system_desc()) {
        let mut solver = Solver::new();
        let vars: Vec<u32> = (0..system.nvars)
            .map(|_| solver.add_var(system.width))
            .collect();
        for (i, c) in system.constraints.iter().enumerate() {
            add_constraint(&mut solver, c, system.width, &vars, i as u32);
        }

        let all = vec![true; system.constraints.len()];
        let expected = brute_force(&system, &all);
        let verdict = solver.check_sat();
        check_solver(&solver).unwrap();

        match verdict {
            SolverResult::Sat => {
                prop_assert!(expected, "solver found a model of an unsat system");
                // the recovered assignment satisfies every constraint
                let assignment: Vec<u64> = vars
                    .iter()
                    .map(|&v| {
                        let value = solver.value(v).expect("sat leaves all variables assigned");
                        u64::try_from(value.clone()).expect("small domain value")
                    })
                    .collect();
                for c in &system.constraints {
                    prop_assert!(
                        eval_cons(c, system.width, &assignment),
                        "model violates {c:?}"
                    );
                }
            }
            SolverResult::Unsat => {
                prop_assert!(!expected, "solver reported unsat for a sat system");
                // the core alone must already be unsatisfiable
                let core = solver.unsat_core().expect("unsat verdict carries a core");
                let mut picked = vec![false; system.constraints.len()];
                for &tag in core {
                    picked[tag as usize] = true;
                }
                prop_assert!(
                    !brute_force(&system, &picked),
                    "reported core is satisfiable"
                );
            }
            SolverResult::Unknown => {
                prop_assert!(false, "no budgets are set, unknown is impossible");
            }
        }
    }

    #[test]
    fn prop_pop_restores_verdicts(system in system_desc()) {
        // solving inside a scope and popping leaves a state that solves
        // the empty system again
        let mut solver = Solver::new();
        solver.push();
        let vars: Vec<u32> = (0..system.nvars)
            .map(|_| solver.add_var(system.width))
            .collect();
        for (i, c) in system.constraints.iter().enumerate() {
            add_constraint(&mut solver, c, system.width, &vars, i as u32);
        }
        let _ = solver.check_sat();
        solver.pop(1);
        check_solver(&solver).unwrap();
        prop_assert_eq!(solver.num_vars(), 0);
        prop_assert_eq!(solver.num_original(), 0);
        prop_assert_eq!(solver.level(), 0);
        prop_assert_eq!(solver.check_sat(), SolverResult::Sat);
    }
}
