//! PolyZ Solver - Satisfiability of Polynomial Constraints over Z/2^w.
//!
//! This crate decides conjunctions of polynomial constraints interpreted
//! over fixed-width modular arithmetic, with a CDCL-style search:
//! decisions, watch-list propagation, conflict analysis with polynomial
//! lemma learning, and backjumping. Each variable ranges over
//! `[0, 2^w)` for its own width `w`; constraints are equations and
//! unsigned or signed inequalities between canonical polynomials from
//! [`polyz_math`].
//!
//! # Examples
//!
//! ## A satisfiable system
//!
//! ```
//! use polyz_solver::{Solver, SolverResult};
//!
//! let mut solver = Solver::new();
//! let x = solver.add_var(3);
//! let xp = solver.var(x);
//! let two = solver.mk_const(3, 2u64);
//! let zero = solver.mk_const(3, 0u64);
//!
//! // 0 < x <= 2
//! solver.add_ule(xp, two, None);
//! solver.add_ult(zero, xp, None);
//!
//! assert_eq!(solver.check_sat(), SolverResult::Sat);
//! let v = solver.value(x).unwrap();
//! assert!(*v >= 1u32.into() && *v <= 2u32.into());
//! ```
//!
//! ## An unsat core from dependency tags
//!
//! ```
//! use polyz_solver::{Solver, SolverResult};
//!
//! let mut solver = Solver::new();
//! let x = solver.add_var(4);
//! let xp = solver.var(x);
//! let three = solver.mk_const(4, 3u64);
//! let four = solver.mk_const(4, 4u64);
//! let p = solver.mk_sub(xp, three);
//! let q = solver.mk_sub(xp, four);
//!
//! solver.add_eq(p, Some(1));
//! solver.add_eq(q, Some(2));
//!
//! assert_eq!(solver.check_sat(), SolverResult::Unsat);
//! assert_eq!(solver.unsat_core(), Some(&[1, 2][..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod constraint;
pub mod dep;
pub mod error;
pub mod invariants;
pub mod justification;
pub mod solver;
mod trail;

pub use config::SolverConfig;
pub use constraint::{Constraint, ConstraintId, ConstraintKind};
pub use dep::{DepManager, DepRef, DepTag};
pub use error::SolverError;
pub use justification::Justification;
pub use solver::{Solver, SolverResult, SolverStats};

// Re-export the math engines for callers that build polynomials directly.
pub use polyz_math::pdd::{PVar, PolyArena, PolyId};
pub use polyz_math::viable::ViableSet;
