//! PolyZ Math - Modular Polynomial and Value-Set Arithmetic.
//!
//! This crate provides the two semantic engines underneath the PolyZ
//! solver for polynomial constraints over fixed-width modular arithmetic:
//!
//! - [`pdd`]: canonical (hash-consed) multivariate polynomials over
//!   Z/2^w Z, with substitution, linear isolation and evaluation
//! - [`viable`]: compact representations of subsets of `[0, 2^w)`,
//!   used to track the still-admissible values of each solver variable
//!
//! # Examples
//!
//! ## Building polynomials
//!
//! ```
//! use polyz_math::pdd::PolyArena;
//!
//! let mut arena = PolyArena::new();
//!
//! // x + y over Z/16
//! let x = arena.mk_var(4, 0);
//! let y = arena.mk_var(4, 1);
//! let sum = arena.add(x, y);
//!
//! // Coefficients reduce modulo 2^4: 10 + 10 = 4
//! let ten = arena.mk_const(4, 10u64);
//! let twenty = arena.add(ten, ten);
//! assert_eq!(twenty, arena.mk_const(4, 4u64));
//!
//! // Construction is canonical: x + y and y + x share a handle
//! assert_eq!(sum, arena.add(y, x));
//! ```
//!
//! ## Tracking admissible values
//!
//! ```
//! use num_bigint::BigUint;
//! use polyz_math::viable::ViableSet;
//!
//! let mut set = ViableSet::full(3, 16);
//! set.remove(&BigUint::from(0u32));
//! assert!(!set.contains(&BigUint::from(0u32)));
//! assert_eq!(set.pick(), Some(BigUint::from(1u32)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod pdd;
pub mod viable;

pub use pdd::{Monomial, PVar, Poly, PolyArena, PolyId, VarPower};
pub use viable::ViableSet;
