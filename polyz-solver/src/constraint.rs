//! Polynomial constraints over modular arithmetic.
//!
//! A constraint is immutable after creation: its kind, polynomials,
//! dependency, creation level and variable list never change. All
//! algorithms dispatch on the kind tag.

use crate::dep::DepRef;
use num_bigint::{BigInt, BigUint};
use polyz_math::pdd::{PVar, PolyArena, PolyId};
use smallvec::SmallVec;
use std::fmt;

/// Index of a constraint in the solver's constraint arena.
pub type ConstraintId = usize;

/// The three normalized constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `p ≡ 0 (mod 2^w)`.
    Eq(PolyId),
    /// `p ≤ q` under the unsigned interpretation.
    Ule(PolyId, PolyId),
    /// `p ≤ q` under the signed (two's-complement) interpretation.
    Sle(PolyId, PolyId),
}

/// An immutable constraint record.
#[derive(Debug, Clone)]
pub struct Constraint {
    kind: ConstraintKind,
    dep: DepRef,
    level: u32,
    vars: SmallVec<[PVar; 4]>,
}

/// Two's-complement reading of an unsigned value of the given width.
#[must_use]
pub fn signed_value(value: &BigUint, width: u32) -> BigInt {
    let half = BigUint::from(1u32) << ((width - 1) as usize);
    if *value >= half {
        BigInt::from(value.clone()) - (BigInt::from(1) << (width as usize))
    } else {
        BigInt::from(value.clone())
    }
}

impl Constraint {
    fn collect_vars(arena: &PolyArena, kind: ConstraintKind) -> SmallVec<[PVar; 4]> {
        let mut vars: SmallVec<[PVar; 4]> = SmallVec::new();
        let (p, q) = match kind {
            ConstraintKind::Eq(p) => (p, None),
            ConstraintKind::Ule(p, q) | ConstraintKind::Sle(p, q) => (p, Some(q)),
        };
        vars.extend(arena.free_vars(p));
        if let Some(q) = q {
            vars.extend(arena.free_vars(q));
        }
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    /// Create a constraint from its normalized kind.
    #[must_use]
    pub fn new(arena: &PolyArena, level: u32, kind: ConstraintKind, dep: DepRef) -> Self {
        if let ConstraintKind::Ule(p, q) | ConstraintKind::Sle(p, q) = kind {
            assert_eq!(arena.width(p), arena.width(q), "constraint width mismatch");
        }
        Self {
            vars: Self::collect_vars(arena, kind),
            kind,
            dep,
            level,
        }
    }

    /// An equation `p ≡ 0`.
    #[must_use]
    pub fn eq(arena: &PolyArena, level: u32, p: PolyId, dep: DepRef) -> Self {
        Self::new(arena, level, ConstraintKind::Eq(p), dep)
    }

    /// An unsigned inequality `p ≤ q`.
    #[must_use]
    pub fn ule(arena: &PolyArena, level: u32, p: PolyId, q: PolyId, dep: DepRef) -> Self {
        Self::new(arena, level, ConstraintKind::Ule(p, q), dep)
    }

    /// A signed inequality `p ≤ q`.
    #[must_use]
    pub fn sle(arena: &PolyArena, level: u32, p: PolyId, q: PolyId, dep: DepRef) -> Self {
        Self::new(arena, level, ConstraintKind::Sle(p, q), dep)
    }

    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// The dependency this constraint carries.
    #[must_use]
    pub fn dep(&self) -> DepRef {
        self.dep
    }

    /// The level at which the constraint was created.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// The variables the constraint mentions, in increasing order.
    #[must_use]
    pub fn vars(&self) -> &[PVar] {
        &self.vars
    }

    /// The bit-width of the constraint's polynomials.
    #[must_use]
    pub fn width(&self, arena: &PolyArena) -> u32 {
        match self.kind {
            ConstraintKind::Eq(p) | ConstraintKind::Ule(p, _) | ConstraintKind::Sle(p, _) => {
                arena.width(p)
            }
        }
    }

    /// Evaluate under a (partial) assignment; `None` when some mentioned
    /// variable is unassigned.
    pub fn evaluate<F>(&self, arena: &PolyArena, lookup: F) -> Option<bool>
    where
        F: Fn(PVar) -> Option<BigUint> + Copy,
    {
        match self.kind {
            ConstraintKind::Eq(p) => {
                use num_traits::Zero;
                Some(arena.eval(p, lookup)?.is_zero())
            }
            ConstraintKind::Ule(p, q) => {
                let pv = arena.eval(p, lookup)?;
                let qv = arena.eval(q, lookup)?;
                Some(pv <= qv)
            }
            ConstraintKind::Sle(p, q) => {
                let w = arena.width(p);
                let pv = arena.eval(p, lookup)?;
                let qv = arena.eval(q, lookup)?;
                Some(signed_value(&pv, w) <= signed_value(&qv, w))
            }
        }
    }

    /// Render the constraint for diagnostics.
    #[must_use]
    pub fn display<'a>(&'a self, arena: &'a PolyArena) -> ConstraintDisplay<'a> {
        ConstraintDisplay {
            constraint: self,
            arena,
        }
    }
}

/// Displays a constraint, e.g. `x0*x1 + 11 = 0` or `3 <=u x0`.
pub struct ConstraintDisplay<'a> {
    constraint: &'a Constraint,
    arena: &'a PolyArena,
}

impl fmt::Display for ConstraintDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.constraint.kind {
            ConstraintKind::Eq(p) => write!(f, "{} = 0", self.arena.display(p)),
            ConstraintKind::Ule(p, q) => {
                write!(f, "{} <=u {}", self.arena.display(p), self.arena.display(q))
            }
            ConstraintKind::Sle(p, q) => {
                write!(f, "{} <=s {}", self.arena.display(p), self.arena.display(q))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_signed_value() {
        assert_eq!(signed_value(&big(3), 3), BigInt::from(3));
        assert_eq!(signed_value(&big(4), 3), BigInt::from(-4));
        assert_eq!(signed_value(&big(7), 3), BigInt::from(-1));
        assert_eq!(signed_value(&big(0), 3), BigInt::from(0));
    }

    #[test]
    fn test_vars_union() {
        let mut arena = PolyArena::new();
        let x = arena.mk_var(4, 0);
        let y = arena.mk_var(4, 1);
        let c = Constraint::ule(&arena, 0, y, x, DepRef::NULL);
        assert_eq!(c.vars(), &[0, 1]);
        assert_eq!(c.width(&arena), 4);
    }

    #[test]
    fn test_evaluate_eq() {
        let mut arena = PolyArena::new();
        let x = arena.mk_var(4, 0);
        let five = arena.mk_const(4, 5u64);
        let p = arena.sub(x, five);
        let c = Constraint::eq(&arena, 0, p, DepRef::NULL);
        assert_eq!(c.evaluate(&arena, |_| Some(big(5))), Some(true));
        assert_eq!(c.evaluate(&arena, |_| Some(big(4))), Some(false));
        assert_eq!(c.evaluate(&arena, |_| None), None);
    }

    #[test]
    fn test_evaluate_signed() {
        let mut arena = PolyArena::new();
        let x = arena.mk_var(3, 0);
        let zero = arena.mk_zero(3);
        let c = Constraint::sle(&arena, 0, x, zero, DepRef::NULL);
        // 5 is -3 in 3-bit two's complement
        assert_eq!(c.evaluate(&arena, |_| Some(big(5))), Some(true));
        assert_eq!(c.evaluate(&arena, |_| Some(big(2))), Some(false));
        assert_eq!(c.evaluate(&arena, |_| Some(big(0))), Some(true));
    }
}
