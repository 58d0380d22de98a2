//! Canonical polynomials over Z/2^w Z.
//!
//! Polynomials are hash-consed inside a [`PolyArena`]: two syntactically
//! distinct constructions of the same polynomial return the same
//! [`PolyId`]. A polynomial is a sum of terms `c · m` where `c` is a
//! nonzero coefficient reduced modulo 2^w and `m` is a monomial in the
//! registered variables of that width. The arena is owned by one solver;
//! nothing here is process-global.
//!
//! Reference: Z3's `math/dd/dd_pdd` directory.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;

/// Variable identifier for polynomials.
pub type PVar = u32;

/// Handle to an interned polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolyId(u32);

impl PolyId {
    /// Raw index of this handle inside its arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Power of a variable (variable, exponent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarPower {
    /// The variable identifier.
    pub var: PVar,
    /// The exponent of the variable, always at least 1.
    pub power: u32,
}

/// A monomial: a product of variables with exponents, kept sorted by
/// variable index. The unit monomial (1) is the empty product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Monomial {
    vars: SmallVec<[VarPower; 4]>,
}

impl Monomial {
    /// The unit monomial.
    #[must_use]
    pub fn unit() -> Self {
        Self::default()
    }

    /// A single variable to the first power.
    #[must_use]
    pub fn from_var(var: PVar) -> Self {
        let mut vars = SmallVec::new();
        vars.push(VarPower { var, power: 1 });
        Self { vars }
    }

    /// Whether this is the unit monomial.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.vars.is_empty()
    }

    /// Sum of all exponents.
    #[must_use]
    pub fn total_degree(&self) -> u32 {
        self.vars.iter().map(|vp| vp.power).sum()
    }

    /// Exponent of `var` in this monomial (0 if absent).
    #[must_use]
    pub fn degree_in(&self, var: PVar) -> u32 {
        self.vars
            .iter()
            .find(|vp| vp.var == var)
            .map_or(0, |vp| vp.power)
    }

    /// The variable powers, sorted by variable index.
    #[must_use]
    pub fn powers(&self) -> &[VarPower] {
        &self.vars
    }

    /// Product of two monomials.
    #[must_use]
    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut vars: SmallVec<[VarPower; 4]> = SmallVec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.vars.len() && j < other.vars.len() {
            let (a, b) = (self.vars[i], other.vars[j]);
            match a.var.cmp(&b.var) {
                Ordering::Less => {
                    vars.push(a);
                    i += 1;
                }
                Ordering::Greater => {
                    vars.push(b);
                    j += 1;
                }
                Ordering::Equal => {
                    vars.push(VarPower {
                        var: a.var,
                        power: a.power + b.power,
                    });
                    i += 1;
                    j += 1;
                }
            }
        }
        vars.extend_from_slice(&self.vars[i..]);
        vars.extend_from_slice(&other.vars[j..]);
        Monomial { vars }
    }

    /// This monomial with every power of `var` removed.
    #[must_use]
    pub fn without_var(&self, var: PVar) -> Monomial {
        Monomial {
            vars: self
                .vars
                .iter()
                .copied()
                .filter(|vp| vp.var != var)
                .collect(),
        }
    }
}

impl PartialOrd for Monomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Monomial {
    fn cmp(&self, other: &Self) -> Ordering {
        // Graded order: total degree first, then the sorted power lists.
        self.total_degree()
            .cmp(&other.total_degree())
            .then_with(|| self.vars[..].cmp(&other.vars[..]))
    }
}

/// An interned polynomial: terms sorted in decreasing monomial order,
/// coefficients nonzero and reduced modulo 2^width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Poly {
    width: u32,
    terms: Vec<(BigUint, Monomial)>,
}

impl Poly {
    /// Bit-width of the coefficient ring Z/2^width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The `(coefficient, monomial)` terms, highest monomial first.
    #[must_use]
    pub fn terms(&self) -> &[(BigUint, Monomial)] {
        &self.terms
    }

    /// Whether this is the zero polynomial.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether this polynomial is a constant (including zero).
    #[must_use]
    pub fn is_const(&self) -> bool {
        self.terms.len() <= 1 && self.terms.iter().all(|(_, m)| m.is_unit())
    }
}

/// Arena of hash-consed polynomials over Z/2^w, for all widths used by
/// one solver.
///
/// # Panics
///
/// Mixing widths is a contract violation: operations over operands of
/// different widths, and registering a variable at two widths, panic.
#[derive(Debug, Default)]
pub struct PolyArena {
    polys: Vec<Poly>,
    cache: FxHashMap<Poly, PolyId>,
    var_width: FxHashMap<PVar, u32>,
}

impl PolyArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 2^width.
    #[must_use]
    pub fn modulus(width: u32) -> BigUint {
        BigUint::one() << (width as usize)
    }

    fn intern(&mut self, poly: Poly) -> PolyId {
        if let Some(&id) = self.cache.get(&poly) {
            return id;
        }
        let id = PolyId(u32::try_from(self.polys.len()).expect("polynomial arena overflow"));
        self.polys.push(poly.clone());
        self.cache.insert(poly, id);
        id
    }

    fn normalize(width: u32, acc: FxHashMap<Monomial, BigUint>) -> Poly {
        let modulus = Self::modulus(width);
        let mut terms: Vec<(BigUint, Monomial)> = acc
            .into_iter()
            .filter_map(|(m, c)| {
                let c = c % &modulus;
                if c.is_zero() {
                    None
                } else {
                    Some((c, m))
                }
            })
            .collect();
        terms.sort_by(|(_, a), (_, b)| b.cmp(a));
        Poly { width, terms }
    }

    /// Intern a constant polynomial, reduced modulo 2^width.
    pub fn mk_const(&mut self, width: u32, value: impl Into<BigUint>) -> PolyId {
        assert!(width >= 1, "polynomial width must be at least 1");
        let value = value.into() % Self::modulus(width);
        let terms = if value.is_zero() {
            Vec::new()
        } else {
            vec![(value, Monomial::unit())]
        };
        self.intern(Poly { width, terms })
    }

    /// The zero polynomial of the given width.
    pub fn mk_zero(&mut self, width: u32) -> PolyId {
        self.mk_const(width, 0u32)
    }

    /// The constant-one polynomial of the given width.
    pub fn mk_one(&mut self, width: u32) -> PolyId {
        self.mk_const(width, 1u32)
    }

    /// Intern the variable polynomial `x_v`, registering `v` at `width`.
    ///
    /// # Panics
    ///
    /// Panics if `v` was previously registered at a different width.
    pub fn mk_var(&mut self, width: u32, v: PVar) -> PolyId {
        assert!(width >= 1, "variable width must be at least 1");
        let prev = *self.var_width.entry(v).or_insert(width);
        assert_eq!(prev, width, "variable {v} registered at two widths");
        let terms = vec![(BigUint::one(), Monomial::from_var(v))];
        self.intern(Poly { width, terms })
    }

    /// The registered width of a variable, if any.
    #[must_use]
    pub fn var_width(&self, v: PVar) -> Option<u32> {
        self.var_width.get(&v).copied()
    }

    /// Access the interned polynomial behind a handle.
    #[must_use]
    pub fn get(&self, id: PolyId) -> &Poly {
        &self.polys[id.index()]
    }

    /// Width of the polynomial behind a handle.
    #[must_use]
    pub fn width(&self, id: PolyId) -> u32 {
        self.get(id).width
    }

    /// Whether the handle refers to the zero polynomial.
    #[must_use]
    pub fn is_zero(&self, id: PolyId) -> bool {
        self.get(id).is_zero()
    }

    /// Whether the handle refers to a constant polynomial.
    #[must_use]
    pub fn is_const(&self, id: PolyId) -> bool {
        self.get(id).is_const()
    }

    /// The value of a constant polynomial, `None` for non-constants.
    #[must_use]
    pub fn const_value(&self, id: PolyId) -> Option<BigUint> {
        let p = self.get(id);
        if p.terms.is_empty() {
            Some(BigUint::zero())
        } else if p.is_const() {
            Some(p.terms[0].0.clone())
        } else {
            None
        }
    }

    fn accumulate(acc: &mut FxHashMap<Monomial, BigUint>, coeff: BigUint, mono: Monomial) {
        *acc.entry(mono).or_insert_with(BigUint::zero) += coeff;
    }

    /// Sum of two polynomials of the same width.
    pub fn add(&mut self, a: PolyId, b: PolyId) -> PolyId {
        let width = self.width(a);
        assert_eq!(width, self.width(b), "polynomial width mismatch");
        let mut acc: FxHashMap<Monomial, BigUint> = FxHashMap::default();
        for (c, m) in self.get(a).terms.iter().chain(self.get(b).terms.iter()) {
            Self::accumulate(&mut acc, c.clone(), m.clone());
        }
        let poly = Self::normalize(width, acc);
        self.intern(poly)
    }

    /// Additive inverse modulo 2^width.
    pub fn neg(&mut self, a: PolyId) -> PolyId {
        let width = self.width(a);
        let modulus = Self::modulus(width);
        let terms: Vec<(BigUint, Monomial)> = self
            .get(a)
            .terms
            .iter()
            .map(|(c, m)| (&modulus - c, m.clone()))
            .collect();
        self.intern(Poly { width, terms })
    }

    /// Difference of two polynomials of the same width.
    pub fn sub(&mut self, a: PolyId, b: PolyId) -> PolyId {
        let nb = self.neg(b);
        self.add(a, nb)
    }

    /// Product of two polynomials of the same width.
    pub fn mul(&mut self, a: PolyId, b: PolyId) -> PolyId {
        let width = self.width(a);
        assert_eq!(width, self.width(b), "polynomial width mismatch");
        let mut acc: FxHashMap<Monomial, BigUint> = FxHashMap::default();
        let (pa, pb) = (self.get(a).clone(), self.get(b).clone());
        for (ca, ma) in &pa.terms {
            for (cb, mb) in &pb.terms {
                Self::accumulate(&mut acc, ca * cb, ma.mul(mb));
            }
        }
        let poly = Self::normalize(width, acc);
        self.intern(poly)
    }

    /// `p^n` by repeated multiplication.
    pub fn pow(&mut self, p: PolyId, n: u32) -> PolyId {
        let width = self.width(p);
        let mut result = self.mk_one(width);
        for _ in 0..n {
            result = self.mul(result, p);
        }
        result
    }

    /// The free variables of `p`, in increasing order.
    #[must_use]
    pub fn free_vars(&self, p: PolyId) -> SmallVec<[PVar; 8]> {
        let mut vars: SmallVec<[PVar; 8]> = SmallVec::new();
        for (_, m) in &self.get(p).terms {
            for vp in m.powers() {
                vars.push(vp.var);
            }
        }
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    /// Whether `v` occurs in `p`.
    #[must_use]
    pub fn contains_var(&self, p: PolyId, v: PVar) -> bool {
        self.get(p)
            .terms
            .iter()
            .any(|(_, m)| m.degree_in(v) != 0)
    }

    /// Replace `v` by the constant `value` in `p`.
    pub fn substitute(&mut self, p: PolyId, v: PVar, value: &BigUint) -> PolyId {
        let width = self.width(p);
        let modulus = Self::modulus(width);
        let value = value % &modulus;
        let mut acc: FxHashMap<Monomial, BigUint> = FxHashMap::default();
        let poly = self.get(p).clone();
        for (c, m) in &poly.terms {
            let d = m.degree_in(v);
            if d == 0 {
                Self::accumulate(&mut acc, c.clone(), m.clone());
            } else {
                let scaled = c * value.modpow(&BigUint::from(d), &modulus);
                Self::accumulate(&mut acc, scaled, m.without_var(v));
            }
        }
        let poly = Self::normalize(width, acc);
        self.intern(poly)
    }

    /// Replace `v` by the polynomial `q` in `p`.
    pub fn substitute_poly(&mut self, p: PolyId, v: PVar, q: PolyId) -> PolyId {
        let width = self.width(p);
        assert_eq!(width, self.width(q), "polynomial width mismatch");
        let poly = self.get(p).clone();
        let mut result = self.mk_zero(width);
        for (c, m) in &poly.terms {
            let d = m.degree_in(v);
            let base = self.intern(Poly {
                width,
                terms: vec![(c.clone(), m.without_var(v))],
            });
            let term = if d == 0 {
                base
            } else {
                let qd = self.pow(q, d);
                self.mul(base, qd)
            };
            result = self.add(result, term);
        }
        result
    }

    /// Rewrite `p` as `c·v + r` with `c` and `r` independent of `v`.
    ///
    /// Returns `None` when `p` has degree two or more in `v`.
    pub fn isolate(&mut self, p: PolyId, v: PVar) -> Option<(PolyId, PolyId)> {
        let width = self.width(p);
        let mut coeff: FxHashMap<Monomial, BigUint> = FxHashMap::default();
        let mut rest: FxHashMap<Monomial, BigUint> = FxHashMap::default();
        let poly = self.get(p).clone();
        for (c, m) in &poly.terms {
            match m.degree_in(v) {
                0 => Self::accumulate(&mut rest, c.clone(), m.clone()),
                1 => Self::accumulate(&mut coeff, c.clone(), m.without_var(v)),
                _ => return None,
            }
        }
        let c = Self::normalize(width, coeff);
        let r = Self::normalize(width, rest);
        Some((self.intern(c), self.intern(r)))
    }

    /// Evaluate `p` under a partial assignment.
    ///
    /// Returns `None` when some free variable of `p` is unassigned.
    pub fn eval<F>(&self, p: PolyId, lookup: F) -> Option<BigUint>
    where
        F: Fn(PVar) -> Option<BigUint>,
    {
        let poly = self.get(p);
        let modulus = Self::modulus(poly.width);
        let mut sum = BigUint::zero();
        for (c, m) in &poly.terms {
            let mut product = c.clone();
            for vp in m.powers() {
                let value = lookup(vp.var)?;
                product *= value.modpow(&BigUint::from(vp.power), &modulus);
                product %= &modulus;
            }
            sum += product;
            sum %= &modulus;
        }
        Some(sum)
    }

    /// Evaluate a univariate polynomial in `v` at `value`.
    ///
    /// # Panics
    ///
    /// Panics if `p` mentions a variable other than `v`.
    pub fn eval_univariate(&self, p: PolyId, v: PVar, value: &BigUint) -> BigUint {
        self.eval(p, |u| {
            assert_eq!(u, v, "polynomial is not univariate in x{v}");
            Some(value.clone())
        })
        .expect("univariate evaluation is total")
    }

    /// Render a polynomial for diagnostics.
    #[must_use]
    pub fn display(&self, p: PolyId) -> PolyDisplay<'_> {
        PolyDisplay { arena: self, id: p }
    }

    /// Number of interned polynomials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.polys.len()
    }

    /// Whether the arena has no interned polynomials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polys.is_empty()
    }
}

/// Modular inverse of an odd value modulo 2^width.
///
/// Returns `None` for even values, which are not invertible.
#[must_use]
pub fn mod_inverse(value: &BigUint, width: u32) -> Option<BigUint> {
    if value.is_zero() || !value.bit(0) {
        return None;
    }
    let modulus = BigInt::from(PolyArena::modulus(width));
    let g = BigInt::from(value.clone()).extended_gcd(&modulus);
    debug_assert!(g.gcd.is_one());
    g.x.mod_floor(&modulus).to_biguint()
}

/// Displays an interned polynomial, e.g. `3*x0*x1^2 + x2 + 5`.
pub struct PolyDisplay<'a> {
    arena: &'a PolyArena,
    id: PolyId,
}

impl fmt::Display for PolyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let poly = self.arena.get(self.id);
        if poly.is_zero() {
            return write!(f, "0");
        }
        for (i, (c, m)) in poly.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if m.is_unit() {
                write!(f, "{c}")?;
            } else {
                if !c.is_one() {
                    write!(f, "{c}*")?;
                }
                for (j, vp) in m.powers().iter().enumerate() {
                    if j > 0 {
                        write!(f, "*")?;
                    }
                    write!(f, "x{}", vp.var)?;
                    if vp.power > 1 {
                        write!(f, "^{}", vp.power)?;
                    }
                }
            }
        }
        Ok(())
    }
}
