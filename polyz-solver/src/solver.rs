//! CDCL-style search over polynomial constraints modulo 2^w.
//!
//! The solver keeps, per variable, a viable set of still-admissible
//! values, a dependency summary for that set, and the constraints that
//! refined it. Propagation visits watch lists; constraints that become
//! univariate refine the viable set of their remaining variable, and a
//! refinement down to one value assigns it. Conflicts are resolved by
//! walking the search stack backwards, eliminating propagated variables
//! from a polynomial lemma by linear isolation, and reverting the
//! responsible decision. Every state mutation is a trail record, so
//! backjumping and user pops restore state exactly.

use crate::config::SolverConfig;
use crate::constraint::{Constraint, ConstraintId, ConstraintKind};
use crate::dep::{DepManager, DepRef, DepTag};
use crate::error::SolverError;
use crate::justification::Justification;
use crate::trail::{Scope, UndoEntry};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use polyz_math::pdd::{mod_inverse, PVar, PolyArena, PolyId};
use polyz_math::viable::ViableSet;
use smallvec::SmallVec;
use std::fmt;
use tracing::{debug, trace};

/// Verdict of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverResult {
    /// A satisfying assignment was found.
    Sat,
    /// The constraints are unsatisfiable; see [`Solver::unsat_core`].
    Unsat,
    /// The check gave up; see [`Solver::unknown_reason`].
    Unknown,
}

/// Search statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    /// Free decisions made.
    pub decisions: u64,
    /// Assignments forced by propagation.
    pub propagations: u64,
    /// Conflicts resolved.
    pub conflicts: u64,
    /// Lemmas added to the redundant pool.
    pub lemmas: u64,
}

/// The constraint that falsified the current assignment, together with
/// the variable whose viable set it emptied (if that is how it fired).
#[derive(Debug, Clone, Copy)]
struct Conflict {
    constraint: ConstraintId,
    empty_var: Option<PVar>,
}

/// The up-to-two variables through which a constraint is watched.
#[derive(Debug, Clone, Copy, Default)]
struct WatchPair([Option<PVar>; 2]);

impl WatchPair {
    fn contains(self, v: PVar) -> bool {
        self.0.iter().any(|&w| w == Some(v))
    }

    fn add(&mut self, v: PVar) {
        debug_assert!(!self.contains(v));
        if self.0[0].is_none() {
            self.0[0] = Some(v);
        } else {
            debug_assert!(self.0[1].is_none(), "constraint already watches two variables");
            self.0[1] = Some(v);
        }
    }

    fn remove(&mut self, v: PVar) {
        for slot in &mut self.0 {
            if *slot == Some(v) {
                *slot = None;
                return;
            }
        }
        debug_assert!(false, "removed watch was not present");
    }
}

/// Decision procedure for conjunctions of polynomial constraints over
/// fixed-width modular arithmetic.
///
/// # Examples
///
/// ```
/// use polyz_solver::{Solver, SolverResult};
///
/// let mut solver = Solver::new();
/// let x = solver.add_var(4);
/// let xp = solver.var(x);
/// let five = solver.mk_const(4, 5u64);
/// let p = solver.mk_sub(xp, five);
/// solver.add_eq(p, None);
/// assert_eq!(solver.check_sat(), SolverResult::Sat);
/// assert_eq!(solver.value(x).unwrap().to_string(), "5");
/// ```
pub struct Solver {
    pub(crate) arena: PolyArena,
    pub(crate) deps: DepManager,
    pub(crate) config: SolverConfig,
    pub(crate) stats: SolverStats,

    // Constraint pools: one arena, membership lists per pool.
    pub(crate) constraints: Vec<Constraint>,
    watch_of: Vec<WatchPair>,
    pub(crate) original: Vec<ConstraintId>,
    pub(crate) redundant: Vec<ConstraintId>,

    // Per-variable state.
    pub(crate) size: Vec<u32>,
    pub(crate) viable: Vec<ViableSet>,
    pub(crate) vdep: Vec<DepRef>,
    pub(crate) value: Vec<BigUint>,
    pub(crate) justification: Vec<Justification>,
    pub(crate) cjust: Vec<Vec<ConstraintId>>,
    pub(crate) watch: Vec<Vec<ConstraintId>>,
    pub(crate) activity: Vec<u64>,
    vars: Vec<PolyId>,

    // Search state: assigned variables in assignment order.
    pub(crate) search: Vec<PVar>,
    pub(crate) qhead: usize,
    pub(crate) level: u32,

    scopes: Vec<Scope>,
    trail: Vec<UndoEntry>,

    conflict: Option<Conflict>,
    unsat_core: Option<Vec<DepTag>>,
    unknown_reason: Option<SolverError>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Create a solver with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    /// Create a solver with a custom configuration.
    #[must_use]
    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            arena: PolyArena::new(),
            deps: DepManager::new(),
            config,
            stats: SolverStats::default(),
            constraints: Vec::new(),
            watch_of: Vec::new(),
            original: Vec::new(),
            redundant: Vec::new(),
            size: Vec::new(),
            viable: Vec::new(),
            vdep: Vec::new(),
            value: Vec::new(),
            justification: Vec::new(),
            cjust: Vec::new(),
            watch: Vec::new(),
            activity: Vec::new(),
            vars: Vec::new(),
            search: Vec::new(),
            qhead: 0,
            level: 0,
            scopes: Vec::new(),
            trail: Vec::new(),
            conflict: None,
            unsat_core: None,
            unknown_reason: None,
        }
    }

    // ------------------------------------------------------------------
    // Variables and polynomial construction
    // ------------------------------------------------------------------

    /// Add a variable with the given bit-width and return its id.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    pub fn add_var(&mut self, width: u32) -> PVar {
        assert!(width >= 1, "variable width must be at least 1");
        self.retract();
        let v = u32::try_from(self.size.len()).expect("variable count overflow");
        let term = self.arena.mk_var(width, v);
        self.size.push(width);
        self.viable
            .push(ViableSet::full(width, self.config.dense_width_limit));
        self.vdep.push(DepRef::NULL);
        self.value.push(BigUint::zero());
        self.justification.push(Justification::unassigned());
        self.cjust.push(Vec::new());
        self.watch.push(Vec::new());
        self.activity.push(0);
        self.vars.push(term);
        self.trail.push(UndoEntry::NewVar);
        v
    }

    /// The polynomial `x_v`.
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a live variable.
    #[must_use]
    pub fn var(&self, v: PVar) -> PolyId {
        assert!((v as usize) < self.vars.len(), "unknown variable x{v}");
        self.vars[v as usize]
    }

    /// The bit-width of a variable.
    #[must_use]
    pub fn var_size(&self, v: PVar) -> u32 {
        self.size[v as usize]
    }

    /// Intern a constant polynomial of the given width.
    pub fn mk_const(&mut self, width: u32, value: impl Into<BigUint>) -> PolyId {
        self.arena.mk_const(width, value)
    }

    /// Sum of two polynomials.
    pub fn mk_add(&mut self, a: PolyId, b: PolyId) -> PolyId {
        self.arena.add(a, b)
    }

    /// Difference of two polynomials.
    pub fn mk_sub(&mut self, a: PolyId, b: PolyId) -> PolyId {
        self.arena.sub(a, b)
    }

    /// Product of two polynomials.
    pub fn mk_mul(&mut self, a: PolyId, b: PolyId) -> PolyId {
        self.arena.mul(a, b)
    }

    /// Additive inverse of a polynomial.
    pub fn mk_neg(&mut self, a: PolyId) -> PolyId {
        self.arena.neg(a)
    }

    /// Read access to the polynomial arena.
    #[must_use]
    pub fn arena(&self) -> &PolyArena {
        &self.arena
    }

    // ------------------------------------------------------------------
    // Constraint entry
    // ------------------------------------------------------------------

    fn mk_dep(&mut self, dep: Option<DepTag>) -> DepRef {
        dep.map_or(DepRef::NULL, |tag| self.deps.leaf(tag))
    }

    /// Assert `p ≡ 0 (mod 2^w)`.
    pub fn add_eq(&mut self, p: PolyId, dep: Option<DepTag>) {
        self.retract();
        let d = self.mk_dep(dep);
        let c = Constraint::eq(&self.arena, self.level, p, d);
        self.install_constraint(c, false);
    }

    /// Assert `p ≠ 0 (mod 2^w)`, normalized to `1 ≤u p`.
    pub fn add_diseq(&mut self, p: PolyId, dep: Option<DepTag>) {
        self.retract();
        let w = self.arena.width(p);
        let one = self.arena.mk_one(w);
        let d = self.mk_dep(dep);
        let c = Constraint::ule(&self.arena, self.level, one, p, d);
        self.install_constraint(c, false);
    }

    /// Assert `p ≤ q` under the unsigned interpretation.
    pub fn add_ule(&mut self, p: PolyId, q: PolyId, dep: Option<DepTag>) {
        self.retract();
        let d = self.mk_dep(dep);
        let c = Constraint::ule(&self.arena, self.level, p, q, d);
        self.install_constraint(c, false);
    }

    /// Assert `p < q` under the unsigned interpretation.
    ///
    /// With a constant `q` this is `p ≤ q−1` (trivially false at
    /// `q = 0`); with a symbolic `q` the wrap at zero additionally
    /// requires `q ≠ 0`.
    pub fn add_ult(&mut self, p: PolyId, q: PolyId, dep: Option<DepTag>) {
        self.retract();
        let w = self.arena.width(p);
        let d = self.mk_dep(dep);
        let one = self.arena.mk_one(w);
        match self.arena.const_value(q) {
            Some(qc) if qc.is_zero() => {
                // nothing is unsigned-below zero
                let c = Constraint::eq(&self.arena, self.level, one, d);
                self.install_constraint(c, false);
            }
            Some(_) => {
                let qm1 = self.arena.sub(q, one);
                let c = Constraint::ule(&self.arena, self.level, p, qm1, d);
                self.install_constraint(c, false);
            }
            None => {
                let qm1 = self.arena.sub(q, one);
                let c = Constraint::ule(&self.arena, self.level, p, qm1, d);
                self.install_constraint(c, false);
                let nz = Constraint::ule(&self.arena, self.level, one, q, d);
                self.install_constraint(nz, false);
            }
        }
    }

    /// Assert `p ≤ q` under the signed interpretation.
    pub fn add_sle(&mut self, p: PolyId, q: PolyId, dep: Option<DepTag>) {
        self.retract();
        let d = self.mk_dep(dep);
        let c = Constraint::sle(&self.arena, self.level, p, q, d);
        self.install_constraint(c, false);
    }

    /// Assert `p < q` under the signed interpretation.
    ///
    /// The excluded wrap point is the signed minimum: `p < q` is
    /// trivially false when `q = −2^(w−1)`.
    pub fn add_slt(&mut self, p: PolyId, q: PolyId, dep: Option<DepTag>) {
        self.retract();
        let w = self.arena.width(p);
        let d = self.mk_dep(dep);
        let one = self.arena.mk_one(w);
        let min_signed = BigUint::one() << ((w - 1) as usize);
        match self.arena.const_value(q) {
            Some(qc) if qc == min_signed => {
                let c = Constraint::eq(&self.arena, self.level, one, d);
                self.install_constraint(c, false);
            }
            Some(_) => {
                let qm1 = self.arena.sub(q, one);
                let c = Constraint::sle(&self.arena, self.level, p, qm1, d);
                self.install_constraint(c, false);
            }
            None => {
                let qm1 = self.arena.sub(q, one);
                let c = Constraint::sle(&self.arena, self.level, p, qm1, d);
                self.install_constraint(c, false);
                let min_p = self.arena.mk_const(w, min_signed);
                let shifted = self.arena.sub(q, min_p);
                let nz = Constraint::ule(&self.arena, self.level, one, shifted, d);
                self.install_constraint(nz, false);
            }
        }
    }

    /// Force the `index`-th bit (counted from the least significant) of
    /// `v` to `bit`, as a unit constraint.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the variable's width.
    pub fn assign(&mut self, v: PVar, index: u32, bit: bool, dep: Option<DepTag>) {
        self.retract();
        let w = self.size[v as usize];
        assert!(index < w, "bit index {index} out of range for width {w}");
        let d = self.mk_dep(dep);
        // shift bit `index` to the top: it is set iff 2^(w-1-index)·x
        // is at least 2^(w-1)
        let shift = BigUint::one() << ((w - 1 - index) as usize);
        let coeff = self.arena.mk_const(w, shift);
        let xv = self.vars[v as usize];
        let p = self.arena.mul(coeff, xv);
        let half = BigUint::one() << ((w - 1) as usize);
        let c = if bit {
            let lo = self.arena.mk_const(w, half);
            Constraint::ule(&self.arena, self.level, lo, p, d)
        } else {
            let hi = self.arena.mk_const(w, half - BigUint::one());
            Constraint::ule(&self.arena, self.level, p, hi, d)
        };
        self.install_constraint(c, false);
    }

    fn install_constraint(&mut self, constraint: Constraint, redundant: bool) -> ConstraintId {
        for &v in constraint.vars() {
            assert!((v as usize) < self.size.len(), "constraint uses unknown variable x{v}");
        }
        trace!(constraint = %constraint.display(&self.arena), redundant, "install");
        let c = self.constraints.len();
        self.constraints.push(constraint);
        self.watch_of.push(WatchPair::default());
        if redundant {
            self.redundant.push(c);
            self.trail.push(UndoEntry::AddRedundant);
        } else {
            self.original.push(c);
            self.trail.push(UndoEntry::AddOriginal);
        }
        let unassigned = self.unassigned_vars(c);
        match unassigned.len() {
            0 => {
                if self.evaluate_constraint(c) == Some(false) {
                    self.set_conflict(c, None);
                }
            }
            1 => {
                let u = unassigned[0];
                self.add_watch(c, u);
                if redundant {
                    // also watch the most recently assigned variable, so
                    // the lemma re-fires when that assignment is redone
                    // after a backjump
                    let recent = self.constraints[c]
                        .vars()
                        .iter()
                        .copied()
                        .filter(|&w| !self.justification[w as usize].is_unassigned())
                        .max_by_key(|&w| self.justification[w as usize].level());
                    if let Some(w) = recent {
                        self.add_watch(c, w);
                    }
                }
                if self.conflict.is_none() {
                    self.refine_and_react(u, c);
                }
            }
            _ => {
                self.add_watch(c, unassigned[0]);
                self.add_watch(c, unassigned[1]);
            }
        }
        c
    }

    // ------------------------------------------------------------------
    // Watches
    // ------------------------------------------------------------------

    fn add_watch(&mut self, c: ConstraintId, v: PVar) {
        self.watch[v as usize].push(c);
        self.watch_of[c].add(v);
        self.trail.push(UndoEntry::AddWatch { var: v, constraint: c });
    }

    fn erase_watch(&mut self, v: PVar, c: ConstraintId) {
        let pos = self.watch[v as usize]
            .iter()
            .position(|&w| w == c)
            .expect("erased watch is present");
        self.watch[v as usize].remove(pos);
        self.watch_of[c].remove(v);
        self.trail.push(UndoEntry::EraseWatch { var: v, constraint: c, pos });
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Whether a single propagation step is possible.
    #[must_use]
    pub fn can_propagate(&self) -> bool {
        self.conflict.is_none() && self.unsat_core.is_none() && self.qhead < self.search.len()
    }

    /// Run a single propagation step: visit the watch list of the next
    /// assigned variable on the queue.
    pub fn propagate(&mut self) {
        if !self.can_propagate() {
            return;
        }
        let v = self.search[self.qhead];
        self.qhead += 1;
        self.propagate_var(v);
    }

    fn propagate_to_fixpoint(&mut self) {
        while self.can_propagate() {
            self.propagate();
        }
    }

    fn propagate_var(&mut self, v: PVar) {
        let mut i = 0;
        while i < self.watch[v as usize].len() {
            if self.conflict.is_some() {
                return;
            }
            let c = self.watch[v as usize][i];
            if self.propagate_watch(v, c) {
                i += 1;
            }
        }
        if self.conflict.is_some() {
            return;
        }
        // The constraints that forced this value may themselves have
        // become ground; check them for falsification.
        let justifying: SmallVec<[ConstraintId; 4]> =
            self.cjust[v as usize].iter().copied().collect();
        for c in justifying {
            if self.conflict.is_some() {
                return;
            }
            if self.unassigned_vars(c).is_empty()
                && self.evaluate_constraint(c) == Some(false)
            {
                self.set_conflict(c, None);
            }
        }
    }

    /// Visit constraint `c` on the watch list of the just-assigned `v`.
    /// Returns whether `c` stays at its current position in the list.
    fn propagate_watch(&mut self, v: PVar, c: ConstraintId) -> bool {
        let unassigned = self.unassigned_vars(c);
        match unassigned.len() {
            0 => match self.evaluate_constraint(c) {
                Some(false) => {
                    self.set_conflict(c, None);
                    true
                }
                _ => {
                    // ground and satisfied: retire from active watching
                    self.erase_watch(v, c);
                    false
                }
            },
            1 => {
                let u = unassigned[0];
                self.erase_watch(v, c);
                if !self.watch_of[c].contains(u) {
                    self.add_watch(c, u);
                }
                self.refine_and_react(u, c);
                false
            }
            _ => {
                // replacement watch: smallest-index unassigned variable
                // not already watched
                let pair = self.watch_of[c];
                if let Some(&u) = unassigned.iter().find(|&&u| !pair.contains(u)) {
                    self.erase_watch(v, c);
                    self.add_watch(c, u);
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Refine `viable(u)` by the univariate predicate of `c`, then
    /// either report a conflict, propagate a pinned value, or leave the
    /// narrowed set for the next decision.
    fn refine_and_react(&mut self, u: PVar, c: ConstraintId) {
        self.refine_viable(u, c);
        if self.viable[u as usize].is_empty() {
            self.set_conflict(c, Some(u));
        } else if self.justification[u as usize].is_unassigned() {
            if let Some(k) = self.viable[u as usize].is_singleton() {
                self.assign_core(u, k, Justification::propagation(self.level));
                self.stats.propagations += 1;
            }
        }
    }

    fn refine_viable(&mut self, u: PVar, c: ConstraintId) {
        let mut set = self.viable[u as usize].clone();
        let exact = {
            let arena = &self.arena;
            let constraint = &self.constraints[c];
            let justification = &self.justification;
            let value = &self.value;
            set.retain(|candidate| {
                let lookup = |w: PVar| {
                    if w == u {
                        Some(candidate.clone())
                    } else if justification[w as usize].is_unassigned() {
                        None
                    } else {
                        Some(value[w as usize].clone())
                    }
                };
                constraint.evaluate(arena, lookup) != Some(false)
            })
        };
        if !exact {
            // non-enumerable domain: solve linear equations with an odd
            // leading coefficient directly, otherwise leave the set as
            // an over-approximation
            if let ConstraintKind::Eq(p) = self.constraints[c].kind() {
                let width = self.arena.width(p);
                if let Some((coef, rest)) = self.arena.isolate(p, u) {
                    if let (Some(cval), Some(rval)) =
                        (self.eval_assigned(coef), self.eval_assigned(rest))
                    {
                        if let Some(inv) = mod_inverse(&cval, width) {
                            let modulus = PolyArena::modulus(width);
                            let sol = (&modulus - rval) % &modulus * inv % &modulus;
                            set.intersect_value(&sol);
                        }
                    }
                }
            }
        }
        if set == self.viable[u as usize] {
            return;
        }
        let prev = std::mem::replace(&mut self.viable[u as usize], set);
        let prev_vdep = self.vdep[u as usize];
        // the refinement consulted the values of the other variables of
        // c, so their dependency summaries transfer to u
        let mut vdep = self.deps.join(prev_vdep, self.constraints[c].dep());
        for i in 0..self.constraints[c].vars().len() {
            let w = self.constraints[c].vars()[i];
            if w != u && !self.justification[w as usize].is_unassigned() {
                let wd = self.vdep[w as usize];
                vdep = self.deps.join(vdep, wd);
            }
        }
        self.vdep[u as usize] = vdep;
        self.cjust[u as usize].push(c);
        self.trail.push(UndoEntry::RefineViable {
            var: u,
            prev,
            prev_vdep,
            pushed_cjust: true,
        });
    }

    // ------------------------------------------------------------------
    // Assignment and decisions
    // ------------------------------------------------------------------

    fn assign_core(&mut self, v: PVar, val: BigUint, justification: Justification) {
        debug_assert!(self.justification[v as usize].is_unassigned());
        debug_assert!(self.viable[v as usize].contains(&val));
        trace!(var = v, value = %val, ?justification, "assign");
        self.value[v as usize] = val;
        self.justification[v as usize] = justification;
        self.search.push(v);
        self.trail.push(UndoEntry::Assign { var: v });
    }

    fn decide(&mut self) {
        let mut best: Option<PVar> = None;
        for v in 0..self.size.len() as PVar {
            if !self.justification[v as usize].is_unassigned() {
                continue;
            }
            match best {
                Some(b) if self.activity[v as usize] <= self.activity[b as usize] => {}
                _ => best = Some(v),
            }
        }
        let Some(v) = best else { return };
        if self.viable[v as usize].is_empty() {
            if let Some(&c) = self.cjust[v as usize].last() {
                self.set_conflict(c, Some(v));
            } else {
                // every value was ruled out by conflict-driven removals;
                // those removals may be conditional on standing
                // decisions, so revert before concluding anything
                let dep = self.vdep[v as usize];
                self.stats.conflicts += 1;
                self.fallback_revert(dep);
            }
            return;
        }
        if let Some(k) = self.viable[v as usize].is_singleton() {
            self.assign_core(v, k, Justification::propagation(self.level));
            self.stats.propagations += 1;
            return;
        }
        let k = self
            .viable[v as usize]
            .pick()
            .expect("non-empty viable set has a minimum");
        self.push_level();
        self.stats.decisions += 1;
        debug!(var = v, value = %k, level = self.level, "decide");
        self.assign_core(v, k, Justification::decision(self.level));
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Decide satisfiability of the asserted constraints.
    ///
    /// On `Sat`, the model can be read through [`Solver::value`]. On
    /// `Unsat`, [`Solver::unsat_core`] holds the dependency tags of a
    /// responsible subset of the input. On `Unknown`,
    /// [`Solver::unknown_reason`] says why; the solver state stays
    /// consistent and the check can be re-run.
    pub fn check_sat(&mut self) -> SolverResult {
        self.unknown_reason = None;
        loop {
            if self.unsat_core.is_some() {
                return SolverResult::Unsat;
            }
            if let Some(reason) = self.budget_exhausted() {
                debug!(%reason, "unknown");
                self.unknown_reason = Some(reason);
                return SolverResult::Unknown;
            }
            self.propagate_to_fixpoint();
            if self.conflict.is_some() {
                self.resolve_conflict();
            } else if self.config.cancelled() {
                self.unknown_reason = Some(SolverError::Cancelled);
                return SolverResult::Unknown;
            } else if self.search.len() == self.size.len() {
                debug!(
                    decisions = self.stats.decisions,
                    conflicts = self.stats.conflicts,
                    "sat"
                );
                return SolverResult::Sat;
            } else {
                self.decide();
            }
        }
    }

    fn budget_exhausted(&self) -> Option<SolverError> {
        if self.config.cancelled() {
            return Some(SolverError::Cancelled);
        }
        if let Some(limit) = self.config.max_conflicts {
            if self.stats.conflicts >= limit {
                return Some(SolverError::ConflictLimit(limit));
            }
        }
        if let Some(limit) = self.config.max_decisions {
            if self.stats.decisions >= limit {
                return Some(SolverError::DecisionLimit(limit));
            }
        }
        None
    }

    fn set_conflict(&mut self, c: ConstraintId, empty_var: Option<PVar>) {
        if self.conflict.is_none() {
            trace!(constraint = %self.constraints[c].display(&self.arena), "conflict");
            self.conflict = Some(Conflict {
                constraint: c,
                empty_var,
            });
        }
    }

    fn report_unsat(&mut self, dep: DepRef) {
        let core = self.deps.linearize(dep);
        debug!(?core, "unsat");
        self.unsat_core = Some(core);
    }

    // ------------------------------------------------------------------
    // Conflict resolution
    // ------------------------------------------------------------------

    /// The full dependency of a conflict: the constraint's own tag, the
    /// summary of the emptied viable set (if any), and the summaries of
    /// every assigned variable whose value the constraint consulted.
    fn conflict_dep(&mut self, cref: ConstraintId, empty_var: Option<PVar>) -> DepRef {
        let mut dep = self.constraints[cref].dep();
        if let Some(u) = empty_var {
            dep = self.deps.join(dep, self.vdep[u as usize]);
        }
        for i in 0..self.constraints[cref].vars().len() {
            let w = self.constraints[cref].vars()[i];
            if !self.justification[w as usize].is_unassigned() {
                let wd = self.vdep[w as usize];
                dep = self.deps.join(dep, wd);
            }
        }
        dep
    }

    fn resolve_conflict(&mut self) {
        let Conflict {
            constraint: cref,
            empty_var,
        } = self.conflict.take().expect("conflict to resolve");
        self.stats.conflicts += 1;
        let mut dep = self.conflict_dep(cref, empty_var);
        trace!(conflict = %self.constraints[cref].display(&self.arena), "resolve");
        for i in 0..self.constraints[cref].vars().len() {
            let w = self.constraints[cref].vars()[i];
            self.activity[w as usize] += 1;
        }
        // Equations carry a polynomial lemma through resolution;
        // inequality conflicts revert the responsible decision directly.
        let mut lemma = match self.constraints[cref].kind() {
            ConstraintKind::Eq(p) => p,
            _ => {
                self.fallback_revert(dep);
                return;
            }
        };
        let mut progress = false;
        let mut i = self.search.len();
        while i > 0 {
            i -= 1;
            let v = self.search[i];
            if !self.arena.contains_var(lemma, v) {
                continue;
            }
            self.activity[v as usize] += 1;
            match self.justification[v as usize] {
                Justification::Propagation { .. } => {
                    dep = self.deps.join(dep, self.vdep[v as usize]);
                    let step = self.cjust[v as usize]
                        .last()
                        .copied()
                        .and_then(|d| self.resolve(v, lemma, d));
                    match step {
                        Some(next) => {
                            if let Some(k) = self.arena.const_value(next) {
                                if k.is_zero() {
                                    // the lemma degenerated and carries
                                    // no information
                                    self.fallback_revert(dep);
                                } else {
                                    // a nonzero constant must be zero:
                                    // the inputs themselves contradict,
                                    // independent of any decision
                                    self.report_unsat(dep);
                                }
                                return;
                            }
                            lemma = next;
                            progress = true;
                        }
                        None => {
                            self.fallback_revert(dep);
                            return;
                        }
                    }
                }
                Justification::Decision { level } => {
                    self.revert_decision(progress.then_some(lemma), dep, v, level);
                    return;
                }
                Justification::Unassigned => {
                    unreachable!("search stack holds assigned variables")
                }
            }
        }
        // every assigned lemma variable was eliminated; anything left is
        // pinned down by the viable sets already accounted in `dep`
        self.fallback_revert(dep);
    }

    /// Eliminate `v` from `lemma` using the equation that propagated it:
    /// isolate `d` as `b·v + s ≡ 0`, and substitute `v := −b⁻¹·s` when
    /// `b` is an odd constant.
    fn resolve(&mut self, v: PVar, lemma: PolyId, d: ConstraintId) -> Option<PolyId> {
        let ConstraintKind::Eq(dpoly) = self.constraints[d].kind() else {
            return None;
        };
        let width = self.arena.width(dpoly);
        let (coef, rest) = self.arena.isolate(dpoly, v)?;
        let cval = self.arena.const_value(coef)?;
        let inv = mod_inverse(&cval, width)?;
        let inv_p = self.arena.mk_const(width, inv);
        let scaled = self.arena.mul(inv_p, rest);
        let vexpr = self.arena.neg(scaled);
        let resolved = self.arena.substitute_poly(lemma, v, vexpr);
        debug_assert!(!self.arena.contains_var(resolved, v));
        Some(resolved)
    }

    /// No lemma could be extracted: revert the most recent decision.
    fn fallback_revert(&mut self, dep: DepRef) {
        let decision = self
            .search
            .iter()
            .rev()
            .copied()
            .find(|&w| self.justification[w as usize].is_decision());
        match decision {
            Some(v) => {
                let level = self.justification[v as usize].level();
                debug_assert_eq!(level, self.level);
                self.revert_decision(None, dep, v, level);
            }
            None => self.report_unsat(dep),
        }
    }

    /// Backjump below the conflict, rule the failed value out, and learn
    /// the lemma (when one was derived).
    fn revert_decision(&mut self, lemma: Option<PolyId>, dep: DepRef, v: PVar, v_level: u32) {
        debug_assert_eq!(v_level, self.level);
        let val = self.value[v as usize].clone();
        self.activity[v as usize] += 1;
        let base = self.base_level();
        let jump = match lemma {
            Some(l) => {
                // highest level strictly below the conflict that still
                // mentions a lemma variable
                let mut target = base;
                for u in self.arena.free_vars(l) {
                    if u == v {
                        continue;
                    }
                    let j = self.justification[u as usize];
                    if !j.is_unassigned() {
                        target = target.max(j.level());
                    }
                }
                target.min(v_level - 1)
            }
            None => v_level - 1,
        };
        let jump = jump.max(base);
        debug!(var = v, value = %val, jump, learned = lemma.is_some(), "revert decision");
        self.backjump(jump);
        self.remove_viable(v, &val, dep);
        if let Some(l) = lemma {
            self.add_lemma(l, dep);
        }
    }

    fn remove_viable(&mut self, v: PVar, val: &BigUint, dep: DepRef) {
        let prev = self.viable[v as usize].clone();
        let changed = self.viable[v as usize].remove(val);
        debug_assert!(changed, "reverted value was viable");
        let prev_vdep = self.vdep[v as usize];
        self.vdep[v as usize] = self.deps.join(prev_vdep, dep);
        self.trail.push(UndoEntry::RefineViable {
            var: v,
            prev,
            prev_vdep,
            pushed_cjust: false,
        });
    }

    fn add_lemma(&mut self, lemma: PolyId, dep: DepRef) {
        let c = Constraint::eq(&self.arena, self.level, lemma, dep);
        debug!(lemma = %c.display(&self.arena), "learn");
        self.stats.lemmas += 1;
        self.install_constraint(c, true);
    }

    // ------------------------------------------------------------------
    // Backtracking and user scopes
    // ------------------------------------------------------------------

    fn push_level(&mut self) {
        self.trail.push(UndoEntry::PushLevel { qhead: self.qhead });
        self.level += 1;
    }

    fn backjump(&mut self, target: u32) {
        debug_assert!(target >= self.base_level() && target <= self.level);
        while self.level > target {
            let entry = self.trail.pop().expect("level boundary on the trail");
            self.undo(entry);
        }
        self.qhead = self.qhead.min(self.search.len());
    }

    /// Retract all search levels above the base level, keeping base
    /// propagations. Constraint entry and user scoping start from here.
    fn retract(&mut self) {
        if self.level > self.base_level() {
            self.backjump(self.base_level());
            // a conflict found above the base level depended on the
            // retracted assignments; propagation re-derives it if it
            // still holds
            self.conflict = None;
        }
    }

    fn undo(&mut self, entry: UndoEntry) {
        match entry {
            UndoEntry::NewVar => {
                self.size.pop();
                self.viable.pop();
                self.vdep.pop();
                self.value.pop();
                self.justification.pop();
                let cjust = self.cjust.pop();
                debug_assert!(cjust.is_some_and(|c| c.is_empty()));
                let watch = self.watch.pop();
                debug_assert!(watch.is_some_and(|w| w.is_empty()));
                self.activity.pop();
                self.vars.pop();
            }
            UndoEntry::Assign { var } => {
                let popped = self.search.pop();
                debug_assert_eq!(popped, Some(var));
                self.justification[var as usize] = Justification::unassigned();
                self.value[var as usize] = BigUint::zero();
                self.qhead = self.qhead.min(self.search.len());
            }
            UndoEntry::RefineViable {
                var,
                prev,
                prev_vdep,
                pushed_cjust,
            } => {
                self.viable[var as usize] = prev;
                self.vdep[var as usize] = prev_vdep;
                if pushed_cjust {
                    self.cjust[var as usize].pop();
                }
            }
            UndoEntry::AddWatch { var, constraint } => {
                let popped = self.watch[var as usize].pop();
                debug_assert_eq!(popped, Some(constraint));
                self.watch_of[constraint].remove(var);
            }
            UndoEntry::EraseWatch {
                var,
                constraint,
                pos,
            } => {
                self.watch[var as usize].insert(pos, constraint);
                self.watch_of[constraint].add(var);
            }
            UndoEntry::AddOriginal => {
                let popped = self.original.pop();
                debug_assert_eq!(popped, Some(self.constraints.len() - 1));
                self.constraints.pop();
                self.watch_of.pop();
            }
            UndoEntry::AddRedundant => {
                let popped = self.redundant.pop();
                debug_assert_eq!(popped, Some(self.constraints.len() - 1));
                self.constraints.pop();
                self.watch_of.pop();
            }
            UndoEntry::PushLevel { qhead } => {
                self.level -= 1;
                self.qhead = qhead;
            }
        }
    }

    /// Open a user scope.
    pub fn push(&mut self) {
        self.retract();
        self.scopes.push(Scope {
            trail_len: self.trail.len(),
            level: self.level + 1,
            search_len: self.search.len(),
            num_original: self.original.len(),
            num_redundant: self.redundant.len(),
        });
        self.push_level();
    }

    /// Close `num_scopes` user scopes, restoring all state recorded
    /// since they were opened.
    ///
    /// # Panics
    ///
    /// Panics if `num_scopes` exceeds the current scope depth.
    pub fn pop(&mut self, num_scopes: u32) {
        let n = num_scopes as usize;
        assert!(n <= self.scopes.len(), "pop exceeds scope depth");
        if n == 0 {
            return;
        }
        self.conflict = None;
        self.unsat_core = None;
        self.unknown_reason = None;
        let scope = self.scopes[self.scopes.len() - n].clone();
        while self.trail.len() > scope.trail_len {
            let entry = self.trail.pop().expect("trail entry");
            self.undo(entry);
        }
        self.scopes.truncate(self.scopes.len() - n);
        debug_assert_eq!(self.level + 1, scope.level);
        debug_assert_eq!(self.search.len(), scope.search_len);
        debug_assert_eq!(self.original.len(), scope.num_original);
        debug_assert_eq!(self.redundant.len(), scope.num_redundant);
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    fn assigned_value(&self, v: PVar) -> Option<BigUint> {
        if self.justification[v as usize].is_unassigned() {
            None
        } else {
            Some(self.value[v as usize].clone())
        }
    }

    fn eval_assigned(&self, p: PolyId) -> Option<BigUint> {
        self.arena.eval(p, |v| self.assigned_value(v))
    }

    fn evaluate_constraint(&self, c: ConstraintId) -> Option<bool> {
        let constraint = &self.constraints[c];
        let justification = &self.justification;
        let value = &self.value;
        constraint.evaluate(&self.arena, |v| {
            if justification[v as usize].is_unassigned() {
                None
            } else {
                Some(value[v as usize].clone())
            }
        })
    }

    fn unassigned_vars(&self, c: ConstraintId) -> SmallVec<[PVar; 4]> {
        self.constraints[c]
            .vars()
            .iter()
            .copied()
            .filter(|&v| self.justification[v as usize].is_unassigned())
            .collect()
    }

    /// The assigned value of `v`, when it has one.
    #[must_use]
    pub fn value(&self, v: PVar) -> Option<&BigUint> {
        if self.justification[v as usize].is_unassigned() {
            None
        } else {
            Some(&self.value[v as usize])
        }
    }

    /// The current viable set of `v`.
    #[must_use]
    pub fn viable(&self, v: PVar) -> &ViableSet {
        &self.viable[v as usize]
    }

    /// Whether `val` is currently admissible for `v`.
    #[must_use]
    pub fn is_viable(&self, v: PVar, val: &BigUint) -> bool {
        self.viable[v as usize].contains(val)
    }

    /// The dependency tags of the unsat core, after an `Unsat` verdict.
    #[must_use]
    pub fn unsat_core(&self) -> Option<&[DepTag]> {
        self.unsat_core.as_deref()
    }

    /// Why the last check returned `Unknown`, if it did.
    #[must_use]
    pub fn unknown_reason(&self) -> Option<SolverError> {
        self.unknown_reason
    }

    /// Number of live variables.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.size.len()
    }

    /// Number of constraints in the original pool.
    #[must_use]
    pub fn num_original(&self) -> usize {
        self.original.len()
    }

    /// Number of constraints in the redundant (learned) pool.
    #[must_use]
    pub fn num_redundant(&self) -> usize {
        self.redundant.len()
    }

    /// The current decision level.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// The level below which the search never backtracks: the innermost
    /// user scope, or zero.
    #[must_use]
    pub fn base_level(&self) -> u32 {
        self.scopes.last().map_or(0, |s| s.level)
    }

    /// The current scope depth.
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Search statistics.
    #[must_use]
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "solver: level {} (base {}), {} vars",
            self.level,
            self.base_level(),
            self.size.len()
        )?;
        for &c in &self.original {
            writeln!(f, "  {}", self.constraints[c].display(&self.arena))?;
        }
        for &c in &self.redundant {
            writeln!(f, "  [lemma] {}", self.constraints[c].display(&self.arena))?;
        }
        for &v in &self.search {
            writeln!(
                f,
                "  x{} := {} ({:?})",
                v, self.value[v as usize], self.justification[v as usize]
            )?;
        }
        Ok(())
    }
}
