//! Undo records for backtracking.
//!
//! Every mutation of solver state — variable creation, assignments,
//! viable-set refinements, watch-list edits, constraint additions and
//! level boundaries — pushes one record. Undoing is strict LIFO: popping
//! records down to a level boundary or scope snapshot restores the
//! solver exactly to the state it had when that point was recorded.

use crate::constraint::ConstraintId;
use crate::dep::DepRef;
use polyz_math::pdd::PVar;
use polyz_math::viable::ViableSet;

/// One reversible action on the trail.
#[derive(Debug, Clone)]
pub(crate) enum UndoEntry {
    /// A variable was created.
    NewVar,
    /// `var` was assigned and appended to the search stack.
    Assign { var: PVar },
    /// `viable(var)` and `vdep(var)` were updated; `pushed_cjust`
    /// records whether the refining constraint was appended to
    /// `cjust(var)`.
    RefineViable {
        var: PVar,
        prev: ViableSet,
        prev_vdep: DepRef,
        pushed_cjust: bool,
    },
    /// `constraint` was appended to `var`'s watch list.
    AddWatch { var: PVar, constraint: ConstraintId },
    /// `constraint` was removed from position `pos` of `var`'s watch
    /// list.
    EraseWatch {
        var: PVar,
        constraint: ConstraintId,
        pos: usize,
    },
    /// A constraint was appended to the original pool.
    AddOriginal,
    /// A constraint was appended to the redundant pool.
    AddRedundant,
    /// The decision level was bumped; `qhead` is the propagation cursor
    /// at the moment the level was entered.
    PushLevel { qhead: usize },
}

/// Snapshot taken by a user `push`.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    /// Trail length before the scope's level boundary was pushed.
    pub trail_len: usize,
    /// Decision level inside the scope (base level while it is active).
    pub level: u32,
    /// Search-stack length at the snapshot.
    pub search_len: usize,
    /// Original-pool size at the snapshot.
    pub num_original: usize,
    /// Redundant-pool size at the snapshot.
    pub num_redundant: usize,
}
