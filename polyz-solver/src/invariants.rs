//! Runtime invariant checks for the solver.
//!
//! Ensures the watch index, assignments and pools stay consistent;
//! exercised by the integration tests after every public operation.

use crate::solver::Solver;

/// Check watch completeness: every constraint in the original or
/// redundant pool with at least one unassigned variable is watched
/// through at least one of its unassigned variables.
pub fn check_watches(solver: &Solver) -> Result<(), String> {
    for &c in solver.original.iter().chain(solver.redundant.iter()) {
        let constraint = &solver.constraints[c];
        let unassigned: Vec<u32> = constraint
            .vars()
            .iter()
            .copied()
            .filter(|&v| solver.justification[v as usize].is_unassigned())
            .collect();
        if unassigned.is_empty() {
            continue;
        }
        let watched = unassigned
            .iter()
            .any(|&v| solver.watch[v as usize].contains(&c));
        if !watched {
            return Err(format!(
                "constraint {c} has unassigned variables {unassigned:?} but no watch among them"
            ));
        }
    }
    Ok(())
}

/// Check that watch lists only reference live constraints.
pub fn check_watch_targets(solver: &Solver) -> Result<(), String> {
    for (v, list) in solver.watch.iter().enumerate() {
        for &c in list {
            if c >= solver.constraints.len() {
                return Err(format!("watch list of x{v} references dead constraint {c}"));
            }
        }
    }
    Ok(())
}

/// Check assignment consistency: the search stack and the per-variable
/// justifications agree, and every assigned value is still viable.
pub fn check_assignment(solver: &Solver) -> Result<(), String> {
    for (pos, &v) in solver.search.iter().enumerate() {
        if solver.justification[v as usize].is_unassigned() {
            return Err(format!("x{v} is on the search stack but unassigned"));
        }
        if solver.search[..pos].contains(&v) {
            return Err(format!("x{v} appears twice on the search stack"));
        }
        if !solver.viable[v as usize].contains(&solver.value[v as usize]) {
            return Err(format!(
                "assigned value {} of x{v} is not viable",
                solver.value[v as usize]
            ));
        }
    }
    let assigned = solver
        .justification
        .iter()
        .filter(|j| !j.is_unassigned())
        .count();
    if assigned != solver.search.len() {
        return Err(format!(
            "{assigned} variables assigned but search stack has {}",
            solver.search.len()
        ));
    }
    if solver.qhead > solver.search.len() {
        return Err(format!(
            "propagation cursor {} past the search stack ({})",
            solver.qhead,
            solver.search.len()
        ));
    }
    Ok(())
}

/// Check justification levels: no assignment sits above the current
/// level, and the constraints justifying a value only mention variables
/// assigned no later than it.
pub fn check_justification_levels(solver: &Solver) -> Result<(), String> {
    for &v in &solver.search {
        let level = solver.justification[v as usize].level();
        if level > solver.level {
            return Err(format!(
                "x{v} assigned at level {level} above current level {}",
                solver.level
            ));
        }
        // every justifying constraint was recorded while all of its
        // other variables were assigned, no later than v itself
        for &c in &solver.cjust[v as usize] {
            for &u in solver.constraints[c].vars() {
                if u == v {
                    continue;
                }
                let ju = solver.justification[u as usize];
                if ju.is_unassigned() {
                    return Err(format!(
                        "justification of x{v} mentions unassigned x{u}"
                    ));
                }
                if ju.level() > level {
                    return Err(format!(
                        "justification of x{v} (level {level}) mentions x{u} assigned later at level {}",
                        ju.level()
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Check pool consistency: pools partition the constraint arena and
/// constraint levels never exceed the current level.
pub fn check_pools(solver: &Solver) -> Result<(), String> {
    let total = solver.original.len() + solver.redundant.len();
    if total != solver.constraints.len() {
        return Err(format!(
            "{} pooled constraints but arena holds {}",
            total,
            solver.constraints.len()
        ));
    }
    for &c in solver.original.iter().chain(solver.redundant.iter()) {
        if solver.constraints[c].level() > solver.level {
            return Err(format!(
                "constraint {c} created at level {} above current level {}",
                solver.constraints[c].level(),
                solver.level
            ));
        }
    }
    Ok(())
}

/// Run every check.
pub fn check_solver(solver: &Solver) -> Result<(), String> {
    check_watches(solver)?;
    check_watch_targets(solver)?;
    check_assignment(solver)?;
    check_justification_levels(solver)?;
    check_pools(solver)?;
    Ok(())
}
