//! Property test modules for polyz-solver.

mod solver_properties;
