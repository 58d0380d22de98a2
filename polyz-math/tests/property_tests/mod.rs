//! Property test modules for polyz-math.

mod pdd_properties;
mod viable_properties;
