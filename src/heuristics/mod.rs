//! Heuristics module for the permutation flow shop.
//!
//! This module exports the population-based optimizers.

pub mod differential_evolution;

pub use differential_evolution::*;
