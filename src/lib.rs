//! PFSP Solver Library
//!
//! A solver for the Permutation Flow-Shop Scheduling Problem: order `n` jobs,
//! processed in the same sequence on `m` machines, so that the completion time
//! of the last job on the last machine (the makespan) is minimal.
//!
//! # Features
//!
//! - Makespan evaluation by forward dynamic programming
//! - Discrete Differential Evolution over job permutations
//! - Branch-and-bound exact solver for small instances
//! - Batch driver with solution files, CSV exports and reports
//!
//! # Example
//!
//! ```no_run
//! use pfsp_solver::instance::FlowShopInstance;
//! use pfsp_solver::heuristics::differential_evolution::{optimize, DEConfig};
//!
//! // Load instance
//! let instance = FlowShopInstance::from_file("taillard_N10_M2_1.txt").unwrap();
//!
//! // Search with the default parameters (NP=100, G=100, F=0.8, CR=0.9)
//! let solution = optimize(&instance, DEConfig::default()).unwrap();
//!
//! println!("Makespan: {}", solution.makespan);
//! print!("{}", solution.to_text());
//! ```

pub mod error;
pub mod rng;
pub mod permutation;
pub mod instance;
pub mod makespan;
pub mod solution;
pub mod heuristics;
pub mod exact;
pub mod benchmark;

pub use error::FlowShopError;
pub use instance::FlowShopInstance;
pub use solution::Solution;
