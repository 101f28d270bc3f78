//! Solution representation and output for the flow-shop problem.
//!
//! A [`Solution`] is the single result of a search: the best job permutation
//! found and its makespan, plus bookkeeping about the run that produced it.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::instance::FlowShopInstance;

/// Represents a solution to the permutation flow-shop problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Job order, applied identically on every machine
    pub permutation: Vec<usize>,
    /// Completion time of the last job on the last machine
    pub makespan: u64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of generations (if applicable)
    pub iterations: Option<usize>,
    /// Best makespan after initialization and after each generation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<u64>,
}

impl Solution {
    /// Evaluate `permutation` and wrap it into a solution.
    pub fn from_permutation(instance: &FlowShopInstance, permutation: Vec<usize>, algorithm: &str) -> Result<Self> {
        let makespan = instance.makespan(&permutation)?;

        Ok(Solution {
            permutation,
            makespan,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
            history: Vec::new(),
        })
    }

    /// Recompute the makespan and confirm the permutation is still valid
    pub fn validate(&self, instance: &FlowShopInstance) -> Result<bool> {
        Ok(instance.makespan(&self.permutation)? == self.makespan)
    }

    /// Relative gap to a reference makespan, in percent
    pub fn gap_to(&self, reference: u64) -> f64 {
        if reference == 0 {
            return 0.0;
        }
        (self.makespan as f64 - reference as f64) / reference as f64 * 100.0
    }

    /// The plain solution format:
    ///
    /// ```text
    /// Permutation : 2 0 1
    /// Makespan : 15
    /// ```
    ///
    /// Every index is followed by a single space.
    pub fn to_text(&self) -> String {
        let mut text = String::from("Permutation : ");
        for job in &self.permutation {
            text.push_str(&job.to_string());
            text.push(' ');
        }
        text.push_str(&format!("\nMakespan : {}\n", self.makespan));
        text
    }

    /// Write [`Solution::to_text`] to `path`
    pub fn write_text<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::write(path, self.to_text())
    }

    /// Write the solution as pretty JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

/// Output file name for the solution of an instance
pub fn solution_file_name(instance_name: &str) -> String {
    format!("solution_{}", instance_name)
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Makespan: {}", self.makespan)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Generations: {}", iter)?;
        }
        writeln!(f, "  Permutation: {:?}", self.permutation)
    }
}
