//! Exact solvers module.
//!
//! Depth-first branch and bound over job prefixes. Only practical for small
//! instances; used to measure how far the metaheuristics are from optimal.

use std::time::Instant;

use crate::error::{FlowShopError, Result};
use crate::instance::FlowShopInstance;
use crate::makespan::evaluate_valid;
use crate::solution::Solution;

/// Result of exact solving
#[derive(Debug, Clone)]
pub struct ExactResult {
    /// Best solution found
    pub solution: Solution,
    /// Order-independent lower bound of the instance
    pub lower_bound: u64,
    /// Whether optimality was proven
    pub optimal: bool,
    /// Number of search nodes visited
    pub nodes_explored: u64,
}

/// Exhaustive branch-and-bound solver
#[derive(Debug, Clone)]
pub struct BruteForceSolver {
    /// Refuse instances with more jobs than this
    pub max_jobs: usize,
}

impl Default for BruteForceSolver {
    fn default() -> Self {
        BruteForceSolver { max_jobs: 10 }
    }
}

struct Search<'a> {
    instance: &'a FlowShopInstance,
    /// tails[j][k]: work job j still needs after leaving machine k
    tails: Vec<Vec<u64>>,
    prefix: Vec<usize>,
    used: Vec<bool>,
    remaining_work: Vec<u64>,
    best: u64,
    best_permutation: Vec<usize>,
    nodes: u64,
}

impl<'a> Search<'a> {
    fn new(instance: &'a FlowShopInstance) -> Self {
        let n = instance.num_jobs;
        let m = instance.num_machines;

        let tails = instance
            .processing_times
            .iter()
            .map(|row| {
                let mut tail = vec![0u64; m];
                for k in (0..m - 1).rev() {
                    tail[k] = tail[k + 1] + row[k + 1] as u64;
                }
                tail
            })
            .collect();

        let identity: Vec<usize> = (0..n).collect();
        let best = evaluate_valid(instance, &identity);

        Search {
            instance,
            tails,
            prefix: Vec::with_capacity(n),
            used: vec![false; n],
            remaining_work: (0..m).map(|k| instance.machine_total(k)).collect(),
            best,
            best_permutation: identity,
            nodes: 0,
        }
    }

    /// Bound on any completion of the current prefix ending at `row`
    fn bound(&self, row: &[u64]) -> u64 {
        let m = self.instance.num_machines;

        (0..m)
            .map(|k| {
                let min_tail = (0..self.instance.num_jobs)
                    .filter(|&j| !self.used[j])
                    .map(|j| self.tails[j][k])
                    .min()
                    .unwrap_or(0);
                row[k] + self.remaining_work[k] + min_tail
            })
            .max()
            .unwrap_or(0)
    }

    fn branch(&mut self, row: &[u64]) {
        self.nodes += 1;
        let instance = self.instance;
        let n = instance.num_jobs;
        let m = instance.num_machines;

        if self.prefix.len() == n {
            if row[m - 1] < self.best {
                self.best = row[m - 1];
                self.best_permutation = self.prefix.clone();
            }
            return;
        }

        if self.bound(row) >= self.best {
            return;
        }

        for job in 0..n {
            if self.used[job] {
                continue;
            }

            let times = &instance.processing_times[job];
            let mut next = Vec::with_capacity(m);
            let mut previous_machine = 0u64;
            for k in 0..m {
                let done = row[k].max(previous_machine) + times[k] as u64;
                next.push(done);
                previous_machine = done;
            }

            self.used[job] = true;
            self.prefix.push(job);
            for k in 0..m {
                self.remaining_work[k] -= times[k] as u64;
            }

            self.branch(&next);

            for k in 0..m {
                self.remaining_work[k] += times[k] as u64;
            }
            self.prefix.pop();
            self.used[job] = false;
        }
    }
}

impl BruteForceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_jobs: usize) -> Self {
        BruteForceSolver { max_jobs }
    }

    /// Solve to proven optimality
    pub fn solve(&self, instance: &FlowShopInstance) -> Result<ExactResult> {
        instance.validate()?;
        if instance.num_jobs > self.max_jobs {
            return Err(FlowShopError::InstanceTooLarge {
                jobs: instance.num_jobs,
                limit: self.max_jobs,
            });
        }

        let start = Instant::now();
        let mut search = Search::new(instance);
        let root = vec![0u64; instance.num_machines];
        search.branch(&root);

        log::debug!(
            "[Exact] {}: optimum {} after {} nodes",
            instance.name,
            search.best,
            search.nodes
        );

        let mut solution = Solution::from_permutation(instance, search.best_permutation, "BranchAndBound")?;
        solution.computation_time = start.elapsed().as_secs_f64();

        Ok(ExactResult {
            solution,
            lower_bound: instance.lower_bound(),
            optimal: true,
            nodes_explored: search.nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::makespan::evaluate;
    use crate::rng::make_rng;
    use rand::Rng;

    /// Smallest makespan over every permutation (Heap's algorithm)
    fn enumerate_all(instance: &FlowShopInstance) -> u64 {
        let n = instance.num_jobs;
        let mut perm: Vec<usize> = (0..n).collect();
        let mut c = vec![0usize; n];
        let mut best = evaluate(instance, &perm).unwrap();

        let mut i = 0;
        while i < n {
            if c[i] < i {
                if i % 2 == 0 {
                    perm.swap(0, i);
                } else {
                    perm.swap(c[i], i);
                }
                best = best.min(evaluate(instance, &perm).unwrap());
                c[i] += 1;
                i = 0;
            } else {
                c[i] = 0;
                i += 1;
            }
        }

        best
    }

    #[test]
    fn test_small_known_instance() {
        let instance = FlowShopInstance::new("t", vec![vec![5, 3], vec![2, 6], vec![4, 1]]).unwrap();
        let result = BruteForceSolver::new().solve(&instance).unwrap();
        assert_eq!(result.solution.makespan, 12);
        assert_eq!(result.lower_bound, 12);
        assert!(result.optimal);
        assert_eq!(evaluate(&instance, &result.solution.permutation).unwrap(), 12);
    }

    #[test]
    fn test_matches_full_enumeration() {
        let mut rng = make_rng(Some(17));
        for _ in 0..5 {
            let n = rng.gen_range(1..=7);
            let m = rng.gen_range(1..=4);
            let times = (0..n)
                .map(|_| (0..m).map(|_| rng.gen_range(0..=20)).collect())
                .collect();
            let instance = FlowShopInstance::new("random", times).unwrap();

            let result = BruteForceSolver::new().solve(&instance).unwrap();
            assert_eq!(result.solution.makespan, enumerate_all(&instance));
            assert!(result.solution.makespan >= result.lower_bound);
        }
    }

    #[test]
    fn test_refuses_large_instances() {
        let instance = FlowShopInstance::new("big", vec![vec![1, 1]; 12]).unwrap();
        assert!(matches!(
            BruteForceSolver::new().solve(&instance),
            Err(FlowShopError::InstanceTooLarge { jobs: 12, limit: 10 })
        ));
        assert!(BruteForceSolver::with_limit(12).solve(&instance).is_ok());

        let ragged = FlowShopInstance { num_jobs: 13, ..instance };
        assert!(matches!(
            BruteForceSolver::with_limit(20).solve(&ragged),
            Err(FlowShopError::InvalidInstance(_))
        ));
    }
}
