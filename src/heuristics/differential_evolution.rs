//! Discrete Differential Evolution for the permutation flow shop.
//!
//! Individuals are job permutations treated as integer vectors. Each trial
//! vector is built from the current individual and two other donors with the
//! classic `x + F * (y - z)` mutation and binomial crossover, clamped into the
//! job index range, repaired into a permutation and kept only on strict
//! improvement. Replacements are applied generation by generation.

use std::time::Instant;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FlowShopError, Result};
use crate::instance::FlowShopInstance;
use crate::makespan::evaluate_valid;
use crate::permutation::{is_permutation, random_permutation, repair_nearest_unused};
use crate::rng::{make_rng, RandomSource};
use crate::solution::Solution;

/// What happens to trial vectors that are not permutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairPolicy {
    /// Reassign duplicated genes to the nearest unused job index
    NearestUnused,
    /// Drop the trial; the incumbent survives
    Discard,
}

/// Differential Evolution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DEConfig {
    /// Population size (NP)
    pub population_size: usize,
    /// Number of generations (G)
    pub max_generations: usize,
    /// Mutation scale factor (F)
    pub mutation_factor: f64,
    /// Crossover rate (CR)
    pub crossover_rate: f64,
    /// Random seed, `None` draws one from the OS
    pub seed: Option<u64>,
    /// Trial vector repair
    pub repair: RepairPolicy,
}

impl Default for DEConfig {
    fn default() -> Self {
        DEConfig {
            population_size: 100,
            max_generations: 100,
            mutation_factor: 0.8,
            crossover_rate: 0.9,
            seed: None,
            repair: RepairPolicy::NearestUnused,
        }
    }
}

impl DEConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 3 {
            return Err(FlowShopError::InvalidConfig(format!(
                "population size must be at least 3, got {}",
                self.population_size
            )));
        }
        if !self.mutation_factor.is_finite() {
            return Err(FlowShopError::InvalidConfig(format!(
                "mutation factor must be finite, got {}",
                self.mutation_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(FlowShopError::InvalidConfig(format!(
                "crossover rate must lie in [0, 1], got {}",
                self.crossover_rate
            )));
        }
        Ok(())
    }
}

/// Individual in the DE population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub permutation: Vec<usize>,
    pub makespan: u64,
}

/// Counters collected during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DEStatistics {
    pub evaluations: usize,
    pub replacements: usize,
    pub repaired_trials: usize,
    pub discarded_trials: usize,
}

/// Differential Evolution solver
pub struct DifferentialEvolution<'a, R = ChaCha8Rng> {
    config: DEConfig,
    instance: &'a FlowShopInstance,
    population: Vec<Member>,
    rng: R,
    generation: usize,
    history: Vec<u64>,
    stats: DEStatistics,
}

impl<'a> DifferentialEvolution<'a, ChaCha8Rng> {
    /// Solver seeded from `config.seed` (or OS entropy)
    pub fn new(instance: &'a FlowShopInstance, config: DEConfig) -> Result<Self> {
        let rng = make_rng(config.seed);
        Self::with_rng(instance, config, rng)
    }
}

impl<'a, R: RandomSource> DifferentialEvolution<'a, R> {
    /// Solver drawing from an explicit random source
    pub fn with_rng(instance: &'a FlowShopInstance, config: DEConfig, rng: R) -> Result<Self> {
        instance.validate()?;
        config.validate()?;

        Ok(DifferentialEvolution {
            config,
            instance,
            population: Vec::new(),
            rng,
            generation: 0,
            history: Vec::new(),
            stats: DEStatistics::default(),
        })
    }

    fn evaluate(&mut self, permutation: &[usize]) -> u64 {
        self.stats.evaluations += 1;
        evaluate_valid(self.instance, permutation)
    }

    /// Fill the population with independent random permutations
    pub fn initialize(&mut self) {
        let n = self.instance.num_jobs;
        self.population.clear();
        self.generation = 0;
        self.history.clear();
        self.stats = DEStatistics::default();

        for _ in 0..self.config.population_size {
            let permutation = random_permutation(n, &mut self.rng);
            let makespan = self.evaluate(&permutation);
            self.population.push(Member { permutation, makespan });
        }

        if let Some(best) = self.best_member() {
            let best = best.makespan;
            self.history.push(best);
            log::debug!("[DE] Initial population: {} members, best makespan {}", self.population.len(), best);
        }
    }

    /// Two donor indices distinct from `target` and from each other
    fn pick_donors(&mut self, target: usize) -> (usize, usize) {
        let last = self.config.population_size - 1;
        loop {
            let r2 = self.rng.next_int(0, last);
            let r3 = self.rng.next_int(0, last);
            if r2 != target && r3 != target && r2 != r3 {
                return (r2, r3);
            }
        }
    }

    /// Mutation plus binomial crossover for individual `target` with donors
    /// `r2` and `r3`.
    ///
    /// Mutated genes are truncated toward zero, then clamped into the job
    /// index range.
    fn build_trial(&mut self, target: usize, r2: usize, r3: usize) -> Vec<usize> {
        let n = self.instance.num_jobs;
        let forced = self.rng.next_int(0, n - 1);
        let max_index = (n - 1) as f64;

        let base = &self.population[target].permutation;
        let a = &self.population[r2].permutation;
        let b = &self.population[r3].permutation;

        let mut trial = Vec::with_capacity(n);
        for j in 0..n {
            let crossover = self.rng.next_uniform01() < self.config.crossover_rate;
            if crossover || j == forced {
                let value = base[j] as f64 + self.config.mutation_factor * (a[j] as f64 - b[j] as f64);
                trial.push(value.trunc().clamp(0.0, max_index) as usize);
            } else {
                trial.push(base[j]);
            }
        }

        trial
    }

    /// Run one generation over every individual
    pub fn evolve(&mut self) {
        if self.population.is_empty() {
            self.initialize();
        }

        let n = self.instance.num_jobs;
        let mut replacements: Vec<(usize, Member)> = Vec::new();

        for i in 0..self.population.len() {
            let (r2, r3) = self.pick_donors(i);
            let mut trial = self.build_trial(i, r2, r3);

            if !is_permutation(&trial, n) {
                match self.config.repair {
                    RepairPolicy::NearestUnused => {
                        repair_nearest_unused(&mut trial);
                        self.stats.repaired_trials += 1;
                    }
                    RepairPolicy::Discard => {
                        self.stats.discarded_trials += 1;
                        continue;
                    }
                }
            }

            let makespan = self.evaluate(&trial);
            if makespan < self.population[i].makespan {
                replacements.push((i, Member { permutation: trial, makespan }));
            }
        }

        self.stats.replacements += replacements.len();
        for (i, member) in replacements {
            self.population[i] = member;
        }

        self.generation += 1;
        if let Some(best) = self.best_member() {
            let best = best.makespan;
            self.history.push(best);
        }
    }

    /// Run the full search and return the best permutation found
    pub fn run(&mut self) -> Solution {
        let start = Instant::now();

        log::info!(
            "[DE] {}: {} jobs x {} machines, NP={} G={} F={} CR={}",
            self.instance.name,
            self.instance.num_jobs,
            self.instance.num_machines,
            self.config.population_size,
            self.config.max_generations,
            self.config.mutation_factor,
            self.config.crossover_rate
        );

        self.initialize();

        while self.generation < self.config.max_generations {
            self.evolve();

            if let Some(best) = self.best_member() {
                log::debug!(
                    "[DE] Gen {}  Best makespan {}  Diversity {:.2}  Elapsed {:.2}s",
                    self.generation,
                    best.makespan,
                    self.population_diversity(),
                    start.elapsed().as_secs_f64()
                );
            }
        }

        let best = self.best_member().cloned().unwrap_or_else(|| Member {
            permutation: Vec::new(),
            makespan: 0,
        });

        log::info!(
            "[DE] Finished after {} generations: makespan {} ({} evaluations, {} replacements)",
            self.generation,
            best.makespan,
            self.stats.evaluations,
            self.stats.replacements
        );

        Solution {
            permutation: best.permutation,
            makespan: best.makespan,
            algorithm: "DifferentialEvolution".to_string(),
            computation_time: start.elapsed().as_secs_f64(),
            iterations: Some(self.generation),
            history: self.history.clone(),
        }
    }

    /// First member with the smallest makespan
    pub fn best_member(&self) -> Option<&Member> {
        self.population.iter().min_by_key(|m| m.makespan)
    }

    pub fn population(&self) -> &[Member] {
        &self.population
    }

    pub fn current_generation(&self) -> usize {
        self.generation
    }

    /// Best makespan after initialization and after each generation
    pub fn history(&self) -> &[u64] {
        &self.history
    }

    pub fn statistics(&self) -> &DEStatistics {
        &self.stats
    }

    /// Get population diversity (average number of differing positions
    /// between pairs of the first 20 individuals)
    pub fn population_diversity(&self) -> f64 {
        let sample = self.population.len().min(20);
        if sample < 2 {
            return 0.0;
        }

        let mut total_diff = 0.0;
        let mut count = 0;

        for i in 0..sample {
            for j in i + 1..sample {
                let diff = self.population[i]
                    .permutation
                    .iter()
                    .zip(self.population[j].permutation.iter())
                    .filter(|(a, b)| a != b)
                    .count();
                total_diff += diff as f64;
                count += 1;
            }
        }

        total_diff / count as f64
    }
}

/// Run Differential Evolution once on `instance`
pub fn optimize(instance: &FlowShopInstance, config: DEConfig) -> Result<Solution> {
    let mut de = DifferentialEvolution::new(instance, config)?;
    Ok(de.run())
}
