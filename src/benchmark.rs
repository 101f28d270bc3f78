//! Driver and benchmarking module.
//!
//! Runs the optimizer over a configured list of instance files, writes one
//! solution file per instance, and collects per-run results that can be
//! exported to CSV or summarized in a text report.

use crate::exact::BruteForceSolver;
use crate::heuristics::differential_evolution::{DEConfig, DifferentialEvolution};
use crate::instance::FlowShopInstance;
use crate::solution::{solution_file_name, Solution};
use crate::error::FlowShopError;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Which instances to solve, where to write results, and how to search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Instance files, solved in order
    pub instance_sources: Vec<PathBuf>,
    /// Directory receiving solution files and exports
    pub output_directory: PathBuf,
    /// Number of optimizer runs per instance
    pub runs: usize,
    /// Optimizer parameters; run `r` uses `seed + r` when a seed is set
    pub de: DEConfig,
    /// Also compute the exact optimum when the instance is small enough
    pub run_exact: bool,
    /// Job limit for the exact solver
    pub exact_max_jobs: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            instance_sources: Vec::new(),
            output_directory: PathBuf::from("results"),
            runs: 1,
            de: DEConfig::default(),
            run_exact: false,
            exact_max_jobs: 10,
        }
    }
}

impl DriverConfig {
    /// Load a driver configuration from a JSON file; missing fields take
    /// their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Result of a single optimizer run on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Instance name
    pub instance: String,
    /// Number of jobs
    pub num_jobs: usize,
    /// Number of machines
    pub num_machines: usize,
    /// Algorithm name
    pub algorithm: String,
    /// Run index for the instance
    pub run: usize,
    /// Seed used, if any
    pub seed: Option<u64>,
    /// Best makespan found
    pub makespan: u64,
    /// Instance lower bound
    pub lower_bound: u64,
    /// Gap to the proven optimum (percent), if known
    pub gap_to_optimum: Option<f64>,
    /// Computation time in seconds
    pub time: f64,
    /// Generations performed
    pub iterations: Option<usize>,
}

/// Aggregated statistics for one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    pub instance: String,
    pub num_runs: usize,
    pub best_makespan: u64,
    pub avg_makespan: f64,
    pub worst_makespan: u64,
    pub std_makespan: f64,
    pub optimum: Option<u64>,
    pub avg_gap: Option<f64>,
    pub avg_time: f64,
    pub total_time: f64,
}

/// Benchmarking engine
pub struct Benchmark {
    config: DriverConfig,
    results: Vec<RunResult>,
    optima: HashMap<String, u64>,
}

impl Benchmark {
    pub fn new(config: DriverConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            optima: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Set a known optimum for an instance
    pub fn set_optimum(&mut self, instance_name: &str, makespan: u64) {
        self.optima.insert(instance_name.to_string(), makespan);
    }

    /// Solve an instance exactly and remember its optimum
    pub fn run_exact(&mut self, instance: &FlowShopInstance) -> Option<u64> {
        if !self.config.run_exact {
            return None;
        }

        match BruteForceSolver::with_limit(self.config.exact_max_jobs).solve(instance) {
            Ok(result) => {
                let optimum = result.solution.makespan;
                self.optima.insert(instance.name.clone(), optimum);
                Some(optimum)
            }
            Err(FlowShopError::InstanceTooLarge { jobs, limit }) => {
                log::info!("Skipping exact solve of {} ({} jobs > {})", instance.name, jobs, limit);
                None
            }
            Err(e) => {
                log::error!("Exact solver failed on {}: {}", instance.name, e);
                None
            }
        }
    }

    /// Run the optimizer `runs` times on an instance and return the best
    /// solution over all runs
    pub fn run_instance(&mut self, instance: &FlowShopInstance) -> Result<Solution, FlowShopError> {
        log::info!("Running benchmark on instance: {}", instance.name);

        self.run_exact(instance);

        let mut best: Option<Solution> = None;
        for run in 0..self.config.runs.max(1) {
            let de_config = DEConfig {
                seed: self.config.de.seed.map(|s| run_seed(s, run)),
                ..self.config.de.clone()
            };
            let seed = de_config.seed;

            let mut de = DifferentialEvolution::new(instance, de_config)?;
            let solution = de.run();
            self.record_result(instance, &solution, run, seed);

            if best.as_ref().map_or(true, |b| solution.makespan < b.makespan) {
                best = Some(solution);
            }
        }

        best.ok_or_else(|| FlowShopError::InvalidConfig("no runs performed".to_string()))
    }

    /// Solve every configured instance source, writing `solution_<name>` files
    /// into the output directory. Sources that cannot be loaded are reported
    /// and skipped. Returns the number of instances solved.
    pub fn run_all(&mut self) -> io::Result<usize> {
        fs::create_dir_all(&self.config.output_directory)?;

        let sources = self.config.instance_sources.clone();
        let progress = ProgressBar::new(sources.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut solved = 0;
        let mut used_names: HashSet<String> = HashSet::new();
        for source in &sources {
            progress.set_message(source.display().to_string());

            let mut instance = match FlowShopInstance::from_file(source) {
                Ok(instance) => instance,
                Err(e) => {
                    log::error!("Error reading instance file {}: {}", source.display(), e);
                    progress.inc(1);
                    continue;
                }
            };

            let name = unique_name(&instance.name, &used_names);
            if name != instance.name {
                log::warn!(
                    "Instance name {} already used in this batch, {} is reported as {}",
                    instance.name,
                    source.display(),
                    name
                );
                instance.name = name;
            }
            used_names.insert(instance.name.clone());

            let solution = match self.run_instance(&instance) {
                Ok(solution) => solution,
                Err(e) => {
                    log::error!("Optimizer failed on {}: {}", instance.name, e);
                    progress.inc(1);
                    continue;
                }
            };

            progress.suspend(|| {
                println!("Instance : {}", source.display());
                print!("{}", run_summary(&solution));
                println!("{}", "-".repeat(40));
            });

            let out_path = self.config.output_directory.join(solution_file_name(&instance.name));
            if let Err(e) = solution.write_text(&out_path) {
                log::error!("Error writing solution file {}: {}", out_path.display(), e);
            }

            solved += 1;
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(solved)
    }

    /// Record a result
    fn record_result(&mut self, instance: &FlowShopInstance, solution: &Solution, run: usize, seed: Option<u64>) {
        let gap_to_optimum = self.optima.get(&instance.name).map(|&opt| solution.gap_to(opt));

        self.results.push(RunResult {
            instance: instance.name.clone(),
            num_jobs: instance.num_jobs,
            num_machines: instance.num_machines,
            algorithm: solution.algorithm.clone(),
            run,
            seed,
            makespan: solution.makespan,
            lower_bound: instance.lower_bound(),
            gap_to_optimum,
            time: solution.computation_time,
            iterations: solution.iterations,
        });
    }

    /// Compute statistics for each instance, in first-seen order
    pub fn compute_statistics(&self) -> Vec<RunStatistics> {
        let mut order: Vec<&str> = Vec::new();
        let mut by_instance: HashMap<&str, Vec<&RunResult>> = HashMap::new();

        for result in &self.results {
            let entry = by_instance.entry(result.instance.as_str()).or_insert_with(|| {
                order.push(result.instance.as_str());
                Vec::new()
            });
            entry.push(result);
        }

        let mut statistics = Vec::new();

        for name in order {
            let results = &by_instance[name];
            let makespans: Vec<f64> = results.iter().map(|r| r.makespan as f64).collect();
            let times: Vec<f64> = results.iter().map(|r| r.time).collect();
            let gaps: Vec<f64> = results.iter().filter_map(|r| r.gap_to_optimum).collect();

            let std_makespan = if makespans.len() > 1 {
                Statistics::std_dev(makespans.iter())
            } else {
                0.0
            };

            statistics.push(RunStatistics {
                instance: name.to_string(),
                num_runs: results.len(),
                best_makespan: results.iter().map(|r| r.makespan).min().unwrap_or(0),
                avg_makespan: Statistics::mean(makespans.iter()),
                worst_makespan: results.iter().map(|r| r.makespan).max().unwrap_or(0),
                std_makespan,
                optimum: self.optima.get(name).copied(),
                avg_gap: if gaps.is_empty() {
                    None
                } else {
                    Some(Statistics::mean(gaps.iter()))
                },
                avg_time: Statistics::mean(times.iter()),
                total_time: times.iter().sum(),
            });
        }

        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("      Flow-Shop Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        let de = &self.config.de;
        report.push_str(&format!(
            "DE: NP={} G={} F={} CR={} repair={:?}\n\n",
            de.population_size, de.max_generations, de.mutation_factor, de.crossover_rate, de.repair
        ));

        report.push_str("-".repeat(90).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<25} {:>6} {:>10} {:>12} {:>10} {:>10} {:>12}\n",
            "Instance", "Runs", "Best", "Average", "Worst", "Optimum", "Avg Time"
        ));
        report.push_str("-".repeat(90).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            let optimum = stat
                .optimum
                .map(|o| o.to_string())
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:<25} {:>6} {:>10} {:>12.2} {:>10} {:>10} {:>12.4}\n",
                stat.instance,
                stat.num_runs,
                stat.best_makespan,
                stat.avg_makespan,
                stat.worst_makespan,
                optimum,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(90).as_str());
        report.push('\n');

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    /// Get known optima
    pub fn optima(&self) -> &HashMap<String, u64> {
        &self.optima
    }
}

/// Seed of run `run` when the base seed is `base`; wraps around at `u64::MAX`
pub fn run_seed(base: u64, run: usize) -> u64 {
    base.wrapping_add(run as u64)
}

/// Console summary of one solved instance. The execution time is the
/// optimizer run that produced `solution`.
pub fn run_summary(solution: &Solution) -> String {
    format!(
        "Best permutation : {}\nMakespan : {}\nExecution time : {} ms\n",
        format_permutation(&solution.permutation),
        solution.makespan,
        (solution.computation_time * 1000.0).round() as u64
    )
}

/// `name`, or `name` with a `_2`, `_3`... suffix before its extension when
/// already taken
fn unique_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    (2..)
        .map(|k| match (&stem, &extension) {
            (Some(stem), Some(ext)) => format!("{}_{}.{}", stem, k, ext),
            _ => format!("{}_{}", name, k),
        })
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Space separated job indices
pub fn format_permutation(permutation: &[usize]) -> String {
    permutation
        .iter()
        .map(|j| j.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pfsp_{}_{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn small_de(seed: u64) -> DEConfig {
        DEConfig {
            population_size: 10,
            max_generations: 20,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = DriverConfig::default();
        assert_eq!(config.runs, 1);
        assert_eq!(config.de.population_size, 100);
        assert_eq!(config.output_directory, PathBuf::from("results"));
    }

    #[test]
    fn test_config_from_json() {
        let dir = temp_dir("config");
        let path = dir.join("driver.json");
        fs::write(
            &path,
            r#"{ "instance_sources": ["a.txt", "b.txt"], "runs": 3, "de": { "population_size": 30, "seed": 5 } }"#,
        )
        .unwrap();

        let config = DriverConfig::from_json_file(&path).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.instance_sources, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert_eq!(config.runs, 3);
        assert_eq!(config.de.population_size, 30);
        assert_eq!(config.de.seed, Some(5));
        assert_eq!(config.de.max_generations, 100);
        assert_eq!(config.output_directory, PathBuf::from("results"));
    }

    #[test]
    fn test_run_instance_records_every_run() {
        let instance = FlowShopInstance::new("tiny", vec![vec![5, 3], vec![2, 6], vec![4, 1], vec![3, 3]]).unwrap();
        let mut benchmark = Benchmark::new(DriverConfig {
            runs: 3,
            de: small_de(1),
            run_exact: true,
            ..Default::default()
        });

        let best = benchmark.run_instance(&instance).unwrap();

        assert_eq!(benchmark.results().len(), 3);
        let seeds: Vec<Option<u64>> = benchmark.results().iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![Some(1), Some(2), Some(3)]);
        assert!(benchmark.results().iter().all(|r| r.makespan >= best.makespan));
        assert!(benchmark.results().iter().all(|r| r.gap_to_optimum.is_some()));

        let optimum = benchmark.optima()["tiny"];
        assert!(best.makespan >= optimum);

        let stats = benchmark.compute_statistics();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].num_runs, 3);
        assert_eq!(stats[0].best_makespan, best.makespan);
        assert_eq!(stats[0].optimum, Some(optimum));
    }

    #[test]
    fn test_run_all_writes_solutions_and_skips_missing_sources() {
        let dir = temp_dir("driver");
        let instance_path = dir.join("tiny.txt");
        fs::write(&instance_path, "3 2\n5 3\n2 6\n4 1\n").unwrap();
        let output = dir.join("out");

        let mut benchmark = Benchmark::new(DriverConfig {
            instance_sources: vec![dir.join("missing.txt"), instance_path],
            output_directory: output.clone(),
            de: small_de(3),
            ..Default::default()
        });

        let solved = benchmark.run_all().unwrap();
        assert_eq!(solved, 1);

        let text = fs::read_to_string(output.join("solution_tiny.txt")).unwrap();
        let mut lines = text.lines();
        let permutation: Vec<usize> = lines
            .next()
            .unwrap()
            .trim_start_matches("Permutation : ")
            .split_whitespace()
            .map(|t| t.parse().unwrap())
            .collect();
        let makespan: u64 = lines.next().unwrap().trim_start_matches("Makespan : ").parse().unwrap();
        let instance = FlowShopInstance::from_file(dir.join("tiny.txt")).unwrap();
        assert_eq!(instance.makespan(&permutation).unwrap(), makespan);
        assert!(makespan >= 12);

        let csv_path = output.join("results.csv");
        benchmark.export_to_csv(&csv_path).unwrap();
        benchmark.export_statistics_csv(output.join("statistics.csv")).unwrap();
        let csv = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().next().unwrap().starts_with("instance,num_jobs,num_machines"));

        let report = benchmark.generate_report();
        assert!(report.contains("tiny.txt"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_seeds_wrap_around() {
        let instance = FlowShopInstance::new("tiny", vec![vec![5, 3], vec![2, 6], vec![4, 1]]).unwrap();
        let mut benchmark = Benchmark::new(DriverConfig {
            runs: 2,
            de: small_de(u64::MAX),
            ..Default::default()
        });

        benchmark.run_instance(&instance).unwrap();

        let seeds: Vec<Option<u64>> = benchmark.results().iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![Some(u64::MAX), Some(0)]);
        assert_eq!(run_seed(u64::MAX - 1, 3), 1);
    }

    #[test]
    fn test_run_summary_reports_optimizer_time() {
        let solution = Solution {
            permutation: vec![2, 0, 1],
            makespan: 12,
            algorithm: "DifferentialEvolution".to_string(),
            computation_time: 0.25,
            iterations: Some(10),
            history: Vec::new(),
        };

        assert_eq!(
            run_summary(&solution),
            "Best permutation : 2 0 1\nMakespan : 12\nExecution time : 250 ms\n"
        );
    }

    #[test]
    fn test_duplicate_file_names_are_kept_apart() {
        let dir = temp_dir("duplicates");
        let first = dir.join("a").join("tiny.txt");
        let second = dir.join("b").join("tiny.txt");
        fs::create_dir_all(dir.join("a")).unwrap();
        fs::create_dir_all(dir.join("b")).unwrap();
        fs::write(&first, "3 2\n5 3\n2 6\n4 1\n").unwrap();
        fs::write(&second, "2 1\n4\n7\n").unwrap();
        let output = dir.join("out");

        let mut benchmark = Benchmark::new(DriverConfig {
            instance_sources: vec![first, second],
            output_directory: output.clone(),
            de: small_de(5),
            ..Default::default()
        });

        assert_eq!(benchmark.run_all().unwrap(), 2);

        let names: Vec<String> = benchmark.compute_statistics().into_iter().map(|s| s.instance).collect();
        assert_eq!(names, vec!["tiny.txt".to_string(), "tiny_2.txt".to_string()]);
        assert!(output.join("solution_tiny.txt").exists());
        let second_solution = fs::read_to_string(output.join("solution_tiny_2.txt")).unwrap();
        assert!(second_solution.ends_with("Makespan : 11\n"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unique_name() {
        let used: HashSet<String> = ["ta001.txt", "ta001_2.txt", "raw"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_name("ta002.txt", &used), "ta002.txt");
        assert_eq!(unique_name("ta001.txt", &used), "ta001_3.txt");
        assert_eq!(unique_name("raw", &used), "raw_2");
    }

    #[test]
    fn test_format_permutation() {
        assert_eq!(format_permutation(&[2, 0, 1]), "2 0 1");
        assert_eq!(format_permutation(&[]), "");
    }
}
