//! PFSP Solver - Command Line Interface
//!
//! Solves permutation flow-shop instances with discrete Differential Evolution.

use clap::{Parser, Subcommand, ValueEnum};
use pfsp_solver::benchmark::{format_permutation, run_seed, Benchmark, DriverConfig};
use pfsp_solver::exact::BruteForceSolver;
use pfsp_solver::heuristics::differential_evolution::{DEConfig, DifferentialEvolution, RepairPolicy};
use pfsp_solver::instance::FlowShopInstance;
use pfsp_solver::makespan;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pfsp-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Permutation flow-shop solver based on discrete Differential Evolution")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single instance
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        #[command(flatten)]
        params: DEParams,

        /// Write the solution in text format
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the solution as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Print the start and end time of every operation
        #[arg(long)]
        schedule: bool,
    },

    /// Solve a list of instances, writing one solution file per instance
    Run {
        /// Instance files (appended to those of --config)
        instances: Vec<PathBuf>,

        /// JSON driver configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for solutions and results
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of runs per instance
        #[arg(short, long)]
        runs: Option<usize>,

        /// Random seed (run r uses seed + r)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Also compute exact optima for small instances
        #[arg(long)]
        exact: bool,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Compare repeated seeded runs against the exact optimum
    Compare {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Number of runs
        #[arg(short, long, default_value = "10")]
        runs: usize,

        #[command(flatten)]
        params: DEParams,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct DEParams {
    /// Population size (NP)
    #[arg(long, default_value = "100")]
    population: usize,

    /// Number of generations (G)
    #[arg(long, default_value = "100")]
    generations: usize,

    /// Mutation scale factor (F)
    #[arg(long, default_value = "0.8")]
    mutation_factor: f64,

    /// Crossover rate (CR)
    #[arg(long, default_value = "0.9")]
    crossover_rate: f64,

    /// Random seed (OS entropy when omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// How invalid trial vectors are handled
    #[arg(long, value_enum, default_value = "nearest-unused")]
    repair: Repair,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Repair {
    /// Reassign duplicated jobs to the nearest unused index
    NearestUnused,
    /// Drop invalid trials
    Discard,
}

impl DEParams {
    fn to_config(&self) -> DEConfig {
        DEConfig {
            population_size: self.population,
            max_generations: self.generations,
            mutation_factor: self.mutation_factor,
            crossover_rate: self.crossover_rate,
            seed: self.seed,
            repair: match self.repair {
                Repair::NearestUnused => RepairPolicy::NearestUnused,
                Repair::Discard => RepairPolicy::Discard,
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Solve { instance, params, output, json, schedule } => {
            solve_instance(&instance, &params, output, json, schedule);
        }

        Commands::Run { instances, config, output_dir, runs, seed, exact } => {
            run_driver(instances, config, output_dir, runs, seed, exact);
        }

        Commands::Analyze { instance } => {
            analyze_instance(&instance);
        }

        Commands::Compare { instance, runs, params, output } => {
            compare_runs(&instance, runs, &params, output);
        }
    }
}

fn load_instance(path: &Path) -> FlowShopInstance {
    match FlowShopInstance::from_file(path) {
        Ok(inst) => inst,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}

fn solve_instance(path: &Path, params: &DEParams, output: Option<PathBuf>, json: Option<PathBuf>, schedule: bool) {
    println!("Loading instance from {:?}...", path);
    let instance = load_instance(path);

    let mut de = match DifferentialEvolution::new(&instance, params.to_config()) {
        Ok(de) => de,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Solving {} ({} jobs x {} machines)...", instance.name, instance.num_jobs, instance.num_machines);
    let start = Instant::now();
    let solution = de.run();
    let elapsed = start.elapsed();
    let stats = de.statistics();

    println!("\n========== Results ==========");
    println!("Algorithm: {}", solution.algorithm);
    println!("Permutation: {}", format_permutation(&solution.permutation));
    println!("Makespan: {}", solution.makespan);
    println!("Lower bound: {}", instance.lower_bound());
    println!("Generations: {}", de.current_generation());
    println!("Evaluations: {}", stats.evaluations);
    println!("Replacements: {}", stats.replacements);
    println!("Repaired trials: {}", stats.repaired_trials);
    println!("Discarded trials: {}", stats.discarded_trials);
    println!("Time: {} ms", elapsed.as_millis());

    if schedule {
        match makespan::schedule(&instance, &solution.permutation) {
            Ok(operations) => {
                println!("\nSchedule (job:start-end)");
                for machine in 0..instance.num_machines {
                    let cells: Vec<String> = operations
                        .iter()
                        .filter(|op| op.machine == machine)
                        .map(|op| format!("{}:{}-{}", op.job, op.start, op.end))
                        .collect();
                    println!("  M{}: {}", machine, cells.join(" "));
                }
            }
            Err(e) => eprintln!("Cannot build schedule: {}", e),
        }
    }

    if let Some(out_path) = output {
        match solution.write_text(&out_path) {
            Ok(()) => println!("\nSolution saved to {:?}", out_path),
            Err(e) => {
                eprintln!("Failed to write output: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Some(json_path) = json {
        match solution.write_json(&json_path) {
            Ok(()) => println!("Solution saved to {:?}", json_path),
            Err(e) => {
                eprintln!("Failed to write JSON output: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_driver(
    instances: Vec<PathBuf>,
    config_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    runs: Option<usize>,
    seed: Option<u64>,
    exact: bool,
) {
    let mut config = match config_path {
        Some(path) => match DriverConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error reading configuration {:?}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => DriverConfig::default(),
    };

    config.instance_sources.extend(instances);
    if let Some(dir) = output_dir {
        config.output_directory = dir;
    }
    if let Some(runs) = runs {
        config.runs = runs;
    }
    if seed.is_some() {
        config.de.seed = seed;
    }
    config.run_exact |= exact;

    if config.instance_sources.is_empty() {
        eprintln!("No instances given!");
        std::process::exit(1);
    }

    let output = config.output_directory.clone();
    let mut benchmark = Benchmark::new(config);

    let solved = match benchmark.run_all() {
        Ok(solved) => solved,
        Err(e) => {
            eprintln!("Failed to prepare output directory {:?}: {}", output, e);
            std::process::exit(1);
        }
    };
    println!("Solved {}/{} instances", solved, benchmark.config().instance_sources.len());

    let results_path = output.join("results.csv");
    match benchmark.export_to_csv(&results_path) {
        Ok(()) => println!("Results exported to {:?}", results_path),
        Err(e) => eprintln!("Failed to export results: {}", e),
    }

    let stats_path = output.join("statistics.csv");
    match benchmark.export_statistics_csv(&stats_path) {
        Ok(()) => println!("Statistics exported to {:?}", stats_path),
        Err(e) => eprintln!("Failed to export statistics: {}", e),
    }

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    match std::fs::write(&report_path, &report) {
        Ok(()) => println!("Report saved to {:?}", report_path),
        Err(e) => eprintln!("Failed to save report: {}", e),
    }
}

fn analyze_instance(path: &Path) {
    let instance = load_instance(path);

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    println!("Machine loads:");
    for k in 0..instance.num_machines {
        println!("  M{}: {}", k, instance.machine_total(k));
    }

    let identity: Vec<usize> = (0..instance.num_jobs).collect();
    if let Ok(value) = instance.makespan(&identity) {
        println!("\nIdentity order makespan: {}", value);
    }

    match BruteForceSolver::new().solve(&instance) {
        Ok(result) => println!(
            "Optimal makespan: {} ({} nodes, {:.4}s)",
            result.solution.makespan, result.nodes_explored, result.solution.computation_time
        ),
        Err(e) => println!("Exact solve skipped: {}", e),
    }
}

fn compare_runs(path: &Path, runs: usize, params: &DEParams, output: Option<PathBuf>) {
    let instance = load_instance(path);

    println!("Comparing {} seeded runs on {} ({} jobs)...\n", runs, instance.name, instance.num_jobs);

    let optimum = match BruteForceSolver::new().solve(&instance) {
        Ok(result) => Some(result.solution.makespan),
        Err(e) => {
            println!("No exact reference: {}", e);
            None
        }
    };

    let base_seed = params.seed.unwrap_or(0);
    let mut rows: Vec<(u64, u64, f64)> = Vec::new();

    for run in 0..runs {
        let seed = run_seed(base_seed, run);
        let config = DEConfig { seed: Some(seed), ..params.to_config() };
        let solution = match DifferentialEvolution::new(&instance, config) {
            Ok(mut de) => de.run(),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };

        println!("seed {:>4}: makespan {:>8}  time {:.4}s", seed, solution.makespan, solution.computation_time);
        rows.push((seed, solution.makespan, solution.computation_time));
    }

    if rows.is_empty() {
        return;
    }

    let best = rows.iter().map(|r| r.1).min().unwrap_or(0);
    let worst = rows.iter().map(|r| r.1).max().unwrap_or(0);
    let avg = rows.iter().map(|r| r.1 as f64).sum::<f64>() / rows.len() as f64;
    let avg_time = rows.iter().map(|r| r.2).sum::<f64>() / rows.len() as f64;

    println!("\n========== Summary ==========");
    println!("{:<10} {:>10} {:>10} {:>10} {:>10} {:>10}", "Optimum", "Best", "Average", "Worst", "Hits", "Avg Time");
    println!("{}", "-".repeat(66));
    let hits = optimum
        .map(|o| format!("{}/{}", rows.iter().filter(|r| r.1 == o).count(), rows.len()))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<10} {:>10} {:>10.2} {:>10} {:>10} {:>10.4}",
        optimum.map(|o| o.to_string()).unwrap_or_else(|| "-".to_string()),
        best,
        avg,
        worst,
        hits,
        avg_time
    );

    if let Some(out_path) = output {
        if let Err(e) = write_compare_csv(&out_path, &rows, optimum) {
            eprintln!("Failed to write CSV: {}", e);
            std::process::exit(1);
        }
        println!("\nResults exported to {:?}", out_path);
    }
}

fn write_compare_csv(path: &Path, rows: &[(u64, u64, f64)], optimum: Option<u64>) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["seed", "makespan", "optimum", "time"])?;

    for (seed, makespan, time) in rows {
        writer.write_record(&[
            seed.to_string(),
            makespan.to_string(),
            optimum.map(|o| o.to_string()).unwrap_or_default(),
            format!("{:.4}", time),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
