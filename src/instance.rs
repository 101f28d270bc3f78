//! Module for parsing and representing flow-shop instances.
//!
//! Instances use the plain Taillard-style text layout: the job count `n` and
//! the machine count `m`, followed by `n * m` processing times listed job by
//! job. Tokens are whitespace separated; line breaks carry no meaning.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FlowShopError;
use crate::makespan;

/// Errors raised while reading an instance source
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read instance file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid token '{token}' at position {position}")]
    Parse { token: String, position: usize },

    #[error("expected {expected} values, found {found}")]
    MissingData { expected: usize, found: usize },

    #[error(transparent)]
    Invalid(#[from] FlowShopError),
}

/// Represents a permutation flow-shop instance.
///
/// Deserialized instances go through [`FlowShopInstance::validate`]; one
/// assembled by hand should be checked the same way before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInstance")]
pub struct FlowShopInstance {
    /// Name of the instance (file name when loaded from disk)
    pub name: String,
    /// Number of jobs
    pub num_jobs: usize,
    /// Number of machines
    pub num_machines: usize,
    /// `processing_times[j][k]`: time job `j` occupies machine `k`
    pub processing_times: Vec<Vec<u32>>,
}

/// Serialized shape of an instance, checked before it becomes one
#[derive(Deserialize)]
struct RawInstance {
    name: String,
    num_jobs: usize,
    num_machines: usize,
    processing_times: Vec<Vec<u32>>,
}

impl TryFrom<RawInstance> for FlowShopInstance {
    type Error = FlowShopError;

    fn try_from(raw: RawInstance) -> Result<Self, Self::Error> {
        let instance = FlowShopInstance {
            name: raw.name,
            num_jobs: raw.num_jobs,
            num_machines: raw.num_machines,
            processing_times: raw.processing_times,
        };
        instance.validate()?;
        Ok(instance)
    }
}

impl FlowShopInstance {
    /// Build an instance from a processing-time matrix (one row per job).
    pub fn new(name: impl Into<String>, processing_times: Vec<Vec<u32>>) -> Result<Self, FlowShopError> {
        let instance = FlowShopInstance {
            name: name.into(),
            num_jobs: processing_times.len(),
            num_machines: processing_times.first().map_or(0, |row| row.len()),
            processing_times,
        };
        instance.validate()?;
        Ok(instance)
    }

    /// Check that the declared dimensions are non-zero and match the
    /// processing-time matrix.
    pub fn validate(&self) -> Result<(), FlowShopError> {
        if self.num_jobs == 0 {
            return Err(FlowShopError::InvalidInstance("instance has no jobs".to_string()));
        }
        if self.num_machines == 0 {
            return Err(FlowShopError::InvalidInstance("instance has no machines".to_string()));
        }

        if self.processing_times.len() != self.num_jobs {
            return Err(FlowShopError::InvalidInstance(format!(
                "{} jobs declared but {} rows of processing times given",
                self.num_jobs,
                self.processing_times.len()
            )));
        }

        if let Some((job, row)) = self
            .processing_times
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.num_machines)
        {
            return Err(FlowShopError::InvalidInstance(format!(
                "job {} has {} processing times, expected {}",
                job,
                row.len(),
                self.num_machines
            )));
        }

        Ok(())
    }

    /// Parse an instance from a flow-shop file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Self::parse(name, &content)
    }

    /// Parse an instance from its text form
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self, LoadError> {
        let mut tokens = content.split_whitespace().enumerate();

        let mut next_value = |expected: usize, found: usize| -> Result<u64, LoadError> {
            let (position, token) = tokens
                .next()
                .ok_or(LoadError::MissingData { expected, found })?;
            token.parse::<u64>().map_err(|_| LoadError::Parse {
                token: token.to_string(),
                position,
            })
        };

        let num_jobs = next_value(2, 0)? as usize;
        let num_machines = next_value(2, 1)? as usize;
        if num_jobs == 0 || num_machines == 0 {
            return Err(FlowShopError::InvalidInstance(format!(
                "header declares {} jobs and {} machines",
                num_jobs, num_machines
            ))
            .into());
        }

        let expected = num_jobs.checked_mul(num_machines).ok_or_else(|| {
            FlowShopError::InvalidInstance(format!(
                "header declares {} jobs and {} machines, too many processing times",
                num_jobs, num_machines
            ))
        })?;
        let available = content.split_whitespace().count().saturating_sub(2);
        if available < expected {
            return Err(LoadError::MissingData { expected, found: available });
        }

        let mut processing_times = Vec::with_capacity(num_jobs);
        for job in 0..num_jobs {
            let mut row = Vec::with_capacity(num_machines);
            for machine in 0..num_machines {
                let value = next_value(expected, job * num_machines + machine)?;
                let time = u32::try_from(value).map_err(|_| LoadError::Parse {
                    token: value.to_string(),
                    position: 2 + job * num_machines + machine,
                })?;
                row.push(time);
            }
            processing_times.push(row);
        }

        let trailing = tokens.count();
        if trailing > 0 {
            log::warn!("ignoring {} trailing tokens after the processing-time matrix", trailing);
        }

        Ok(Self::new(name, processing_times)?)
    }

    /// Serialize back to the text format read by [`FlowShopInstance::parse`]
    pub fn to_text(&self) -> String {
        let mut text = format!("{} {}\n", self.num_jobs, self.num_machines);
        for row in &self.processing_times {
            let line: Vec<String> = row.iter().map(|t| t.to_string()).collect();
            text.push_str(&line.join(" "));
            text.push('\n');
        }
        text
    }

    /// Processing time of `job` on `machine`
    #[inline]
    pub fn processing_time(&self, job: usize, machine: usize) -> u32 {
        self.processing_times[job][machine]
    }

    /// Total processing time of a job over all machines
    pub fn job_total(&self, job: usize) -> u64 {
        self.processing_times[job].iter().map(|&t| t as u64).sum()
    }

    /// Total load of a machine over all jobs
    pub fn machine_total(&self, machine: usize) -> u64 {
        self.processing_times.iter().map(|row| row[machine] as u64).sum()
    }

    /// Makespan of a job sequence (see [`crate::makespan::evaluate`])
    pub fn makespan(&self, permutation: &[usize]) -> Result<u64, FlowShopError> {
        makespan::evaluate(self, permutation)
    }

    /// Order-independent makespan lower bound.
    ///
    /// Machine bound: for each machine, the least time any job needs before
    /// reaching it, plus its total load, plus the least time any job needs
    /// after leaving it. Job bound: the longest total job time.
    pub fn lower_bound(&self) -> u64 {
        let m = self.num_machines;

        let machine_bound = (0..m)
            .map(|k| {
                let head = self
                    .processing_times
                    .iter()
                    .map(|row| row[..k].iter().map(|&t| t as u64).sum::<u64>())
                    .min()
                    .unwrap_or(0);
                let tail = self
                    .processing_times
                    .iter()
                    .map(|row| row[k + 1..].iter().map(|&t| t as u64).sum::<u64>())
                    .min()
                    .unwrap_or(0);
                head + self.machine_total(k) + tail
            })
            .max()
            .unwrap_or(0);

        let job_bound = (0..self.num_jobs).map(|j| self.job_total(j)).max().unwrap_or(0);

        machine_bound.max(job_bound)
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let times: Vec<u32> = self.processing_times.iter().flatten().copied().collect();
        let total_work: u64 = times.iter().map(|&t| t as u64).sum();
        let min_time = times.iter().copied().min().unwrap_or(0);
        let max_time = times.iter().copied().max().unwrap_or(0);
        let avg_time = total_work as f64 / times.len().max(1) as f64;

        let (bottleneck_machine, bottleneck_load) = (0..self.num_machines)
            .map(|k| (k, self.machine_total(k)))
            .max_by_key(|&(k, load)| (load, std::cmp::Reverse(k)))
            .unwrap_or((0, 0));

        InstanceStatistics {
            name: self.name.clone(),
            num_jobs: self.num_jobs,
            num_machines: self.num_machines,
            total_work,
            min_time,
            max_time,
            avg_time,
            bottleneck_machine,
            bottleneck_load,
            lower_bound: self.lower_bound(),
        }
    }
}

/// Statistics about a flow-shop instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_jobs: usize,
    pub num_machines: usize,
    pub total_work: u64,
    pub min_time: u32,
    pub max_time: u32,
    pub avg_time: f64,
    pub bottleneck_machine: usize,
    pub bottleneck_load: u64,
    pub lower_bound: u64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Jobs: {}", self.num_jobs)?;
        writeln!(f, "  Machines: {}", self.num_machines)?;
        writeln!(f, "  Total work: {}", self.total_work)?;
        writeln!(f, "  Processing times: min {}, max {}, avg {:.2}", self.min_time, self.max_time, self.avg_time)?;
        writeln!(f, "  Bottleneck machine: {} (load {})", self.bottleneck_machine, self.bottleneck_load)?;
        writeln!(f, "  Makespan lower bound: {}", self.lower_bound)
    }
}
