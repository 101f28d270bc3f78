//! Error types for the flow-shop core.
//!
//! Loader and I/O failures live in [`crate::instance::LoadError`]; the core API
//! only ever reports [`FlowShopError`].

use thiserror::Error;

/// Failures the solver core can report to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowShopError {
    /// Zero jobs, zero machines or a ragged processing-time matrix
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// A sequence handed to the evaluator is not a permutation of the jobs
    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),

    /// Unusable optimizer parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The exhaustive solver refuses instances above its job limit
    #[error("instance has {jobs} jobs, exact search is limited to {limit}")]
    InstanceTooLarge { jobs: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, FlowShopError>;
