//! Domain errors for the stack-of-tasks system.

use thiserror::Error;

use super::models::results::PreviewResults;

/// Errors raised while composing tasks, constraints and stacks.
///
/// These are construction-time failures: they fail fast and never pad or
/// truncate a relation to make shapes fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StackError {
    #[error("Shape mismatch in {context}: expected {expected} columns, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Target of '{task}' has length {found}, coefficients have {expected} rows")]
    TargetMismatch {
        task: String,
        expected: usize,
        found: usize,
    },

    #[error("Weight of '{task}' must be {expected}x{expected}, got {rows}x{cols}")]
    InvalidWeight {
        task: String,
        expected: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid time step for '{constraint}': {dt}. Must be positive and finite")]
    InvalidTimeStep { constraint: String, dt: f64 },

    #[error("Stack has no priority levels")]
    EmptyStack,

    #[error("Priority level {level} ('{task}') has an empty relation")]
    DegenerateLevel { level: usize, task: String },
}

pub type StackResult<T> = Result<T, StackError>;

/// Errors raised by a robot model while being queried or integrated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Unknown frame: {0}")]
    UnknownFrame(String),

    #[error("Configuration has {found} joints, model has {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Integration produced a non-finite configuration")]
    NonFinite,
}

/// Errors raised by individual tasks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("Task '{0}' cannot follow a reference trajectory")]
    ReferenceUnsupported(String),

    #[error("Reference for '{task}' has length {found}, expected {expected}")]
    ReferenceShape {
        task: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Typed failure returned by a solver for a single step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveFailure {
    /// The constraints cannot all hold at once.
    #[error("Infeasible constraints: {0}")]
    Infeasible(String),

    /// No command satisfies the hard part of the problem.
    #[error("Rank-deficient problem: {0}")]
    RankDeficient(String),

    /// Numerical singularity (non-finite data, ill-conditioned level).
    #[error("Numerical singularity: {0}")]
    Singular(String),

    #[error("Solver failure: {0}")]
    Other(String),
}

/// Errors returned by a preview run.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Invalid preview duration: {0}. Must be positive and finite")]
    InvalidDuration(f64),

    #[error("Invalid preview step: {0}. Must be positive and finite")]
    InvalidStep(f64),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("Trajectory binding {index} targets task '{task}', which is not part of the stack")]
    BindingMismatch { index: usize, task: String },

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Preview aborted at t={time:.4}s: {source}")]
    Aborted {
        time: f64,
        #[source]
        source: TaskError,
        partial: Box<PreviewResults>,
    },

    #[error("Preview cancelled at t={time:.4}s")]
    Cancelled {
        time: f64,
        partial: Box<PreviewResults>,
    },
}

impl PreviewError {
    /// Results logged before the run stopped.
    ///
    /// `None` for setup errors, where no step ran.
    pub fn partial_results(&self) -> Option<&PreviewResults> {
        match self {
            Self::Aborted { partial, .. } | Self::Cancelled { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Take ownership of the partial results, if any.
    pub fn into_partial_results(self) -> Option<PreviewResults> {
        match self {
            Self::Aborted { partial, .. } | Self::Cancelled { partial, .. } => Some(*partial),
            _ => None,
        }
    }
}

pub type PreviewResult<T> = Result<T, PreviewError>;
