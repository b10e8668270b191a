//! Preview results.
//!
//! A run produces the instants at which the solve failed and one
//! configuration snapshot per simulated step.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::domain::error::SolveFailure;

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    UnfeasibleSolve,
    ConstraintViolated,
    SingularConfiguration,
    Other,
}

impl FailureReason {
    pub const ALL: [Self; 4] = [
        Self::UnfeasibleSolve,
        Self::ConstraintViolated,
        Self::SingularConfiguration,
        Self::Other,
    ];

    /// Human-readable label, for logs and reports only.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnfeasibleSolve => "unfeasible solve",
            Self::ConstraintViolated => "constraint violated",
            Self::SingularConfiguration => "singular configuration",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SolveFailure> for FailureReason {
    fn from(failure: &SolveFailure) -> Self {
        match failure {
            SolveFailure::Infeasible(_) => Self::ConstraintViolated,
            SolveFailure::RankDeficient(_) => Self::UnfeasibleSolve,
            SolveFailure::Singular(_) => Self::SingularConfiguration,
            SolveFailure::Other(_) => Self::Other,
        }
    }
}

/// A failed solve at time `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub t: f64,
    pub reason: FailureReason,
    /// Solver message, if any.
    pub detail: String,
}

/// Configuration after the step starting at `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryNode {
    pub t: f64,
    pub q: DVector<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResults {
    /// Failed solves in chronological order.
    pub failures: Vec<Failure>,
    /// One node per simulated step, in chronological order.
    pub trajectory: Vec<TrajectoryNode>,
    /// Simulation step in seconds.
    pub step: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PreviewResults {
    pub fn new(step: f64) -> Self {
        Self {
            failures: Vec::new(),
            trajectory: Vec::new(),
            step,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_failure(&mut self, t: f64, failure: &SolveFailure) {
        self.failures.push(Failure {
            t,
            reason: failure.into(),
            detail: failure.to_string(),
        });
    }

    pub fn record_node(&mut self, t: f64, q: DVector<f64>) {
        self.trajectory.push(TrajectoryNode { t, q });
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// No step was logged.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty() && self.trajectory.is_empty()
    }

    /// Every step solved.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_count_by_reason(&self) -> BTreeMap<FailureReason, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Last logged configuration.
    pub fn final_configuration(&self) -> Option<&DVector<f64>> {
        self.trajectory.last().map(|node| &node.q)
    }
}
