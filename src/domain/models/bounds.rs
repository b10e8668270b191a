//! Stack-wide bounds on the command.

use nalgebra::DVector;

use super::constraint::{Constraint, ConstraintKind, Relation};
use crate::domain::error::{ModelError, StackError, StackResult, TaskError};

/// Keeps the integrated configuration inside the joint position limits.
///
/// For a velocity command applied over `dt`:
/// `gain * (q_min - q) / dt <= dq <= gain * (q_max - q) / dt`.
#[derive(Debug, Clone)]
pub struct JointLimits {
    lower_limits: DVector<f64>,
    upper_limits: DVector<f64>,
    dt: f64,
    gain: f64,
    configuration: DVector<f64>,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl JointLimits {
    pub fn new(
        lower_limits: DVector<f64>,
        upper_limits: DVector<f64>,
        configuration: &DVector<f64>,
        dt: f64,
    ) -> StackResult<Self> {
        if lower_limits.len() != upper_limits.len() || configuration.len() != lower_limits.len() {
            return Err(StackError::ShapeMismatch {
                context: "joint limits".to_string(),
                expected: lower_limits.len(),
                found: upper_limits.len().max(configuration.len()),
            });
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(StackError::InvalidTimeStep {
                constraint: "joint_limits".to_string(),
                dt,
            });
        }
        let n = lower_limits.len();
        let mut limits = Self {
            lower_limits,
            upper_limits,
            dt,
            gain: 1.0,
            configuration: configuration.clone(),
            lower: DVector::zeros(n),
            upper: DVector::zeros(n),
        };
        limits.recompute();
        Ok(limits)
    }

    /// Fraction of the remaining range allowed per step, in `(0, 1]`.
    #[must_use]
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self.recompute();
        self
    }

    fn recompute(&mut self) {
        let scale = self.gain / self.dt;
        self.lower = (&self.lower_limits - &self.configuration) * scale;
        self.upper = (&self.upper_limits - &self.configuration) * scale;
    }
}

impl Constraint for JointLimits {
    fn name(&self) -> &str {
        "joint_limits"
    }

    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Inequality
    }

    fn x_size(&self) -> usize {
        self.lower_limits.len()
    }

    fn relation(&self) -> Relation {
        Relation::bounds(self.lower.clone(), self.upper.clone())
    }

    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        if configuration.len() != self.lower_limits.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.lower_limits.len(),
                found: configuration.len(),
            }
            .into());
        }
        self.configuration.copy_from(configuration);
        self.recompute();
        Ok(())
    }
}

/// Symmetric joint velocity bounds `-v_max <= dq <= v_max`.
#[derive(Debug, Clone)]
pub struct VelocityLimits {
    limits: DVector<f64>,
}

impl VelocityLimits {
    /// Same limit for all `joints`.
    pub fn uniform(limit: f64, joints: usize) -> Self {
        Self {
            limits: DVector::from_element(joints, limit.abs()),
        }
    }

    pub fn per_joint(limits: DVector<f64>) -> Self {
        Self {
            limits: limits.abs(),
        }
    }
}

impl Constraint for VelocityLimits {
    fn name(&self) -> &str {
        "velocity_limits"
    }

    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Inequality
    }

    fn x_size(&self) -> usize {
        self.limits.len()
    }

    fn relation(&self) -> Relation {
        Relation::bounds(-&self.limits, self.limits.clone())
    }

    fn update(&mut self, _configuration: &DVector<f64>) -> Result<(), TaskError> {
        Ok(())
    }
}
