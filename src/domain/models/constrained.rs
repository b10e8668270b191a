//! Constrained task: an existing task plus extra constraints.
//!
//! The relation, weight, gain and reference capability all belong to the
//! inner task; only the constraint set grows. The inner task stays
//! reachable through `members`, so trajectory bindings to it still resolve.

use nalgebra::{DMatrix, DVector};

use super::constraint::{union_into, ConstraintHandle};
use super::task::{Task, TaskHandle};
use super::trajectory::{Pose, Twist};
use crate::domain::error::{StackError, StackResult, TaskError};

#[derive(Debug)]
pub struct Constrained {
    name: String,
    inner: TaskHandle,
    constraints: Vec<ConstraintHandle>,
}

impl Constrained {
    /// Wrap `inner` with `constraint`, which must share its command dimension.
    pub fn new(inner: TaskHandle, constraint: ConstraintHandle) -> StackResult<Self> {
        let name = inner.name();
        let expected = inner.x_size();
        let found = constraint.x_size();
        if found != expected {
            return Err(StackError::ShapeMismatch {
                context: format!("constraint '{}' on '{name}'", constraint.name()),
                expected,
                found,
            });
        }
        Ok(Self {
            name,
            inner,
            constraints: vec![constraint],
        })
    }

    pub const fn inner(&self) -> &TaskHandle {
        &self.inner
    }
}

impl Task for Constrained {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_size(&self) -> usize {
        self.inner.x_size()
    }

    fn coefficients(&self) -> DMatrix<f64> {
        self.inner.coefficients()
    }

    fn target(&self) -> DVector<f64> {
        self.inner.target()
    }

    fn weight(&self) -> DMatrix<f64> {
        self.inner.weight()
    }

    fn gain(&self) -> f64 {
        self.inner.gain()
    }

    fn set_gain(&mut self, gain: f64) {
        self.inner.set_gain(gain);
    }

    fn constraints(&self) -> Vec<ConstraintHandle> {
        let mut all = self.inner.constraints();
        union_into(&mut all, self.constraints.iter().cloned());
        all
    }

    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        self.inner.write().update(configuration)
    }

    fn supports_reference(&self) -> bool {
        self.inner.read().supports_reference()
    }

    fn set_reference(&mut self, pose: &Pose, velocity: &Twist) -> Result<(), TaskError> {
        self.inner.write().set_reference(pose, velocity)
    }

    fn members(&self) -> Vec<TaskHandle> {
        vec![self.inner.clone()]
    }

    fn rows(&self) -> usize {
        self.inner.read().rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::bounds::VelocityLimits;
    use crate::domain::models::postural::Postural;

    fn weighted() -> TaskHandle {
        let weight = DMatrix::from_diagonal(&DVector::from_vec(vec![5.0, 0.1]));
        TaskHandle::new(
            Postural::new(DVector::from_element(2, 1.0))
                .with_weight(weight)
                .expect("weight"),
        )
    }

    #[test]
    fn test_relation_passes_through() {
        let inner = weighted();
        let limits = ConstraintHandle::new(VelocityLimits::uniform(1.0, 2));
        let task = Constrained::new(inner.clone(), limits.clone()).expect("constrained");

        assert_eq!(task.weight(), inner.weight());
        assert_eq!(task.coefficients(), inner.coefficients());
        assert_eq!(task.target(), inner.target());
        assert_eq!(task.constraints(), vec![limits]);
        assert_eq!(task.members(), vec![inner]);
    }

    #[test]
    fn test_gain_reaches_inner_task() {
        let inner = weighted();
        let mut task = Constrained::new(inner.clone(), ConstraintHandle::new(VelocityLimits::uniform(1.0, 2)))
            .expect("constrained");

        task.set_gain(0.25);

        assert!((inner.gain() - 0.25).abs() < f64::EPSILON);
        assert_eq!(task.target(), inner.target());
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = Constrained::new(weighted(), ConstraintHandle::new(VelocityLimits::uniform(1.0, 3)));
        assert!(matches!(result, Err(StackError::ShapeMismatch { expected: 2, found: 3, .. })));
    }
}
