//! Stack of tasks.
//!
//! Priority levels in order (index 0 is the highest priority) plus bounds
//! that hold at every level. Stacks are assembled with the operators in
//! [`crate::services::stack_builder`].

use nalgebra::DVector;
use tracing::trace;

use super::constraint::{union_into, ConstraintHandle};
use super::task::TaskHandle;
use crate::domain::error::{StackError, StackResult, TaskError};

#[derive(Debug, Clone, Default)]
pub struct Stack {
    levels: Vec<TaskHandle>,
    bounds: Vec<ConstraintHandle>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-level stack.
    pub fn single(task: TaskHandle) -> Self {
        Self {
            levels: vec![task],
            bounds: Vec::new(),
        }
    }

    pub(crate) const fn from_parts(levels: Vec<TaskHandle>, bounds: Vec<ConstraintHandle>) -> Self {
        Self { levels, bounds }
    }

    pub(crate) fn into_parts(self) -> (Vec<TaskHandle>, Vec<ConstraintHandle>) {
        (self.levels, self.bounds)
    }

    pub fn levels(&self) -> &[TaskHandle] {
        &self.levels
    }

    /// Stack-wide constraints.
    pub fn bounds(&self) -> &[ConstraintHandle] {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Command dimension, taken from the highest priority level.
    pub fn x_size(&self) -> Option<usize> {
        self.levels.first().map(TaskHandle::x_size)
    }

    /// Whether `task` sits at some level or nested inside one.
    pub fn contains(&self, task: &TaskHandle) -> bool {
        self.levels.iter().any(|level| level.contains(task))
    }

    /// Every constraint that applies to the solve: the levels' own
    /// constraints followed by the stack-wide bounds, without duplicates.
    pub fn all_constraints(&self) -> Vec<ConstraintHandle> {
        let mut all = Vec::new();
        for level in &self.levels {
            union_into(&mut all, level.constraints());
        }
        union_into(&mut all, self.bounds.iter().cloned());
        all
    }

    /// Re-linearize every level and constraint around `configuration`.
    pub fn update(&self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        for level in &self.levels {
            level.write().update(configuration)?;
        }
        for constraint in self.all_constraints() {
            constraint.update(configuration)?;
        }
        trace!(levels = self.levels.len(), "stack updated");
        Ok(())
    }

    /// Check that the stack is solvable in shape: non-empty, every level
    /// non-degenerate and every task and constraint on one command
    /// dimension.
    pub fn validate(&self) -> StackResult<()> {
        let x_size = self.x_size().ok_or(StackError::EmptyStack)?;

        for (index, level) in self.levels.iter().enumerate() {
            let found = level.x_size();
            if found != x_size {
                return Err(StackError::ShapeMismatch {
                    context: format!("priority level {index} ('{}')", level.name()),
                    expected: x_size,
                    found,
                });
            }
            level.validate_shape()?;
            if level.read().rows() == 0 {
                return Err(StackError::DegenerateLevel {
                    level: index,
                    task: level.name(),
                });
            }
        }

        for constraint in self.all_constraints() {
            check_constraint(&constraint, x_size)?;
        }
        Ok(())
    }
}

pub(crate) fn check_constraint(constraint: &ConstraintHandle, x_size: usize) -> StackResult<()> {
    let found = constraint.x_size();
    if found == x_size {
        Ok(())
    } else {
        Err(StackError::ShapeMismatch {
            context: format!("constraint '{}'", constraint.name()),
            expected: x_size,
            found,
        })
    }
}
