//! Stack builder service.
//!
//! Three composition operators turn tasks and constraints into a [`Stack`]:
//! - [`combine`]: two tasks at the same priority become one aggregate
//! - [`attach_constraint`]: a task gains a constraint
//! - [`append_level`]: a fragment becomes the next lower priority level
//!
//! [`bound`] adds a stack-wide constraint. All operators build new values
//! and never mutate their operands. Handles passed in are shared, not
//! copied: reusing a task handle in two places aliases the same task.

use tracing::debug;

use crate::domain::error::{StackError, StackResult};
use crate::domain::models::aggregated::Aggregated;
use crate::domain::models::constrained::Constrained;
use crate::domain::models::constraint::{union_into, ConstraintHandle};
use crate::domain::models::stack::{check_constraint, Stack};
use crate::domain::models::task::{Task, TaskHandle};

/// Either operand of [`append_level`]: a single task or a partial stack.
#[derive(Debug, Clone)]
pub enum StackFragment {
    Task(TaskHandle),
    Stack(Stack),
}

impl StackFragment {
    fn into_stack(self) -> Stack {
        match self {
            Self::Task(task) => Stack::single(task),
            Self::Stack(stack) => stack,
        }
    }
}

impl From<TaskHandle> for StackFragment {
    fn from(task: TaskHandle) -> Self {
        Self::Task(task)
    }
}

impl From<&TaskHandle> for StackFragment {
    fn from(task: &TaskHandle) -> Self {
        Self::Task(task.clone())
    }
}

impl From<Stack> for StackFragment {
    fn from(stack: Stack) -> Self {
        Self::Stack(stack)
    }
}

/// Join two tasks at the same priority.
///
/// The result stacks `lhs` rows on top of `rhs` rows.
pub fn combine(lhs: &TaskHandle, rhs: &TaskHandle) -> StackResult<TaskHandle> {
    let aggregated = Aggregated::new(vec![lhs.clone(), rhs.clone()], lhs.x_size())?;
    debug!(task = aggregated.name(), "combined tasks");
    Ok(TaskHandle::new(aggregated))
}

/// Task with the same relation as `task` and one more constraint.
///
/// `task` itself is left untouched. The result shares its relation, weight,
/// gain and reference capability, and bindings to `task` still reach it
/// through the returned handle.
pub fn attach_constraint(task: &TaskHandle, constraint: ConstraintHandle) -> StackResult<TaskHandle> {
    let constrained = Constrained::new(task.clone(), constraint)?;
    debug!(task = constrained.name(), "attached constraint");
    Ok(TaskHandle::new(constrained))
}

/// Stack with the levels of `upper` followed by the levels of `lower`.
///
/// Bounds of both operands are kept.
pub fn append_level(
    upper: impl Into<StackFragment>,
    lower: impl Into<StackFragment>,
) -> StackResult<Stack> {
    let (mut levels, mut bounds) = upper.into().into_stack().into_parts();
    let (lower_levels, lower_bounds) = lower.into().into_stack().into_parts();

    if let (Some(expected), Some(first)) = (levels.first(), lower_levels.first()) {
        let (expected, found) = (expected.x_size(), first.x_size());
        if expected != found {
            return Err(StackError::ShapeMismatch {
                context: format!("appending level '{}'", first.name()),
                expected,
                found,
            });
        }
    }

    levels.extend(lower_levels);
    union_into(&mut bounds, lower_bounds);
    Ok(Stack::from_parts(levels, bounds))
}

/// Add a constraint that holds at every level of the stack.
pub fn bound(fragment: impl Into<StackFragment>, constraint: ConstraintHandle) -> StackResult<Stack> {
    let stack = fragment.into().into_stack();
    if let Some(x_size) = stack.x_size() {
        check_constraint(&constraint, x_size)?;
    }
    let (levels, mut bounds) = stack.into_parts();
    union_into(&mut bounds, [constraint]);
    Ok(Stack::from_parts(levels, bounds))
}

/// Fluent front-end over the composition operators.
///
/// ```
/// # use nalgebra::DVector;
/// # use wbstack::domain::models::{ConstraintHandle, Postural, TaskHandle, VelocityLimits};
/// # use wbstack::services::StackBuilder;
/// let arm = TaskHandle::new(Postural::new(DVector::zeros(3)));
/// let legs = TaskHandle::new(Postural::new(DVector::zeros(3)));
/// let stack = StackBuilder::new(&arm)
///     .then(&legs)?
///     .bounded_by(ConstraintHandle::new(VelocityLimits::uniform(1.0, 3)))?
///     .build()?;
/// assert_eq!(stack.len(), 2);
/// # Ok::<(), wbstack::domain::StackError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StackBuilder {
    stack: Stack,
}

impl StackBuilder {
    /// Start from the highest priority fragment.
    pub fn new(top: impl Into<StackFragment>) -> Self {
        Self {
            stack: top.into().into_stack(),
        }
    }

    /// Append the next lower priority level.
    pub fn then(self, lower: impl Into<StackFragment>) -> StackResult<Self> {
        Ok(Self {
            stack: append_level(self.stack, lower)?,
        })
    }

    /// Add a stack-wide constraint.
    pub fn bounded_by(self, constraint: ConstraintHandle) -> StackResult<Self> {
        Ok(Self {
            stack: bound(self.stack, constraint)?,
        })
    }

    /// Finish and validate the stack.
    pub fn build(self) -> StackResult<Stack> {
        self.stack.validate()?;
        Ok(self.stack)
    }
}
