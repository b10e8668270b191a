//! Task domain model.
//!
//! A task is a control objective linear in the command `x`:
//! `coefficients * x ≈ target`, weighted by `weight` and scaled by `gain`.
//! Tasks are shared between a stack and the trajectory bindings that drive
//! them, so they live behind a [`TaskHandle`].

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nalgebra::{DMatrix, DVector};
use uuid::Uuid;

use super::constraint::ConstraintHandle;
use super::trajectory::{Pose, Twist};
use crate::domain::error::{StackError, StackResult, TaskError};

/// Capability set shared by every kind of task.
///
/// `coefficients` and `target` must reflect the state at the time of the
/// call. Composite tasks recompute them from their members on every call.
pub trait Task: Send + Sync + fmt::Debug {
    /// Human-readable name, used in logs and errors.
    fn name(&self) -> &str;

    /// Command dimension (columns of the relation).
    fn x_size(&self) -> usize;

    /// Current coefficient matrix, `rows x x_size`.
    fn coefficients(&self) -> DMatrix<f64>;

    /// Current target vector, one entry per coefficient row.
    fn target(&self) -> DVector<f64>;

    /// Square weight over the task rows.
    fn weight(&self) -> DMatrix<f64>;

    fn gain(&self) -> f64;

    fn set_gain(&mut self, gain: f64);

    /// Constraints owned by this task (possibly empty).
    fn constraints(&self) -> Vec<ConstraintHandle>;

    /// Re-linearize the task around `configuration`.
    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError>;

    /// Whether [`Task::set_reference`] is implemented.
    fn supports_reference(&self) -> bool {
        false
    }

    /// Drive the task target from a trajectory sample.
    fn set_reference(&mut self, _pose: &Pose, _velocity: &Twist) -> Result<(), TaskError> {
        Err(TaskError::ReferenceUnsupported(self.name().to_string()))
    }

    /// Nested tasks, for composites. Leaves have none.
    fn members(&self) -> Vec<TaskHandle> {
        Vec::new()
    }

    /// Number of rows in the relation.
    fn rows(&self) -> usize {
        self.coefficients().nrows()
    }
}

/// Shared, identity-carrying reference to a task.
///
/// Cloning a handle aliases the same task: a mutation through one clone
/// (e.g. a trajectory binding writing a reference) is visible through every
/// other clone (e.g. the stack level holding it). Sharing one handle between
/// two concurrently running previews is the caller's responsibility.
#[derive(Clone)]
pub struct TaskHandle {
    id: Uuid,
    inner: Arc<RwLock<dyn Task>>,
}

impl TaskHandle {
    /// Wrap a task in a new shared handle with a fresh identity.
    pub fn new<T: Task + 'static>(task: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(RwLock::new(task)),
        }
    }

    /// Stable identity of the wrapped task.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, dyn Task + 'static> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Task + 'static> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> String {
        self.read().name().to_string()
    }

    pub fn x_size(&self) -> usize {
        self.read().x_size()
    }

    pub fn coefficients(&self) -> DMatrix<f64> {
        self.read().coefficients()
    }

    pub fn target(&self) -> DVector<f64> {
        self.read().target()
    }

    pub fn weight(&self) -> DMatrix<f64> {
        self.read().weight()
    }

    pub fn gain(&self) -> f64 {
        self.read().gain()
    }

    pub fn set_gain(&self, gain: f64) {
        self.write().set_gain(gain);
    }

    pub fn constraints(&self) -> Vec<ConstraintHandle> {
        self.read().constraints()
    }

    pub fn members(&self) -> Vec<Self> {
        self.read().members()
    }

    /// Whether `other` is this task or nested anywhere below it.
    pub fn contains(&self, other: &Self) -> bool {
        self.id == other.id || self.members().iter().any(|m| m.contains(other))
    }

    /// Check the relation shape invariants of the current state, members
    /// first.
    pub fn validate_shape(&self) -> StackResult<()> {
        for member in self.members() {
            member.validate_shape()?;
        }

        let task = self.read();
        let a = task.coefficients();
        let b = task.target();
        let w = task.weight();

        if a.ncols() != task.x_size() {
            return Err(StackError::ShapeMismatch {
                context: format!("task '{}'", task.name()),
                expected: task.x_size(),
                found: a.ncols(),
            });
        }
        if b.len() != a.nrows() {
            return Err(StackError::TargetMismatch {
                task: task.name().to_string(),
                expected: a.nrows(),
                found: b.len(),
            });
        }
        if w.nrows() != a.nrows() || w.ncols() != a.nrows() {
            return Err(StackError::InvalidWeight {
                task: task.name().to_string(),
                expected: a.nrows(),
                rows: w.nrows(),
                cols: w.ncols(),
            });
        }
        Ok(())
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// Check that an explicit weight is square and matches `rows`.
pub(crate) fn check_weight(task: &str, weight: &DMatrix<f64>, rows: usize) -> StackResult<()> {
    if weight.nrows() == rows && weight.ncols() == rows {
        Ok(())
    } else {
        Err(StackError::InvalidWeight {
            task: task.to_string(),
            expected: rows,
            rows: weight.nrows(),
            cols: weight.ncols(),
        })
    }
}
