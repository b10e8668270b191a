//! Trajectory samples and bindings.

use std::fmt;
use std::sync::Arc;

use nalgebra::{Isometry3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use super::task::TaskHandle;
use crate::domain::ports::TrajectorySource;

/// Rigid pose of a frame in the world.
pub type Pose = Isometry3<f64>;

/// Spatial velocity: linear part first, angular part second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Twist {
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Flatten to `[linear; angular]`.
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.linear.x,
            self.linear.y,
            self.linear.z,
            self.angular.x,
            self.angular.y,
            self.angular.z,
        )
    }
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

/// Associates a reference trajectory with the task whose target it drives.
///
/// The binding shares the task with the stack; writing a reference through
/// the binding is what the stack sees on the next evaluation.
#[derive(Clone)]
pub struct TrajectoryBinding {
    source: Arc<dyn TrajectorySource>,
    task: TaskHandle,
}

impl TrajectoryBinding {
    pub fn new(source: Arc<dyn TrajectorySource>, task: TaskHandle) -> Self {
        Self { source, task }
    }

    pub fn source(&self) -> &dyn TrajectorySource {
        self.source.as_ref()
    }

    pub const fn task(&self) -> &TaskHandle {
        &self.task
    }
}

impl fmt::Debug for TrajectoryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrajectoryBinding")
            .field("task", &self.task)
            .field("duration", &self.source.duration())
            .finish()
    }
}
