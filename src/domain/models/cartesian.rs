//! Cartesian task: drive a frame of the robot towards a reference pose.
//!
//! `A = J(q)` (6 x n, linear rows first) and
//! `b = v_ref + gain * e(pose_ref, pose(q))`, where `e` stacks the position
//! error and the rotation error expressed as a scaled axis in the world.

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Vector6};

use super::constraint::ConstraintHandle;
use super::task::{check_weight, Task};
use super::trajectory::{Pose, Twist};
use crate::domain::error::{StackResult, TaskError};
use crate::domain::ports::RobotModel;

pub struct Cartesian {
    name: String,
    frame: String,
    model: Arc<dyn RobotModel>,
    jacobian: DMatrix<f64>,
    actual: Pose,
    reference: Pose,
    velocity_reference: Twist,
    gain: f64,
    weight: DMatrix<f64>,
}

impl Cartesian {
    /// Cartesian task on `frame`, linearized at `configuration` and holding
    /// the frame's current pose as reference.
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn RobotModel>,
        frame: impl Into<String>,
        configuration: &DVector<f64>,
    ) -> Result<Self, TaskError> {
        let frame = frame.into();
        let actual = model.frame_pose(&frame, configuration)?;
        let jacobian = model.jacobian(&frame, configuration)?;

        Ok(Self {
            name: name.into(),
            frame,
            model,
            jacobian,
            actual,
            reference: actual,
            velocity_reference: Twist::zero(),
            gain: 1.0,
            weight: DMatrix::identity(6, 6),
        })
    }

    pub fn with_weight(mut self, weight: DMatrix<f64>) -> StackResult<Self> {
        check_weight(&self.name, &weight, 6)?;
        self.weight = weight;
        Ok(self)
    }

    pub fn frame(&self) -> &str {
        &self.frame
    }

    pub const fn actual_pose(&self) -> &Pose {
        &self.actual
    }

    pub const fn reference_pose(&self) -> &Pose {
        &self.reference
    }

    /// `[position error; rotation error]` between reference and actual pose.
    pub fn pose_error(&self) -> Vector6<f64> {
        let position = self.reference.translation.vector - self.actual.translation.vector;
        let rotation = (self.reference.rotation * self.actual.rotation.inverse()).scaled_axis();
        Vector6::new(
            position.x, position.y, position.z, rotation.x, rotation.y, rotation.z,
        )
    }
}

impl fmt::Debug for Cartesian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cartesian")
            .field("name", &self.name)
            .field("frame", &self.frame)
            .field("reference", &self.reference)
            .field("gain", &self.gain)
            .finish_non_exhaustive()
    }
}

impl Task for Cartesian {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_size(&self) -> usize {
        self.model.joint_count()
    }

    fn coefficients(&self) -> DMatrix<f64> {
        self.jacobian.clone()
    }

    fn target(&self) -> DVector<f64> {
        let b = self.velocity_reference.to_vector() + self.pose_error() * self.gain;
        DVector::from_column_slice(b.as_slice())
    }

    fn weight(&self) -> DMatrix<f64> {
        self.weight.clone()
    }

    fn gain(&self) -> f64 {
        self.gain
    }

    fn set_gain(&mut self, gain: f64) {
        self.gain = gain;
    }

    fn constraints(&self) -> Vec<ConstraintHandle> {
        Vec::new()
    }

    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        self.actual = self.model.frame_pose(&self.frame, configuration)?;
        self.jacobian = self.model.jacobian(&self.frame, configuration)?;
        Ok(())
    }

    fn supports_reference(&self) -> bool {
        true
    }

    fn set_reference(&mut self, pose: &Pose, velocity: &Twist) -> Result<(), TaskError> {
        self.reference = *pose;
        self.velocity_reference = *velocity;
        Ok(())
    }
}
