//! Trajectory sources for Cartesian tasks.
//!
//! Sampling past `duration` holds the final pose at rest.

use nalgebra::{Translation3, UnitQuaternion, Vector3};

use crate::domain::models::trajectory::{Pose, Twist};
use crate::domain::ports::TrajectorySource;

/// Holds one pose for a fixed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantTrajectory {
    pose: Pose,
    duration: f64,
}

impl ConstantTrajectory {
    pub const fn new(pose: Pose, duration: f64) -> Self {
        Self { pose, duration }
    }
}

impl TrajectorySource for ConstantTrajectory {
    fn pose_at(&self, _t: f64) -> Pose {
        self.pose
    }

    fn velocity_at(&self, _t: f64) -> Twist {
        Twist::zero()
    }

    fn duration(&self) -> f64 {
        self.duration
    }
}

/// Rest-to-rest motion between two poses.
///
/// Progress follows the quintic time law `s = 10τ³ − 15τ⁴ + 6τ⁵` with
/// `τ = t / duration`, which starts and ends with zero velocity and
/// acceleration. Translation is interpolated linearly in `s`, rotation
/// about the fixed axis taking `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumJerkTrajectory {
    start: Pose,
    end: Pose,
    duration: f64,
    displacement: Vector3<f64>,
    rotation: Vector3<f64>,
}

impl MinimumJerkTrajectory {
    /// A non-positive `duration` jumps straight to `end`.
    pub fn new(start: Pose, end: Pose, duration: f64) -> Self {
        let displacement = end.translation.vector - start.translation.vector;
        let rotation = (end.rotation * start.rotation.inverse()).scaled_axis();
        Self {
            start,
            end,
            duration,
            displacement,
            rotation,
        }
    }

    /// Normalized time in `[0, 1]`.
    fn progress(&self, t: f64) -> f64 {
        if self.duration > 0.0 {
            (t / self.duration).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Fraction of the motion completed at `t`.
    pub fn phase(&self, t: f64) -> f64 {
        let tau = self.progress(t);
        tau.powi(3) * (10.0 - 15.0 * tau + 6.0 * tau * tau)
    }

    /// Time derivative of [`Self::phase`].
    fn phase_rate(&self, t: f64) -> f64 {
        if self.duration <= 0.0 || t <= 0.0 || t >= self.duration {
            return 0.0;
        }
        let tau = self.progress(t);
        30.0 * tau * tau * (1.0 - tau) * (1.0 - tau) / self.duration
    }
}

impl TrajectorySource for MinimumJerkTrajectory {
    fn pose_at(&self, t: f64) -> Pose {
        if self.progress(t) >= 1.0 {
            return self.end;
        }
        let s = self.phase(t);
        let translation = Translation3::from(self.start.translation.vector + self.displacement * s);
        let rotation = UnitQuaternion::from_scaled_axis(self.rotation * s) * self.start.rotation;
        Pose::from_parts(translation, rotation)
    }

    fn velocity_at(&self, t: f64) -> Twist {
        let rate = self.phase_rate(t);
        Twist::new(self.displacement * rate, self.rotation * rate)
    }

    fn duration(&self) -> f64 {
        self.duration
    }
}
