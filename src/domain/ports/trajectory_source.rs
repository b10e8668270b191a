use crate::domain::models::trajectory::{Pose, Twist};

/// Port for reference trajectory generators.
pub trait TrajectorySource: Send + Sync {
    /// Reference pose at time `t` (seconds from the trajectory start).
    fn pose_at(&self, t: f64) -> Pose;

    /// Reference spatial velocity at time `t`.
    fn velocity_at(&self, t: f64) -> Twist;

    /// Total duration in seconds.
    fn duration(&self) -> f64;
}
