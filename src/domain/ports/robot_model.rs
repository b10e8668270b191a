use nalgebra::{DMatrix, DVector};

use crate::domain::error::ModelError;
use crate::domain::models::trajectory::Pose;

/// Port for the kinematic model of the robot.
///
/// The previewer only needs the current configuration and integration.
/// Tasks additionally query frame poses and Jacobians to re-linearize
/// around the simulated configuration.
pub trait RobotModel: Send + Sync {
    /// Number of joints (command dimension).
    fn joint_count(&self) -> usize;

    /// Snapshot of the configuration the preview starts from.
    fn current_configuration(&self) -> DVector<f64>;

    /// Advance `configuration` by applying `command` over `step` seconds.
    fn integrate(
        &self,
        configuration: &DVector<f64>,
        command: &DVector<f64>,
        step: f64,
    ) -> Result<DVector<f64>, ModelError>;

    /// Joint position limits as `(lower, upper)`.
    fn joint_limits(&self) -> (DVector<f64>, DVector<f64>);

    /// World pose of `frame` at `configuration`.
    fn frame_pose(&self, frame: &str, configuration: &DVector<f64>) -> Result<Pose, ModelError>;

    /// 6 x n geometric Jacobian of `frame` at `configuration`,
    /// linear rows first.
    fn jacobian(
        &self,
        frame: &str,
        configuration: &DVector<f64>,
    ) -> Result<DMatrix<f64>, ModelError>;
}
