use nalgebra::DVector;

use crate::domain::error::SolveFailure;
use crate::domain::models::stack::Stack;

/// Port for the numerical solve step.
///
/// Turns an evaluated stack into a command for one control period. The
/// stack has already been updated against `configuration` when this is
/// called.
pub trait Solver: Send {
    fn solve(
        &mut self,
        stack: &Stack,
        configuration: &DVector<f64>,
    ) -> Result<DVector<f64>, SolveFailure>;
}
