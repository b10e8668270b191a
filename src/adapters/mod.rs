//! Reference implementations of the domain ports.
//!
//! - `serial_chain`: revolute-chain [`RobotModel`](crate::domain::ports::RobotModel)
//! - `hierarchical_ls`: prioritized least-squares [`Solver`](crate::domain::ports::Solver)
//! - `trajectories`: constant and minimum-jerk
//!   [`TrajectorySource`](crate::domain::ports::TrajectorySource)s

pub mod hierarchical_ls;
pub mod serial_chain;
pub mod trajectories;

pub use hierarchical_ls::HierarchicalLeastSquares;
pub use serial_chain::{RevoluteJoint, SerialChain};
pub use trajectories::{ConstantTrajectory, MinimumJerkTrajectory};
