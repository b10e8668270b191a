//! Port trait definitions (Hexagonal Architecture)
//!
//! Contracts for the collaborators the core consumes without owning:
//! - RobotModel: kinematics, configuration snapshot and integration
//! - Solver: the per-step numerical solve
//! - TrajectorySource: reference trajectory generators

pub mod robot_model;
pub mod solver;
pub mod trajectory_source;

pub use robot_model::RobotModel;
pub use solver::Solver;
pub use trajectory_source::TrajectorySource;
