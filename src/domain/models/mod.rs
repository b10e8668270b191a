pub mod aggregated;
pub mod bounds;
pub mod cartesian;
pub mod config;
pub mod constrained;
pub mod constraint;
pub mod postural;
pub mod results;
pub mod stack;
pub mod task;
pub mod trajectory;

pub use aggregated::Aggregated;
pub use bounds::{JointLimits, VelocityLimits};
pub use cartesian::Cartesian;
pub use constrained::Constrained;
pub use config::{Config, LoggingConfig, PreviewerConfig, SolverConfig};
pub use constraint::{Constraint, ConstraintHandle, ConstraintKind, LinearConstraint, Relation};
pub use postural::Postural;
pub use results::{Failure, FailureReason, PreviewResults, TrajectoryNode};
pub use stack::Stack;
pub use task::{Task, TaskHandle};
pub use trajectory::{Pose, Twist, TrajectoryBinding};
