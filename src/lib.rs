//! wbstack - whole-body stack of tasks composition and preview
//!
//! Builds prioritized stacks of robot control tasks and simulates them
//! forward in time before they run on hardware, logging every instant at
//! which the stack could not be solved.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): tasks, constraints, stacks, results and the
//!   collaborator ports (robot model, solver, trajectory source)
//! - **Service Layer** (`services`): stack composition and the previewer
//! - **Adapters** (`adapters`): reference implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use std::sync::Arc;
//! use wbstack::adapters::{HierarchicalLeastSquares, SerialChain};
//! use wbstack::domain::ports::RobotModel;
//! use wbstack::services::{Previewer, StackBuilder};
//! use wbstack::{Postural, TaskHandle};
//!
//! let arm = Arc::new(SerialChain::right_arm());
//! let rest = DVector::zeros(arm.joint_count());
//! let stack = StackBuilder::new(TaskHandle::new(Postural::new(rest))).build()?;
//!
//! let mut previewer = Previewer::new(0.01, arm, stack, Vec::new(), HierarchicalLeastSquares::default());
//! let results = previewer.check(0.1, 0.01)?;
//! assert_eq!(results.trajectory.len(), 10);
//! assert!(results.is_clean());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::error::{
    ModelError, PreviewError, PreviewResult, SolveFailure, StackError, StackResult, TaskError,
};
pub use domain::models::{
    Aggregated, Cartesian, Config, ConstraintHandle, ConstraintKind, FailureReason, JointLimits,
    LinearConstraint, Pose, Postural, PreviewResults, Stack, Task, TaskHandle, TrajectoryBinding,
    Twist, VelocityLimits,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{PreviewState, Previewer, StackBuilder};
