//! Domain layer for the stack-of-tasks system
//!
//! This module contains the task composition model, the collaborator ports
//! and the error taxonomy.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::{
    ModelError, PreviewError, PreviewResult, SolveFailure, StackError, StackResult, TaskError,
};
