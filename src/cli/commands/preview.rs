//! Implementation of the `wbstack preview` command.
//!
//! Builds the demo stack on the 7-DoF right arm:
//! `((hand ⊕ (elbow ⊗ shoulder workspace)) ⊘ posture)` bounded by joint and
//! velocity limits, with the hand following a minimum-jerk reach and the
//! elbow holding its pose.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use nalgebra::{DMatrix, DVector, Vector3};
use serde::Serialize;
use tracing::info;

use crate::adapters::{ConstantTrajectory, HierarchicalLeastSquares, MinimumJerkTrajectory, SerialChain};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{
    Cartesian, Config, ConstraintHandle, FailureReason, JointLimits, LinearConstraint,
    Postural, PreviewResults, Stack, TaskHandle, TrajectoryBinding, VelocityLimits,
};
use crate::domain::ports::RobotModel;
use crate::services::{append_level, attach_constraint, combine, PreviewState, Previewer, StackBuilder};

/// Joint speed limit of the demo arm, rad/s.
const JOINT_SPEED_LIMIT: f64 = 2.0;
/// Hand displacement of the demo reach, meters.
const REACH: [f64; 3] = [0.0, 0.05, 0.08];

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Simulated duration in seconds (defaults to previewer.default_duration)
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Simulation step in seconds (defaults to previewer.control_period)
    #[arg(short, long)]
    pub step: Option<f64>,

    /// Trajectory rows shown in human output
    #[arg(long, default_value = "12")]
    pub rows: usize,
}

#[derive(Debug, Serialize)]
pub struct PreviewOutput {
    pub state: PreviewState,
    pub duration: f64,
    pub step: f64,
    /// Error that stopped the run early, if any
    pub error: Option<String>,
    pub failure_counts: BTreeMap<FailureReason, usize>,
    pub results: PreviewResults,
    #[serde(skip)]
    rows: usize,
}

impl CommandOutput for PreviewOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut lines = vec![format!(
            "Preview {}: {} steps of {:.4}s over {:.3}s, {} failed",
            self.state,
            self.results.trajectory.len(),
            self.step,
            self.duration,
            self.results.failures.len()
        )];
        if let Some(error) = &self.error {
            lines.push(format!("Stopped early: {error}"));
        }
        if !self.results.is_clean() {
            lines.push("\nFailures by reason:".to_string());
            lines.push(formatter.format_failure_counts(&self.failure_counts));
            lines.push("\nFailed instants:".to_string());
            lines.push(formatter.format_failures(&self.results.failures));
        }
        if !self.results.trajectory.is_empty() {
            lines.push("\nTrajectory:".to_string());
            lines.push(formatter.format_trajectory(&self.results.trajectory, self.rows));
        }
        lines.join("\n")
    }
}

/// Demo stack and its trajectory bindings on `arm`.
pub fn demo_scenario(
    arm: Arc<SerialChain>,
    control_period: f64,
    duration: f64,
) -> Result<(Stack, Vec<TrajectoryBinding>)> {
    let model: Arc<dyn RobotModel> = arm.clone();
    let q = arm.current_configuration();
    let joints = arm.joint_count();

    let hand = TaskHandle::new(Cartesian::new("hand", model.clone(), SerialChain::END_EFFECTOR, &q)?);
    let elbow = TaskHandle::new(Cartesian::new("elbow", model, SerialChain::ELBOW, &q)?);
    let posture = TaskHandle::new(Postural::at(q.clone(), q.clone()));

    // Combined shoulder flexion and abduction speed stays within the joint limit.
    let mut selector = DMatrix::zeros(1, joints);
    selector[(0, 0)] = 1.0;
    selector[(0, 1)] = 1.0;
    let workspace = ConstraintHandle::new(LinearConstraint::inequality(
        "shoulder_workspace",
        selector,
        DVector::from_element(1, -JOINT_SPEED_LIMIT),
        DVector::from_element(1, JOINT_SPEED_LIMIT),
    )?);

    let (lower, upper) = arm.joint_limits();
    let joint_limits = ConstraintHandle::new(JointLimits::new(lower, upper, &q, control_period)?.with_gain(0.5));
    let velocity_limits = ConstraintHandle::new(VelocityLimits::uniform(JOINT_SPEED_LIMIT, joints));

    let upper_level = combine(&hand, &attach_constraint(&elbow, workspace)?)?;
    let stack = StackBuilder::new(append_level(upper_level, &posture)?)
        .bounded_by(joint_limits)?
        .bounded_by(velocity_limits)?
        .build()?;

    let start = arm.frame_pose(SerialChain::END_EFFECTOR, &q)?;
    let mut goal = start;
    goal.translation.vector += Vector3::from(REACH);
    let elbow_pose = arm.frame_pose(SerialChain::ELBOW, &q)?;

    let bindings = vec![
        TrajectoryBinding::new(Arc::new(MinimumJerkTrajectory::new(start, goal, duration)), hand),
        TrajectoryBinding::new(Arc::new(ConstantTrajectory::new(elbow_pose, duration)), elbow),
    ];
    Ok((stack, bindings))
}

pub fn execute(args: PreviewArgs, config: &Config, json_mode: bool) -> Result<()> {
    let duration = args.duration.unwrap_or(config.previewer.default_duration);
    let step = args.step.unwrap_or(config.previewer.control_period);

    let arm = Arc::new(SerialChain::right_arm());
    let (stack, bindings) =
        demo_scenario(arm.clone(), step, duration).context("Failed to build demo stack")?;
    info!(levels = stack.len(), bounds = stack.bounds().len(), "demo stack built");

    let mut previewer = Previewer::from_config(
        &config.previewer,
        arm,
        stack,
        bindings,
        HierarchicalLeastSquares::new(config.solver.clone()),
    );

    let (results, error) = match previewer.check(duration, step) {
        Ok(results) => (results, None),
        Err(err) if err.partial_results().is_none() => {
            return Err(err).context("Preview rejected");
        }
        Err(err) => {
            let message = err.to_string();
            let partial = err.into_partial_results().unwrap_or_else(|| PreviewResults::new(step));
            (partial, Some(message))
        }
    };

    let output_data = PreviewOutput {
        state: previewer.state(),
        duration,
        step,
        error,
        failure_counts: results.failure_count_by_reason(),
        results,
        rows: args.rows,
    };
    output(&output_data, json_mode);
    Ok(())
}

