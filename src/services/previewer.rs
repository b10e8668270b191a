//! Previewer - forward simulation of a stack before it runs on hardware
//!
//! Steps a stack through time at a fixed step:
//! - Samples every trajectory binding and writes the reference into tasks
//!   that follow one; other bound tasks are left as they are
//! - Re-linearizes the stack around the simulated configuration
//! - Solves, logging failed instants instead of stopping on them
//! - Integrates the command into the simulated configuration
//!
//! Failed solves are data in the results. Only setup errors and model
//! failures stop a run; a stopped run hands back what it logged so far.
//!
//! The loop is strictly sequential: each step integrates from the previous
//! step's configuration. Previewers holding distinct stacks can run on
//! separate threads; previewers sharing task handles alias those tasks.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::error::{PreviewError, PreviewResult, SolveFailure, StackError, TaskError};
use crate::domain::models::config::PreviewerConfig;
use crate::domain::models::results::{FailureReason, PreviewResults};
use crate::domain::models::stack::Stack;
use crate::domain::models::trajectory::{TrajectoryBinding, Twist};
use crate::domain::ports::{RobotModel, Solver};

/// Lifecycle of a previewer across `check` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewState {
    /// No run attempted yet
    Idle,
    /// A run is in progress
    Running,
    /// The last run reached its duration
    Completed,
    /// The last run stopped on a setup error, model failure or cancellation
    Aborted,
}

impl PreviewState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PreviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of steps a run of `duration` takes at `step`.
pub fn step_count(duration: f64, step: f64) -> usize {
    (duration / step).ceil() as usize
}

/// Forward simulator for one stack, model and set of bindings.
///
/// Created once and reused: every [`Previewer::check`] starts from the
/// model's current configuration and returns fresh results.
pub struct Previewer<S: Solver> {
    control_period: f64,
    model: Arc<dyn RobotModel>,
    stack: Stack,
    bindings: Vec<TrajectoryBinding>,
    solver: S,
    state: PreviewState,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: Solver> Previewer<S> {
    pub fn new(
        control_period: f64,
        model: Arc<dyn RobotModel>,
        stack: Stack,
        bindings: Vec<TrajectoryBinding>,
        solver: S,
    ) -> Self {
        Self {
            control_period,
            model,
            stack,
            bindings,
            solver,
            state: PreviewState::Idle,
            cancel: None,
        }
    }

    pub fn from_config(
        config: &PreviewerConfig,
        model: Arc<dyn RobotModel>,
        stack: Stack,
        bindings: Vec<TrajectoryBinding>,
        solver: S,
    ) -> Self {
        Self::new(config.control_period, model, stack, bindings, solver)
    }

    /// Stop runs cooperatively when `flag` is raised; checked between steps.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub const fn state(&self) -> PreviewState {
        self.state
    }

    pub const fn control_period(&self) -> f64 {
        self.control_period
    }

    pub const fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn bindings(&self) -> &[TrajectoryBinding] {
        &self.bindings
    }

    /// [`Previewer::check`] at the control period.
    pub fn run(&mut self, duration: f64) -> PreviewResult<PreviewResults> {
        self.check(duration, self.control_period)
    }

    /// Simulate `duration` seconds at `step` seconds per step.
    ///
    /// Produces `ceil(duration / step)` trajectory nodes unless the run
    /// aborts.
    #[instrument(name = "preview", skip(self), fields(levels = self.stack.len(), bindings = self.bindings.len()))]
    pub fn check(&mut self, duration: f64, step: f64) -> PreviewResult<PreviewResults> {
        if let Err(err) = self.validate(duration, step) {
            warn!(error = %err, "preview rejected");
            self.state = PreviewState::Aborted;
            return Err(err);
        }

        // Queried once per run. Tasks that cannot follow a reference are
        // left unaffected by their binding.
        let durations: Vec<Option<f64>> = self
            .bindings
            .iter()
            .map(|b| {
                let follows = b.task().read().supports_reference();
                if !follows {
                    debug!(task = %b.task().name(), "binding ignored, task takes no reference");
                }
                follows.then(|| b.source().duration())
            })
            .collect();
        let steps = step_count(duration, step);
        let mut configuration = self.model.current_configuration();
        let mut results = PreviewResults::new(step);

        self.state = PreviewState::Running;
        info!(steps, step, duration, "preview started");

        for k in 0..steps {
            let t = k as f64 * step;

            if self.is_cancelled() {
                warn!(t, "preview cancelled");
                self.state = PreviewState::Aborted;
                results.finish();
                return Err(PreviewError::Cancelled {
                    time: t,
                    partial: Box::new(results),
                });
            }

            if let Err(source) = self.advance(t, step, &durations, &mut configuration, &mut results) {
                warn!(t, error = %source, "preview aborted");
                self.state = PreviewState::Aborted;
                results.finish();
                return Err(PreviewError::Aborted {
                    time: t,
                    source,
                    partial: Box::new(results),
                });
            }
        }

        results.finish();
        self.state = PreviewState::Completed;
        info!(
            steps = results.trajectory.len(),
            failures = results.failures.len(),
            "preview completed"
        );
        Ok(results)
    }

    fn validate(&self, duration: f64, step: f64) -> PreviewResult<()> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(PreviewError::InvalidDuration(duration));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(PreviewError::InvalidStep(step));
        }

        self.stack.validate()?;

        let joints = self.model.joint_count();
        if let Some(x_size) = self.stack.x_size() {
            if x_size != joints {
                return Err(StackError::ShapeMismatch {
                    context: "stack against robot model".to_string(),
                    expected: joints,
                    found: x_size,
                }
                .into());
            }
        }

        for (index, binding) in self.bindings.iter().enumerate() {
            let task = binding.task();
            if !self.stack.contains(task) {
                return Err(PreviewError::BindingMismatch {
                    index,
                    task: task.name(),
                });
            }
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// One simulated step starting at `t`.
    fn advance(
        &mut self,
        t: f64,
        step: f64,
        durations: &[Option<f64>],
        configuration: &mut DVector<f64>,
        results: &mut PreviewResults,
    ) -> Result<(), TaskError> {
        for (binding, duration) in self.bindings.iter().zip(durations) {
            let Some(duration) = *duration else {
                continue;
            };
            // Past its end a trajectory holds its final pose at rest.
            let (pose, velocity) = if t > duration {
                (binding.source().pose_at(duration), Twist::zero())
            } else {
                (binding.source().pose_at(t), binding.source().velocity_at(t))
            };
            binding.task().write().set_reference(&pose, &velocity)?;
        }

        self.stack.update(configuration)?;

        let command = match self.solve(configuration) {
            Ok(command) => command,
            Err(failure) => {
                warn!(t, reason = %FailureReason::from(&failure), error = %failure, "solve failed");
                results.record_failure(t, &failure);
                DVector::zeros(configuration.len())
            }
        };

        *configuration = self.model.integrate(configuration, &command, step)?;
        debug!(t, "step integrated");
        results.record_node(t, configuration.clone());
        Ok(())
    }

    fn solve(&mut self, configuration: &DVector<f64>) -> Result<DVector<f64>, SolveFailure> {
        let command = self.solver.solve(&self.stack, configuration)?;
        if command.len() != configuration.len() {
            return Err(SolveFailure::Other(format!(
                "command has {} entries, expected {}",
                command.len(),
                configuration.len()
            )));
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ModelError;
    use crate::domain::models::postural::Postural;
    use crate::domain::models::task::TaskHandle;
    use crate::domain::models::trajectory::Pose;
    use nalgebra::DMatrix;
    use std::sync::Mutex;

    /// Integrates `q + dq * dt`, failing once `fail_after` integrations ran.
    struct PointModel {
        joints: usize,
        fail_after: Option<usize>,
        calls: Mutex<usize>,
    }

    impl PointModel {
        fn new(joints: usize) -> Self {
            Self {
                joints,
                fail_after: None,
                calls: Mutex::new(0),
            }
        }
    }

    impl RobotModel for PointModel {
        fn joint_count(&self) -> usize {
            self.joints
        }

        fn current_configuration(&self) -> DVector<f64> {
            DVector::zeros(self.joints)
        }

        fn integrate(
            &self,
            configuration: &DVector<f64>,
            command: &DVector<f64>,
            step: f64,
        ) -> Result<DVector<f64>, ModelError> {
            let mut calls = self.calls.lock().expect("lock");
            *calls += 1;
            if self.fail_after.is_some_and(|limit| *calls > limit) {
                return Err(ModelError::NonFinite);
            }
            Ok(configuration + command * step)
        }

        fn joint_limits(&self) -> (DVector<f64>, DVector<f64>) {
            (
                DVector::from_element(self.joints, -10.0),
                DVector::from_element(self.joints, 10.0),
            )
        }

        fn frame_pose(&self, frame: &str, _q: &DVector<f64>) -> Result<Pose, ModelError> {
            Err(ModelError::UnknownFrame(frame.to_string()))
        }

        fn jacobian(&self, frame: &str, _q: &DVector<f64>) -> Result<DMatrix<f64>, ModelError> {
            Err(ModelError::UnknownFrame(frame.to_string()))
        }
    }

    /// Follows the top level's target; fails at the listed call indices.
    struct ScriptedSolver {
        failing_calls: Vec<usize>,
        calls: usize,
    }

    impl Solver for ScriptedSolver {
        fn solve(
            &mut self,
            stack: &Stack,
            _configuration: &DVector<f64>,
        ) -> Result<DVector<f64>, SolveFailure> {
            let call = self.calls;
            self.calls += 1;
            if self.failing_calls.contains(&call) {
                return Err(SolveFailure::Singular("scripted".to_string()));
            }
            Ok(stack.levels()[0].target())
        }
    }

    fn previewer(model: PointModel, failing_calls: Vec<usize>) -> Previewer<ScriptedSolver> {
        let joints = model.joints;
        let stack = Stack::single(TaskHandle::new(Postural::new(DVector::from_element(joints, 1.0))));
        Previewer::new(
            0.1,
            Arc::new(model),
            stack,
            Vec::new(),
            ScriptedSolver {
                failing_calls,
                calls: 0,
            },
        )
    }

    #[test]
    fn test_step_count() {
        assert_eq!(step_count(1.0, 0.1), 10);
        assert_eq!(step_count(1.0, 0.3), 4);
        assert_eq!(step_count(1.0, 3e-3), 334);
    }

    #[test]
    fn test_run_completes_with_expected_length() {
        let mut previewer = previewer(PointModel::new(2), Vec::new());
        assert_eq!(previewer.state(), PreviewState::Idle);

        let results = previewer.run(1.0).expect("run");

        assert_eq!(previewer.state(), PreviewState::Completed);
        assert_eq!(results.trajectory.len(), 10);
        assert!(results.is_clean());
        assert!(results.finished_at.is_some());
        // Node k is stamped k * step.
        assert!((results.trajectory[3].t - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_failed_step_integrates_zero_command() {
        let mut previewer = previewer(PointModel::new(1), vec![1]);

        let results = previewer.check(0.3, 0.1).expect("run");

        assert_eq!(results.trajectory.len(), 3);
        assert_eq!(results.failures.len(), 1);
        assert_eq!(results.failures[0].reason, FailureReason::SingularConfiguration);
        assert!((results.failures[0].t - 0.1).abs() < 1e-12);
        // Step 1 held the configuration of step 0.
        assert_eq!(results.trajectory[0].q, results.trajectory[1].q);
        assert_ne!(results.trajectory[1].q, results.trajectory[2].q);
    }

    #[test]
    fn test_model_failure_aborts_with_partial_results() {
        let mut model = PointModel::new(1);
        model.fail_after = Some(2);
        let mut previewer = previewer(model, Vec::new());

        let err = previewer.check(1.0, 0.1).expect_err("abort");

        assert_eq!(previewer.state(), PreviewState::Aborted);
        assert!(matches!(err, PreviewError::Aborted { .. }));
        assert_eq!(err.partial_results().map(|r| r.trajectory.len()), Some(2));
    }

    #[test]
    fn test_invalid_duration_and_step() {
        let mut previewer = previewer(PointModel::new(1), Vec::new());
        assert!(matches!(previewer.check(0.0, 0.1), Err(PreviewError::InvalidDuration(_))));
        assert!(matches!(previewer.check(f64::NAN, 0.1), Err(PreviewError::InvalidDuration(_))));
        assert!(matches!(previewer.check(1.0, -0.1), Err(PreviewError::InvalidStep(_))));
        assert_eq!(previewer.state(), PreviewState::Aborted);
    }

    #[test]
    fn test_empty_stack_rejected() {
        let mut previewer = Previewer::new(
            0.1,
            Arc::new(PointModel::new(1)),
            Stack::new(),
            Vec::new(),
            ScriptedSolver {
                failing_calls: Vec::new(),
                calls: 0,
            },
        );
        assert!(matches!(
            previewer.run(1.0),
            Err(PreviewError::Stack(StackError::EmptyStack))
        ));
    }

    #[test]
    fn test_stack_dimension_must_match_model() {
        let mut previewer = Previewer::new(
            0.1,
            Arc::new(PointModel::new(3)),
            Stack::single(TaskHandle::new(Postural::new(DVector::zeros(2)))),
            Vec::new(),
            ScriptedSolver {
                failing_calls: Vec::new(),
                calls: 0,
            },
        );
        assert!(matches!(
            previewer.run(1.0),
            Err(PreviewError::Stack(StackError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_cancel_flag_stops_between_steps() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut previewer = previewer(PointModel::new(1), Vec::new()).with_cancel_flag(flag);

        let err = previewer.run(1.0).expect_err("cancelled");

        assert!(matches!(err, PreviewError::Cancelled { .. }));
        assert_eq!(err.partial_results().map(PreviewResults::is_empty), Some(true));
        assert_eq!(previewer.state(), PreviewState::Aborted);
    }

    #[test]
    fn test_previewer_is_reusable() {
        let mut previewer = previewer(PointModel::new(2), Vec::new());
        let first = previewer.check(0.5, 0.1).expect("first");
        let second = previewer.check(0.5, 0.1).expect("second");
        assert_eq!(first.trajectory, second.trajectory);
    }
}
