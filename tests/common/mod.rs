//! Common test utilities for integration tests
//!
//! Provides a point-mass robot model, a reference-capable postural task and
//! a solver wrapper that fails on chosen steps.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nalgebra::{DMatrix, DVector};

use wbstack::adapters::HierarchicalLeastSquares;
use wbstack::domain::models::{ConstraintHandle, Pose, Postural, Stack, Task, TaskHandle, Twist};
use wbstack::domain::ports::{RobotModel, Solver};
use wbstack::{ModelError, SolveFailure, TaskError};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Joint-space point model: `q + dq * step`, no kinematic frames.
#[derive(Debug)]
pub struct PointModel {
    home: DVector<f64>,
    limit: f64,
    fail_after: Option<usize>,
    integrations: AtomicUsize,
}

impl PointModel {
    pub fn new(joints: usize) -> Self {
        Self::at(DVector::zeros(joints))
    }

    pub fn at(home: DVector<f64>) -> Self {
        Self {
            home,
            limit: 10.0,
            fail_after: None,
            integrations: AtomicUsize::new(0),
        }
    }

    /// Integration fails once `count` integrations succeeded.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn integrations(&self) -> usize {
        self.integrations.load(Ordering::SeqCst)
    }
}

impl RobotModel for PointModel {
    fn joint_count(&self) -> usize {
        self.home.len()
    }

    fn current_configuration(&self) -> DVector<f64> {
        self.home.clone()
    }

    fn integrate(
        &self,
        configuration: &DVector<f64>,
        command: &DVector<f64>,
        step: f64,
    ) -> Result<DVector<f64>, ModelError> {
        let done = self.integrations.load(Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| done >= limit) {
            return Err(ModelError::NonFinite);
        }
        self.integrations.fetch_add(1, Ordering::SeqCst);
        Ok(configuration + command * step)
    }

    fn joint_limits(&self) -> (DVector<f64>, DVector<f64>) {
        let n = self.home.len();
        (
            DVector::from_element(n, -self.limit),
            DVector::from_element(n, self.limit),
        )
    }

    fn frame_pose(&self, frame: &str, _q: &DVector<f64>) -> Result<Pose, ModelError> {
        Err(ModelError::UnknownFrame(frame.to_string()))
    }

    fn jacobian(&self, frame: &str, _q: &DVector<f64>) -> Result<DMatrix<f64>, ModelError> {
        Err(ModelError::UnknownFrame(frame.to_string()))
    }
}

/// Postural task that accepts trajectory samples and records them.
///
/// Samples leave the joint reference untouched.
#[derive(Debug)]
pub struct TrackingPostural {
    inner: Postural,
    samples: Arc<Mutex<Vec<(Pose, Twist)>>>,
}

impl TrackingPostural {
    pub fn new(name: &str, reference: DVector<f64>) -> (Self, Arc<Mutex<Vec<(Pose, Twist)>>>) {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let task = Self {
            inner: Postural::new(reference).with_name(name),
            samples: samples.clone(),
        };
        (task, samples)
    }
}

impl Task for TrackingPostural {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn x_size(&self) -> usize {
        self.inner.x_size()
    }

    fn coefficients(&self) -> DMatrix<f64> {
        self.inner.coefficients()
    }

    fn target(&self) -> DVector<f64> {
        self.inner.target()
    }

    fn weight(&self) -> DMatrix<f64> {
        self.inner.weight()
    }

    fn gain(&self) -> f64 {
        self.inner.gain()
    }

    fn set_gain(&mut self, gain: f64) {
        self.inner.set_gain(gain);
    }

    fn constraints(&self) -> Vec<ConstraintHandle> {
        self.inner.constraints()
    }

    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        self.inner.update(configuration)
    }

    fn supports_reference(&self) -> bool {
        true
    }

    fn set_reference(&mut self, pose: &Pose, velocity: &Twist) -> Result<(), TaskError> {
        self.samples.lock().expect("samples lock").push((*pose, *velocity));
        Ok(())
    }
}

pub fn postural(reference: DVector<f64>) -> TaskHandle {
    TaskHandle::new(Postural::new(reference))
}

pub fn tracking(name: &str, reference: DVector<f64>) -> (TaskHandle, Arc<Mutex<Vec<(Pose, Twist)>>>) {
    let (task, samples) = TrackingPostural::new(name, reference);
    (TaskHandle::new(task), samples)
}

/// Reference solver that fails on the listed calls (0-based) and can raise
/// a cancel flag on a given call.
pub struct ScriptedSolver {
    inner: HierarchicalLeastSquares,
    failures: Vec<(usize, SolveFailure)>,
    cancel_at: Option<(usize, Arc<AtomicBool>)>,
    calls: usize,
}

impl ScriptedSolver {
    pub fn new() -> Self {
        Self {
            inner: HierarchicalLeastSquares::default(),
            failures: Vec::new(),
            cancel_at: None,
            calls: 0,
        }
    }

    pub fn failing_at(mut self, call: usize, failure: SolveFailure) -> Self {
        self.failures.push((call, failure));
        self
    }

    pub fn cancelling_at(mut self, call: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_at = Some((call, flag));
        self
    }
}

impl Solver for ScriptedSolver {
    fn solve(&mut self, stack: &Stack, configuration: &DVector<f64>) -> Result<DVector<f64>, SolveFailure> {
        let call = self.calls;
        self.calls += 1;
        if let Some((at, flag)) = &self.cancel_at {
            if *at == call {
                flag.store(true, Ordering::SeqCst);
            }
        }
        if let Some((_, failure)) = self.failures.iter().find(|(at, _)| *at == call) {
            return Err(failure.clone());
        }
        self.inner.solve(stack, configuration)
    }
}

/// Task with a fixed relation `a x ≈ b`.
#[derive(Debug, Clone)]
pub struct FixedTask {
    name: String,
    a: DMatrix<f64>,
    b: DVector<f64>,
    gain: f64,
    constraints: Vec<ConstraintHandle>,
}

impl FixedTask {
    pub fn new(name: &str, a: DMatrix<f64>, b: DVector<f64>) -> Self {
        Self {
            name: name.to_string(),
            a,
            b,
            gain: 1.0,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: ConstraintHandle) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// `rows x cols` relation whose entries encode their position.
    pub fn numbered(name: &str, rows: usize, cols: usize, seed: f64) -> Self {
        let a = DMatrix::from_fn(rows, cols, |i, j| seed + (i * cols + j) as f64);
        let b = DVector::from_fn(rows, |i, _| seed + i as f64);
        Self::new(name, a, b)
    }
}

impl Task for FixedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_size(&self) -> usize {
        self.a.ncols()
    }

    fn coefficients(&self) -> DMatrix<f64> {
        self.a.clone()
    }

    fn target(&self) -> DVector<f64> {
        &self.b * self.gain
    }

    fn weight(&self) -> DMatrix<f64> {
        DMatrix::identity(self.a.nrows(), self.a.nrows())
    }

    fn gain(&self) -> f64 {
        self.gain
    }

    fn set_gain(&mut self, gain: f64) {
        self.gain = gain;
    }

    fn constraints(&self) -> Vec<ConstraintHandle> {
        self.constraints.clone()
    }

    fn update(&mut self, _configuration: &DVector<f64>) -> Result<(), TaskError> {
        Ok(())
    }
}
