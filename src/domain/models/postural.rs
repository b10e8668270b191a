//! Postural task: track a joint-space reference.
//!
//! `A = I(n)`, `b = gain * (q_ref - q)`.

use nalgebra::{DMatrix, DVector};

use super::constraint::ConstraintHandle;
use super::task::{check_weight, Task};
use crate::domain::error::{ModelError, StackResult, TaskError};

#[derive(Debug, Clone)]
pub struct Postural {
    name: String,
    configuration: DVector<f64>,
    reference: DVector<f64>,
    gain: f64,
    weight: DMatrix<f64>,
}

impl Postural {
    /// Postural task towards `reference`, linearized at the zero posture
    /// until the first update.
    pub fn new(reference: DVector<f64>) -> Self {
        let configuration = DVector::zeros(reference.len());
        Self::at(configuration, reference)
    }

    /// Postural task linearized at `configuration`.
    pub fn at(configuration: DVector<f64>, reference: DVector<f64>) -> Self {
        let n = reference.len();
        Self {
            name: "postural".to_string(),
            configuration,
            reference,
            gain: 1.0,
            weight: DMatrix::identity(n, n),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_weight(mut self, weight: DMatrix<f64>) -> StackResult<Self> {
        check_weight(&self.name, &weight, self.reference.len())?;
        self.weight = weight;
        Ok(self)
    }

    pub const fn reference(&self) -> &DVector<f64> {
        &self.reference
    }

    /// Replace the joint-space reference.
    pub fn set_posture_reference(&mut self, reference: DVector<f64>) -> Result<(), TaskError> {
        if reference.len() != self.reference.len() {
            return Err(TaskError::ReferenceShape {
                task: self.name.clone(),
                expected: self.reference.len(),
                found: reference.len(),
            });
        }
        self.reference = reference;
        Ok(())
    }
}

impl Task for Postural {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_size(&self) -> usize {
        self.reference.len()
    }

    fn coefficients(&self) -> DMatrix<f64> {
        let n = self.reference.len();
        DMatrix::identity(n, n)
    }

    fn target(&self) -> DVector<f64> {
        (&self.reference - &self.configuration) * self.gain
    }

    fn weight(&self) -> DMatrix<f64> {
        self.weight.clone()
    }

    fn gain(&self) -> f64 {
        self.gain
    }

    fn set_gain(&mut self, gain: f64) {
        self.gain = gain;
    }

    fn constraints(&self) -> Vec<ConstraintHandle> {
        Vec::new()
    }

    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        if configuration.len() != self.reference.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.reference.len(),
                found: configuration.len(),
            }
            .into());
        }
        self.configuration.copy_from(configuration);
        Ok(())
    }
}
