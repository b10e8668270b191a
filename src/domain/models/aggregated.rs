//! Aggregated task.
//!
//! Joins several tasks into one relation at the same priority by stacking
//! their coefficient rows and targets in member order. Nothing is cached:
//! every query rebuilds the relation from the members' current state, so a
//! trajectory writing into a leaf task is visible through the aggregate on
//! the next read.
//!
//! Gain composition: every task folds its own gain into its `target`. The
//! aggregate multiplies the concatenated member targets by its own gain, so
//! gains multiply along the nesting path. Member weights are not merged;
//! the aggregate's weight defaults to the identity over its current rows.

use nalgebra::{DMatrix, DVector};

use super::constraint::{union_into, ConstraintHandle};
use super::task::{check_weight, Task, TaskHandle};
use crate::domain::error::{StackError, StackResult, TaskError};

/// Composite task stacking its members' relations.
#[derive(Debug)]
pub struct Aggregated {
    name: String,
    members: Vec<TaskHandle>,
    x_size: usize,
    gain: f64,
    weight: Option<DMatrix<f64>>,
    constraints: Vec<ConstraintHandle>,
}

impl Aggregated {
    /// Aggregate `members`, all of command dimension `x_size`.
    ///
    /// An empty member list is accepted but yields a degenerate task that
    /// must not reach a solve; stack validation rejects it.
    pub fn new(members: Vec<TaskHandle>, x_size: usize) -> StackResult<Self> {
        let name = members
            .iter()
            .map(TaskHandle::name)
            .collect::<Vec<_>>()
            .join("+");
        Self::named(name, members, x_size)
    }

    pub fn named(
        name: impl Into<String>,
        members: Vec<TaskHandle>,
        x_size: usize,
    ) -> StackResult<Self> {
        let name = name.into();
        for member in &members {
            let found = member.x_size();
            if found != x_size {
                return Err(StackError::ShapeMismatch {
                    context: format!("aggregate '{name}' member '{}'", member.name()),
                    expected: x_size,
                    found,
                });
            }
        }

        Ok(Self {
            name,
            members,
            x_size,
            gain: 1.0,
            weight: None,
            constraints: Vec::new(),
        })
    }

    /// Attach a constraint directly to the aggregate.
    pub fn add_constraint(&mut self, constraint: ConstraintHandle) -> StackResult<()> {
        let found = constraint.x_size();
        if found != self.x_size {
            return Err(StackError::ShapeMismatch {
                context: format!("constraint '{}' on '{}'", constraint.name(), self.name),
                expected: self.x_size,
                found,
            });
        }
        union_into(&mut self.constraints, [constraint]);
        Ok(())
    }

    /// Builder-style [`Aggregated::add_constraint`].
    pub fn with_constraint(mut self, constraint: ConstraintHandle) -> StackResult<Self> {
        self.add_constraint(constraint)?;
        Ok(self)
    }

    /// Set an explicit weight; it must match the current row count.
    pub fn set_weight(&mut self, weight: DMatrix<f64>) -> StackResult<()> {
        check_weight(&self.name, &weight, self.rows())?;
        self.weight = Some(weight);
        Ok(())
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Task for Aggregated {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_size(&self) -> usize {
        self.x_size
    }

    fn coefficients(&self) -> DMatrix<f64> {
        let blocks: Vec<DMatrix<f64>> = self.members.iter().map(TaskHandle::coefficients).collect();
        let rows = blocks.iter().map(DMatrix::nrows).sum();

        let mut a = DMatrix::zeros(rows, self.x_size);
        let mut offset = 0;
        for block in &blocks {
            // Mismatched members are reported by shape validation.
            let cols = block.ncols().min(self.x_size);
            a.view_mut((offset, 0), (block.nrows(), cols))
                .copy_from(&block.columns(0, cols));
            offset += block.nrows();
        }
        a
    }

    fn target(&self) -> DVector<f64> {
        let parts: Vec<DVector<f64>> = self.members.iter().map(TaskHandle::target).collect();
        let rows = parts.iter().map(DVector::len).sum();

        let mut b = DVector::zeros(rows);
        let mut offset = 0;
        for part in &parts {
            b.rows_mut(offset, part.len()).copy_from(part);
            offset += part.len();
        }
        b * self.gain
    }

    fn weight(&self) -> DMatrix<f64> {
        match &self.weight {
            Some(w) => w.clone(),
            None => {
                let rows = self.rows();
                DMatrix::identity(rows, rows)
            }
        }
    }

    fn gain(&self) -> f64 {
        self.gain
    }

    fn set_gain(&mut self, gain: f64) {
        self.gain = gain;
    }

    fn constraints(&self) -> Vec<ConstraintHandle> {
        let mut all = Vec::new();
        for member in &self.members {
            union_into(&mut all, member.constraints());
        }
        union_into(&mut all, self.constraints.iter().cloned());
        all
    }

    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        for member in &self.members {
            member.write().update(configuration)?;
        }
        Ok(())
    }

    fn members(&self) -> Vec<TaskHandle> {
        self.members.clone()
    }

    fn rows(&self) -> usize {
        self.members.iter().map(|m| m.read().rows()).sum()
    }
}
