//! Constraint domain model.
//!
//! A constraint restricts the feasible commands either directly
//! (`lower <= x <= upper`) or through a matrix (`lower <= A x <= upper`).
//! Equalities are expressed with `lower == upper`.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::{StackError, StackResult, TaskError};

/// Kind of restriction a constraint expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Equality,
    /// Two-sided inequality or box bounds.
    Inequality,
}

impl ConstraintKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equality => "equality",
            Self::Inequality => "inequality",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear relation evaluated at the current configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// `None` bounds the command directly.
    pub matrix: Option<DMatrix<f64>>,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Relation {
    /// Direct bounds on the command.
    pub const fn bounds(lower: DVector<f64>, upper: DVector<f64>) -> Self {
        Self {
            matrix: None,
            lower,
            upper,
        }
    }

    /// Rows of the relation.
    pub fn rows(&self) -> usize {
        self.lower.len()
    }

    /// Evaluate the constrained quantity for a command.
    pub fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        match &self.matrix {
            Some(a) => a * x,
            None => x.clone(),
        }
    }

    /// Largest violation of the relation by `x` (zero when satisfied).
    pub fn violation(&self, x: &DVector<f64>) -> f64 {
        let value = self.apply(x);
        value
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(v, (lo, hi))| (lo - v).max(v - hi).max(0.0))
            .fold(0.0, f64::max)
    }
}

/// Capability set shared by every kind of constraint.
pub trait Constraint: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> ConstraintKind;

    /// Command dimension.
    fn x_size(&self) -> usize;

    /// Current relation.
    fn relation(&self) -> Relation;

    /// Re-evaluate bounds around `configuration`.
    fn update(&mut self, configuration: &DVector<f64>) -> Result<(), TaskError>;
}

/// Shared, identity-carrying reference to a constraint.
///
/// Constraint sets are unioned by identity: attaching the same handle twice
/// yields it once.
#[derive(Clone)]
pub struct ConstraintHandle {
    id: Uuid,
    inner: Arc<RwLock<dyn Constraint>>,
}

impl ConstraintHandle {
    pub fn new<C: Constraint + 'static>(constraint: C) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(RwLock::new(constraint)),
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, dyn Constraint + 'static> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Constraint + 'static> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> String {
        self.read().name().to_string()
    }

    pub fn kind(&self) -> ConstraintKind {
        self.read().kind()
    }

    pub fn x_size(&self) -> usize {
        self.read().x_size()
    }

    pub fn relation(&self) -> Relation {
        self.read().relation()
    }

    pub fn update(&self, configuration: &DVector<f64>) -> Result<(), TaskError> {
        self.write().update(configuration)
    }
}

impl PartialEq for ConstraintHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConstraintHandle {}

impl fmt::Debug for ConstraintHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintHandle")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// Append `items` to `set`, skipping handles already present.
pub fn union_into(set: &mut Vec<ConstraintHandle>, items: impl IntoIterator<Item = ConstraintHandle>) {
    for item in items {
        if !set.contains(&item) {
            set.push(item);
        }
    }
}

/// Constant linear constraint supplied by the caller.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    name: String,
    kind: ConstraintKind,
    relation: Relation,
    x_size: usize,
}

impl LinearConstraint {
    /// `matrix * x == value`.
    pub fn equality(
        name: impl Into<String>,
        matrix: DMatrix<f64>,
        value: DVector<f64>,
    ) -> StackResult<Self> {
        let name = name.into();
        check_rows(&name, &matrix, value.len())?;
        Ok(Self {
            x_size: matrix.ncols(),
            kind: ConstraintKind::Equality,
            relation: Relation {
                matrix: Some(matrix),
                lower: value.clone(),
                upper: value,
            },
            name,
        })
    }

    /// `lower <= matrix * x <= upper`.
    pub fn inequality(
        name: impl Into<String>,
        matrix: DMatrix<f64>,
        lower: DVector<f64>,
        upper: DVector<f64>,
    ) -> StackResult<Self> {
        let name = name.into();
        check_rows(&name, &matrix, lower.len())?;
        check_rows(&name, &matrix, upper.len())?;
        Ok(Self {
            x_size: matrix.ncols(),
            kind: ConstraintKind::Inequality,
            relation: Relation {
                matrix: Some(matrix),
                lower,
                upper,
            },
            name,
        })
    }

    /// `lower <= x <= upper`.
    pub fn bounds(
        name: impl Into<String>,
        lower: DVector<f64>,
        upper: DVector<f64>,
    ) -> StackResult<Self> {
        let name = name.into();
        if lower.len() != upper.len() {
            return Err(StackError::ShapeMismatch {
                context: format!("bounds '{name}'"),
                expected: lower.len(),
                found: upper.len(),
            });
        }
        Ok(Self {
            x_size: lower.len(),
            kind: ConstraintKind::Inequality,
            relation: Relation::bounds(lower, upper),
            name,
        })
    }
}

fn check_rows(name: &str, matrix: &DMatrix<f64>, len: usize) -> StackResult<()> {
    if matrix.nrows() == len {
        Ok(())
    } else {
        Err(StackError::TargetMismatch {
            task: name.to_string(),
            expected: matrix.nrows(),
            found: len,
        })
    }
}

impl Constraint for LinearConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstraintKind {
        self.kind
    }

    fn x_size(&self) -> usize {
        self.x_size
    }

    fn relation(&self) -> Relation {
        self.relation.clone()
    }

    fn update(&mut self, _configuration: &DVector<f64>) -> Result<(), TaskError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_violation() {
        let relation = Relation::bounds(DVector::from_element(2, -1.0), DVector::from_element(2, 1.0));

        assert_eq!(relation.violation(&DVector::from_vec(vec![0.5, -0.5])), 0.0);
        assert!((relation.violation(&DVector::from_vec(vec![1.5, -3.0])) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_equality_constraint() {
        let c = LinearConstraint::equality(
            "sum",
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            DVector::from_vec(vec![1.0]),
        )
        .expect("valid equality");

        assert_eq!(c.kind(), ConstraintKind::Equality);
        assert_eq!(c.x_size(), 2);
        let relation = c.relation();
        assert_eq!(relation.lower, relation.upper);
        assert!(relation.violation(&DVector::from_vec(vec![0.5, 0.5])) < 1e-12);
    }

    #[test]
    fn test_mismatched_rows_rejected() {
        let result = LinearConstraint::inequality(
            "bad",
            DMatrix::zeros(2, 3),
            DVector::zeros(2),
            DVector::zeros(3),
        );
        assert!(matches!(result, Err(StackError::TargetMismatch { .. })));

        let result = LinearConstraint::bounds("bad", DVector::zeros(2), DVector::zeros(3));
        assert!(matches!(result, Err(StackError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_union_into_skips_duplicates() {
        let c = ConstraintHandle::new(
            LinearConstraint::bounds("b", DVector::zeros(1), DVector::zeros(1)).expect("bounds"),
        );
        let mut set = vec![c.clone()];
        union_into(&mut set, vec![c.clone(), c]);
        assert_eq!(set.len(), 1);
    }
}
