//! Reference hierarchical least-squares solver.
//!
//! Resolution order:
//! 1. Equality constraints as a hard top level
//! 2. Stack levels by weighted pseudo-inverse, each in the null space of
//!    everything above it
//! 3. Box bounds by clamping
//! 4. Verification of the remaining inequality and equality rows
//!
//! Soft levels may conflict; the least-squares residual is not a failure.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::domain::error::SolveFailure;
use crate::domain::models::config::SolverConfig;
use crate::domain::models::constraint::{ConstraintKind, Relation};
use crate::domain::models::stack::Stack;
use crate::domain::ports::Solver;

#[derive(Debug, Clone)]
pub struct HierarchicalLeastSquares {
    config: SolverConfig,
}

/// Constraint rows split by how the solver treats them.
#[derive(Default)]
struct ConstraintRows {
    equalities: Vec<(String, Relation)>,
    inequalities: Vec<(String, Relation)>,
    lower: Option<DVector<f64>>,
    upper: Option<DVector<f64>>,
}

impl HierarchicalLeastSquares {
    pub const fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn collect_constraints(stack: &Stack, x_size: usize) -> Result<ConstraintRows, SolveFailure> {
        let mut rows = ConstraintRows::default();
        for constraint in stack.all_constraints() {
            let name = constraint.name();
            let relation = constraint.relation();
            check_relation(&name, &relation, x_size)?;

            match (constraint.kind(), relation.matrix.is_some()) {
                (ConstraintKind::Equality, _) => rows.equalities.push((name, relation)),
                (ConstraintKind::Inequality, true) => rows.inequalities.push((name, relation)),
                (ConstraintKind::Inequality, false) => {
                    let lower = rows.lower.get_or_insert_with(|| DVector::from_element(x_size, f64::NEG_INFINITY));
                    *lower = lower.sup(&relation.lower);
                    let upper = rows.upper.get_or_insert_with(|| DVector::from_element(x_size, f64::INFINITY));
                    *upper = upper.inf(&relation.upper);
                }
            }
        }
        Ok(rows)
    }

    /// Solve `A x = b` in the null space `projector` and narrow the null space.
    fn solve_level(
        &self,
        name: &str,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
        projector: &mut DMatrix<f64>,
    ) -> Result<(), SolveFailure> {
        self.check_conditioning(name, a)?;

        let projected = a * &*projector;
        let pinv = projected
            .clone()
            .pseudo_inverse(self.config.pinv_tolerance)
            .map_err(|e| SolveFailure::Other(format!("pseudo-inverse of '{name}': {e}")))?;

        *x += &pinv * (b - a * &*x);
        *projector -= &pinv * projected;
        trace!(level = name, "level solved");
        Ok(())
    }

    /// Reject levels whose retained singular values spread beyond the
    /// condition limit. Values under the pseudo-inverse tolerance are
    /// structural zeros and do not count.
    fn check_conditioning(&self, name: &str, a: &DMatrix<f64>) -> Result<(), SolveFailure> {
        let singular_values = a.singular_values();
        let largest = singular_values.max();
        if largest <= self.config.pinv_tolerance {
            return Ok(());
        }
        let smallest = singular_values
            .iter()
            .copied()
            .filter(|s| *s > self.config.pinv_tolerance)
            .fold(largest, f64::min);
        let condition = largest / smallest;
        if condition > self.config.condition_limit {
            return Err(SolveFailure::Singular(format!(
                "level '{name}' has condition number {condition:.3e}"
            )));
        }
        Ok(())
    }
}

impl Default for HierarchicalLeastSquares {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Solver for HierarchicalLeastSquares {
    fn solve(&mut self, stack: &Stack, configuration: &DVector<f64>) -> Result<DVector<f64>, SolveFailure> {
        let x_size = stack
            .x_size()
            .ok_or_else(|| SolveFailure::Other("empty stack".to_string()))?;
        if configuration.len() != x_size {
            return Err(SolveFailure::Other(format!(
                "configuration has {} entries, stack expects {x_size}",
                configuration.len()
            )));
        }

        let tolerance = self.config.constraint_tolerance;
        let rows = Self::collect_constraints(stack, x_size)?;

        if let (Some(lower), Some(upper)) = (&rows.lower, &rows.upper) {
            if let Some(i) = (0..x_size).find(|&i| lower[i] > upper[i] + tolerance) {
                return Err(SolveFailure::Infeasible(format!(
                    "bounds cross on joint {i}: {:.4} > {:.4}",
                    lower[i], upper[i]
                )));
            }
        }

        let mut x = DVector::zeros(x_size);
        let mut projector = DMatrix::identity(x_size, x_size);

        if !rows.equalities.is_empty() {
            let (a, b) = stack_equalities(&rows.equalities, x_size);
            self.solve_level("equality constraints", &a, &b, &mut x, &mut projector)?;
            let residual = (&a * &x - &b).amax();
            if residual > tolerance {
                return Err(SolveFailure::RankDeficient(format!(
                    "equality constraints unsatisfiable (residual {residual:.3e})"
                )));
            }
        }

        for level in stack.levels() {
            let name = level.name();
            let a = level.coefficients();
            let b = level.target();
            let weight = level.weight();
            if a.ncols() != x_size || a.nrows() != b.len() || weight.nrows() != b.len() {
                return Err(SolveFailure::Other(format!("level '{name}' has inconsistent shape")));
            }
            if !(all_finite(a.iter()) && all_finite(b.iter()) && all_finite(weight.iter())) {
                return Err(SolveFailure::Singular(format!("level '{name}' has non-finite data")));
            }

            let (a, b) = apply_weight(&name, a, b, &weight)?;
            self.solve_level(&name, &a, &b, &mut x, &mut projector)?;
        }

        if let (Some(lower), Some(upper)) = (&rows.lower, &rows.upper) {
            x = x.sup(lower).inf(upper);
        }

        for (name, relation) in rows.inequalities.iter().chain(&rows.equalities) {
            let violation = relation.violation(&x);
            if violation > tolerance {
                return Err(SolveFailure::Infeasible(format!(
                    "constraint '{name}' violated by {violation:.3e}"
                )));
            }
        }

        if !all_finite(x.iter()) {
            return Err(SolveFailure::Singular("non-finite command".to_string()));
        }
        Ok(x)
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

fn check_relation(name: &str, relation: &Relation, x_size: usize) -> Result<(), SolveFailure> {
    let rows = relation.rows();
    let consistent = relation.upper.len() == rows
        && match &relation.matrix {
            Some(m) => m.nrows() == rows && m.ncols() == x_size,
            None => rows == x_size,
        };
    if !consistent {
        return Err(SolveFailure::Other(format!("constraint '{name}' has inconsistent shape")));
    }

    let matrix_finite = relation.matrix.as_ref().is_none_or(|m| all_finite(m.iter()));
    // Infinite bounds are allowed; NaN is not.
    let bounds_defined = relation.lower.iter().chain(relation.upper.iter()).all(|v| !v.is_nan());
    if matrix_finite && bounds_defined {
        Ok(())
    } else {
        Err(SolveFailure::Singular(format!("constraint '{name}' has non-finite data")))
    }
}

fn stack_equalities(equalities: &[(String, Relation)], x_size: usize) -> (DMatrix<f64>, DVector<f64>) {
    let total: usize = equalities.iter().map(|(_, r)| r.rows()).sum();
    let mut a = DMatrix::zeros(total, x_size);
    let mut b = DVector::zeros(total);
    let mut offset = 0;
    for (_, relation) in equalities {
        let rows = relation.rows();
        match &relation.matrix {
            Some(m) => a.view_mut((offset, 0), (rows, x_size)).copy_from(m),
            None => a
                .view_mut((offset, 0), (rows, x_size))
                .fill_with_identity(),
        }
        b.rows_mut(offset, rows).copy_from(&relation.lower);
        offset += rows;
    }
    (a, b)
}

/// Scale `A x = b` by `Lᵀ` where `W = L Lᵀ`.
fn apply_weight(
    name: &str,
    a: DMatrix<f64>,
    b: DVector<f64>,
    weight: &DMatrix<f64>,
) -> Result<(DMatrix<f64>, DVector<f64>), SolveFailure> {
    if weight.is_identity(0.0) {
        return Ok((a, b));
    }
    let cholesky = weight
        .clone()
        .cholesky()
        .ok_or_else(|| SolveFailure::Other(format!("weight of '{name}' is not positive definite")))?;
    let factor = cholesky.l().transpose();
    Ok((&factor * a, &factor * b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::bounds::VelocityLimits;
    use crate::domain::models::constraint::{ConstraintHandle, LinearConstraint};
    use crate::domain::models::postural::Postural;
    use crate::domain::models::task::TaskHandle;
    use crate::services::stack_builder::{append_level, attach_constraint, bound, combine};

    fn postural(reference: &[f64]) -> TaskHandle {
        TaskHandle::new(Postural::new(DVector::from_row_slice(reference)))
    }

    fn solve(stack: &Stack) -> Result<DVector<f64>, SolveFailure> {
        let n = stack.x_size().unwrap_or(0);
        HierarchicalLeastSquares::default().solve(stack, &DVector::zeros(n))
    }

    #[test]
    fn test_single_level_tracks_target() {
        let stack = Stack::single(postural(&[0.5, -0.25]));
        let x = solve(&stack).expect("solve");
        assert!((x - DVector::from_vec(vec![0.5, -0.25])).norm() < 1e-12);
    }

    #[test]
    fn test_lower_level_stays_in_null_space() {
        // The equality pins x0 = 1; the task wants x = (5, 2).
        let pin = ConstraintHandle::new(
            LinearConstraint::equality(
                "pin",
                DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
                DVector::from_element(1, 1.0),
            )
            .expect("equality"),
        );
        let task = attach_constraint(&postural(&[5.0, 2.0]), pin).expect("attach");

        let x = solve(&Stack::single(task)).expect("solve");
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!((x[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_priority_order() {
        let first = postural(&[1.0, 1.0]);
        let second = postural(&[3.0, 3.0]);
        let stack = append_level(&first, &second).expect("append");
        let x = solve(&stack).expect("solve");
        assert!((x - DVector::from_element(2, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn test_conflicting_soft_rows_average() {
        let a = postural(&[1.0]);
        let b = postural(&[3.0]);
        let x = solve(&Stack::single(combine(&a, &b).expect("combine"))).expect("solve");
        assert!((x[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_box_bounds_clamp() {
        let stack = bound(postural(&[4.0, -4.0]), ConstraintHandle::new(VelocityLimits::uniform(1.0, 2)))
            .expect("bound");
        let x = solve(&stack).expect("solve");
        assert_eq!(x.as_slice(), &[1.0, -1.0]);
    }

    #[test]
    fn test_crossed_bounds_are_infeasible() {
        let crossed = ConstraintHandle::new(
            LinearConstraint::bounds("crossed", DVector::from_element(1, 1.0), DVector::from_element(1, 2.0))
                .expect("bounds"),
        );
        let stack = bound(
            bound(postural(&[0.0]), crossed).expect("bound"),
            ConstraintHandle::new(VelocityLimits::uniform(0.5, 1)),
        )
        .expect("bound");
        assert!(matches!(solve(&stack), Err(SolveFailure::Infeasible(_))));
    }

    #[test]
    fn test_contradicting_equalities_are_rank_deficient() {
        let a = ConstraintHandle::new(
            LinearConstraint::equality("a", DMatrix::from_element(1, 1, 1.0), DVector::from_element(1, 1.0))
                .expect("equality"),
        );
        let b = ConstraintHandle::new(
            LinearConstraint::equality("b", DMatrix::from_element(1, 1, 1.0), DVector::from_element(1, 2.0))
                .expect("equality"),
        );
        let stack = bound(bound(postural(&[0.0]), a).expect("bound"), b).expect("bound");
        assert!(matches!(solve(&stack), Err(SolveFailure::RankDeficient(_))));
    }

    #[test]
    fn test_violated_inequality_detected_after_clamp() {
        // x0 + x1 >= 3 cannot hold with |x| <= 1.
        let sum = ConstraintHandle::new(
            LinearConstraint::inequality(
                "sum",
                DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
                DVector::from_element(1, 3.0),
                DVector::from_element(1, f64::INFINITY),
            )
            .expect("inequality"),
        );
        let stack = bound(
            bound(postural(&[5.0, 5.0]), sum).expect("bound"),
            ConstraintHandle::new(VelocityLimits::uniform(1.0, 2)),
        )
        .expect("bound");
        assert!(matches!(solve(&stack), Err(SolveFailure::Infeasible(_))));
    }

    #[test]
    fn test_ill_conditioned_level_is_singular() {
        let nearly_singular = ConstraintHandle::new(VelocityLimits::uniform(10.0, 2));
        let weight = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1e-20]));
        let task = TaskHandle::new(Postural::new(DVector::zeros(2)).with_weight(weight).expect("weight"));
        let stack = bound(&task, nearly_singular).expect("bound");
        let config = SolverConfig {
            pinv_tolerance: 1e-12,
            ..SolverConfig::default()
        };
        let result = HierarchicalLeastSquares::new(config).solve(&stack, &DVector::zeros(2));
        assert!(matches!(result, Err(SolveFailure::Singular(_))));
    }

    #[test]
    fn test_non_positive_weight_is_other() {
        let weight = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0]));
        let task = TaskHandle::new(Postural::new(DVector::zeros(2)).with_weight(weight).expect("weight"));
        assert!(matches!(solve(&Stack::single(task)), Err(SolveFailure::Other(_))));
    }
}
