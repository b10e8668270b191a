//! Serial revolute chain robot model.
//!
//! Each joint rotates about a fixed axis in its parent frame and is followed
//! by a link along the chain's local -y direction. Named frames sit at the
//! end of a given joint's link.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector, Isometry3, Vector3};
use serde::{Deserialize, Serialize};

use crate::domain::error::ModelError;
use crate::domain::models::trajectory::Pose;
use crate::domain::ports::RobotModel;

/// One revolute joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevoluteJoint {
    pub name: String,
    /// Rotation axis in the parent frame, unit length.
    pub axis: Vector3<f64>,
    /// Length of the link following the joint, meters.
    pub link_length: f64,
    pub lower: f64,
    pub upper: f64,
}

impl RevoluteJoint {
    /// Joint with limits given in degrees.
    pub fn new(name: &str, axis: Vector3<f64>, link_length: f64, min_deg: f64, max_deg: f64) -> Self {
        Self {
            name: name.to_string(),
            axis: axis.normalize(),
            link_length,
            lower: min_deg.to_radians(),
            upper: max_deg.to_radians(),
        }
    }

    fn transform(&self, angle: f64) -> Isometry3<f64> {
        Isometry3::rotation(self.axis * angle) * Isometry3::translation(0.0, -self.link_length, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerialChain {
    joints: Vec<RevoluteJoint>,
    /// Frame name and the index of the joint whose link it ends.
    frames: Vec<(String, usize)>,
    base: Isometry3<f64>,
    home: DVector<f64>,
}

impl SerialChain {
    pub const ELBOW: &'static str = "elbow";
    pub const WRIST: &'static str = "wrist";
    pub const END_EFFECTOR: &'static str = "end_effector";

    /// Chain with the base at the origin, a frame at the tip and a zero home
    /// configuration. A chain without joints has no frames.
    pub fn new(joints: Vec<RevoluteJoint>) -> Self {
        let n = joints.len();
        let tip = n
            .checked_sub(1)
            .map(|last| (Self::END_EFFECTOR.to_string(), last));
        Self {
            frames: tip.into_iter().collect(),
            home: DVector::zeros(n),
            base: Isometry3::identity(),
            joints,
        }
    }

    /// 7-DoF human-like right arm: shoulder (3), elbow (1), wrist (3).
    pub fn right_arm() -> Self {
        let joints = vec![
            RevoluteJoint::new("shoulder_flexion", Vector3::x(), 0.0, -60.0, 180.0),
            RevoluteJoint::new("shoulder_abduction", Vector3::z(), 0.0, -50.0, 180.0),
            RevoluteJoint::new("shoulder_rotation", -Vector3::y(), 0.30, -90.0, 90.0),
            RevoluteJoint::new("elbow_flexion", Vector3::x(), 0.28, 0.0, 145.0),
            RevoluteJoint::new("wrist_flexion", Vector3::x(), 0.0, -80.0, 80.0),
            RevoluteJoint::new("wrist_deviation", Vector3::z(), 0.0, -20.0, 30.0),
            RevoluteJoint::new("wrist_pronation", -Vector3::y(), 0.20, -80.0, 80.0),
        ];
        let mut chain = Self::new(joints);
        chain.frames = vec![
            (Self::ELBOW.to_string(), 2),
            (Self::WRIST.to_string(), 3),
            (Self::END_EFFECTOR.to_string(), 6),
        ];
        // Bent elbow keeps the home posture away from the straight-arm singularity.
        chain.home = DVector::from_vec(vec![0.3, 0.2, 0.0, PI / 4.0, 0.1, 0.0, 0.0]);
        chain
    }

    /// Add a frame at the end of joint `joint`'s link.
    pub fn with_frame(mut self, name: &str, joint: usize) -> Result<Self, ModelError> {
        if joint >= self.joints.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.joints.len(),
                found: joint + 1,
            });
        }
        self.frames.retain(|(existing, _)| existing != name);
        self.frames.push((name.to_string(), joint));
        Ok(self)
    }

    /// Replace the configuration previews start from.
    pub fn with_home(mut self, home: DVector<f64>) -> Result<Self, ModelError> {
        self.check_dimension(&home)?;
        self.home = home;
        Ok(self)
    }

    pub fn joints(&self) -> &[RevoluteJoint] {
        &self.joints
    }

    pub fn frame_names(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|(name, _)| name.as_str())
    }

    fn frame_joint(&self, frame: &str) -> Result<usize, ModelError> {
        self.frames
            .iter()
            .find(|(name, _)| name == frame)
            .map(|(_, joint)| *joint)
            .ok_or_else(|| ModelError::UnknownFrame(frame.to_string()))
    }

    fn check_dimension(&self, q: &DVector<f64>) -> Result<(), ModelError> {
        if q.len() == self.joints.len() {
            Ok(())
        } else {
            Err(ModelError::DimensionMismatch {
                expected: self.joints.len(),
                found: q.len(),
            })
        }
    }

    /// World transform at the origin of every joint, plus the chain tip.
    fn joint_transforms(&self, q: &DVector<f64>) -> Vec<Isometry3<f64>> {
        let mut transforms = Vec::with_capacity(self.joints.len() + 1);
        let mut current = self.base;
        transforms.push(current);
        for (joint, angle) in self.joints.iter().zip(q.iter()) {
            current *= joint.transform(*angle);
            transforms.push(current);
        }
        transforms
    }
}

impl RobotModel for SerialChain {
    fn joint_count(&self) -> usize {
        self.joints.len()
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
        self.check_dimension(configuration)?;
        self.check_dimension(command)?;
        let next = configuration + command * step;
        if next.iter().all(|value| value.is_finite()) {
            Ok(next)
        } else {
            Err(ModelError::NonFinite)
        }
    }

    fn joint_limits(&self) -> (DVector<f64>, DVector<f64>) {
        (
            DVector::from_iterator(self.joints.len(), self.joints.iter().map(|j| j.lower)),
            DVector::from_iterator(self.joints.len(), self.joints.iter().map(|j| j.upper)),
        )
    }

    fn frame_pose(&self, frame: &str, q: &DVector<f64>) -> Result<Pose, ModelError> {
        let joint = self.frame_joint(frame)?;
        self.check_dimension(q)?;
        Ok(self.joint_transforms(q)[joint + 1])
    }

    fn jacobian(&self, frame: &str, q: &DVector<f64>) -> Result<DMatrix<f64>, ModelError> {
        let last = self.frame_joint(frame)?;
        self.check_dimension(q)?;

        let transforms = self.joint_transforms(q);
        let tip = transforms[last + 1].translation.vector;
        let mut jacobian = DMatrix::zeros(6, self.joints.len());

        // Joints past the frame do not move it.
        for (k, joint) in self.joints.iter().enumerate().take(last + 1) {
            let origin = &transforms[k];
            let axis = origin.rotation * joint.axis;
            let linear = axis.cross(&(tip - origin.translation.vector));
            jacobian.fixed_view_mut::<3, 1>(0, k).copy_from(&linear);
            jacobian.fixed_view_mut::<3, 1>(3, k).copy_from(&axis);
        }
        Ok(jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_arm_shape() {
        let arm = SerialChain::right_arm();
        assert_eq!(arm.joint_count(), 7);

        let (lower, upper) = arm.joint_limits();
        let home = arm.current_configuration();
        for i in 0..7 {
            assert!(lower[i] < upper[i]);
            assert!(home[i] >= lower[i] && home[i] <= upper[i]);
        }
    }

    #[test]
    fn test_straight_arm_reach() {
        let arm = SerialChain::right_arm();
        let pose = arm
            .frame_pose(SerialChain::END_EFFECTOR, &DVector::zeros(7))
            .expect("pose");
        // Links hang along -y: 0.30 + 0.28 + 0.20.
        assert!((pose.translation.vector - Vector3::new(0.0, -0.78, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_difference() {
        let arm = SerialChain::right_arm();
        let q = arm.current_configuration();
        let jacobian = arm.jacobian(SerialChain::END_EFFECTOR, &q).expect("jacobian");
        let eps = 1e-7;

        for k in 0..7 {
            let mut forward = q.clone();
            forward[k] += eps;
            let p0 = arm.frame_pose(SerialChain::END_EFFECTOR, &q).expect("pose");
            let p1 = arm.frame_pose(SerialChain::END_EFFECTOR, &forward).expect("pose");
            let numeric = (p1.translation.vector - p0.translation.vector) / eps;
            for row in 0..3 {
                assert!((numeric[row] - jacobian[(row, k)]).abs() < 1e-5, "joint {k} row {row}");
            }
        }
    }

    #[test]
    fn test_elbow_jacobian_ignores_distal_joints() {
        let arm = SerialChain::right_arm();
        let jacobian = arm
            .jacobian(SerialChain::ELBOW, &arm.current_configuration())
            .expect("jacobian");
        for k in 3..7 {
            assert!(jacobian.column(k).norm() < 1e-15);
        }
    }

    #[test]
    fn test_unknown_frame() {
        let arm = SerialChain::right_arm();
        let err = arm.frame_pose("tail", &DVector::zeros(7)).expect_err("unknown");
        assert_eq!(err, ModelError::UnknownFrame("tail".to_string()));
    }

    #[test]
    fn test_empty_chain_has_no_frames() {
        let chain = SerialChain::new(Vec::new());
        let q = DVector::zeros(0);

        assert_eq!(chain.frame_names().count(), 0);
        assert!(matches!(
            chain.frame_pose(SerialChain::END_EFFECTOR, &q),
            Err(ModelError::UnknownFrame(_))
        ));
        assert!(matches!(
            chain.jacobian(SerialChain::END_EFFECTOR, &q),
            Err(ModelError::UnknownFrame(_))
        ));
        assert!(chain.with_frame("tip", 0).is_err());
    }

    #[test]
    fn test_integrate_checks_inputs() {
        let arm = SerialChain::right_arm();
        let q = DVector::zeros(7);

        let next = arm.integrate(&q, &DVector::from_element(7, 2.0), 0.5).expect("integrate");
        assert_eq!(next, DVector::from_element(7, 1.0));

        assert!(matches!(
            arm.integrate(&q, &DVector::zeros(3), 0.5),
            Err(ModelError::DimensionMismatch { expected: 7, found: 3 })
        ));
        assert_eq!(
            arm.integrate(&q, &DVector::from_element(7, f64::INFINITY), 0.5),
            Err(ModelError::NonFinite)
        );
    }

    #[test]
    fn test_with_frame_and_home() {
        let chain = SerialChain::new(vec![
            RevoluteJoint::new("a", Vector3::z(), 1.0, -90.0, 90.0),
            RevoluteJoint::new("b", Vector3::z(), 1.0, -90.0, 90.0),
        ])
        .with_frame("middle", 0)
        .expect("frame")
        .with_home(DVector::from_vec(vec![0.1, 0.2]))
        .expect("home");

        let names: Vec<&str> = chain.frame_names().collect();
        assert_eq!(names, vec![SerialChain::END_EFFECTOR, "middle"]);
        assert!(chain.with_home(DVector::zeros(3)).is_err());
    }
}
