//! Reference manipulator: six link serial arm described by Denavit-Hartenberg parameters,
//! placed on a base and carrying a tool (the hand).

use crate::kinematic_traits::{Joints, Manipulator, Pose};
use nalgebra::{Translation3, UnitQuaternion, Vector3};

/// Classic Denavit-Hartenberg link parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhLink {
    /// Offset along the previous z axis
    pub d: f64,
    /// Length along the common normal
    pub a: f64,
    /// Twist around the common normal
    pub alpha: f64,
    /// Joint angle offset added to the joint value
    pub theta_offset: f64,
}

impl DhLink {
    pub const fn new(d: f64, a: f64, alpha: f64, theta_offset: f64) -> Self {
        Self {
            d,
            a,
            alpha,
            theta_offset,
        }
    }

    /// Link transform for the given joint value: Rz(theta) * Tz(d) * Tx(a) * Rx(alpha)
    pub fn transform(&self, q: f64) -> Pose {
        let theta = q + self.theta_offset;
        let rz = Pose::from_parts(
            Translation3::new(0.0, 0.0, self.d),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta),
        );
        let rx = Pose::from_parts(
            Translation3::new(self.a, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.alpha),
        );
        rz * rx
    }
}

/// Serial arm with base and tool transforms. The tool transform brings the arm flange
/// to the hand frame used for grasping.
#[derive(Debug, Clone)]
pub struct SerialArm {
    pub links: [DhLink; 6],
    pub base: Pose,
    pub tool: Pose,
}

impl SerialArm {
    pub fn new(links: [DhLink; 6]) -> Self {
        Self {
            links,
            base: Pose::identity(),
            tool: Pose::identity(),
        }
    }

    /// Approximate KUKA LWR geometry as used on the bimanual PaCMan setup, metres.
    pub fn kuka_lwr() -> Self {
        use std::f64::consts::FRAC_PI_2;
        Self::new([
            DhLink::new(0.310, 0.0, FRAC_PI_2, 0.0),
            DhLink::new(0.0, 0.0, -FRAC_PI_2, 0.0),
            DhLink::new(0.400, 0.0, -FRAC_PI_2, 0.0),
            DhLink::new(0.0, 0.0, FRAC_PI_2, 0.0),
            DhLink::new(0.390, 0.0, FRAC_PI_2, 0.0),
            DhLink::new(0.0, 0.0, -FRAC_PI_2, 0.0),
        ])
    }

    pub fn with_base(mut self, base: Pose) -> Self {
        self.base = base;
        self
    }

    pub fn with_tool(mut self, tool: Pose) -> Self {
        self.tool = tool;
        self
    }

    /// Frames of all six links, base included, tool not included.
    pub fn forward_with_joint_poses(&self, joints: &Joints) -> [Pose; 6] {
        let mut poses = [Pose::identity(); 6];
        let mut current = self.base;
        for (i, link) in self.links.iter().enumerate() {
            current *= link.transform(joints[i]);
            poses[i] = current;
        }
        poses
    }
}

impl Manipulator for SerialArm {
    fn forward(&self, joints: &Joints) -> Pose {
        self.forward_with_joint_poses(joints)[5] * self.tool
    }

    fn base_frame(&self) -> Pose {
        self.base
    }
}
