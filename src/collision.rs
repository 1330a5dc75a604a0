//! Collision term of the solution likelihood.

use crate::kinematic_traits::{Pose, Waypoint};
use nalgebra::Point3;

/// Collision likelihood of a candidate: 1.0 is collision free, 0.0 certain collision.
pub trait CollisionModel: Send + Sync {
    /// * `pose` - candidate end effector pose
    /// * `path` - candidate trajectory
    /// * `locations` - object locations, world coordinates
    fn evaluate(&self, pose: &Pose, path: &[Waypoint], locations: &[Point3<f64>]) -> f64;
}

/// Collision checking disabled, every candidate is collision free.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollision;

impl CollisionModel for NoCollision {
    fn evaluate(&self, _pose: &Pose, _path: &[Waypoint], _locations: &[Point3<f64>]) -> f64 {
        1.0
    }
}

#[cfg(feature = "collisions")]
pub use gripper::GripperClearance;

#[cfg(feature = "collisions")]
mod gripper {
    use super::*;
    use parry3d::math::{Isometry, Point, Vector};
    use parry3d::query::PointQuery;
    use parry3d::shape::Cuboid;

    /// Gripper approximated by a box placed in the end effector frame. Every object location
    /// inside the box, at the candidate pose or at any waypoint of the candidate path, lowers
    /// the likelihood by `exp(-penalty)`.
    pub struct GripperClearance {
        pub shape: Cuboid,
        /// Box centre in the end effector frame
        pub offset: Pose,
        pub penalty: f64,
        /// Check the waypoints of the path as well as the final pose
        pub check_path: bool,
    }

    impl GripperClearance {
        pub fn new(half_extents: [f32; 3], offset: Pose, penalty: f64) -> Self {
            Self {
                shape: Cuboid::new(Vector::new(half_extents[0], half_extents[1], half_extents[2])),
                offset,
                penalty,
                check_path: true,
            }
        }

        fn inside_count(&self, pose: &Pose, locations: &[Point3<f64>]) -> usize {
            let shape_pose: Isometry<f32> = (pose * self.offset).cast::<f32>();
            locations
                .iter()
                .filter(|p| {
                    let point: Point<f32> = p.cast::<f32>();
                    self.shape.contains_point(&shape_pose, &point)
                })
                .count()
        }
    }

    impl CollisionModel for GripperClearance {
        fn evaluate(&self, pose: &Pose, path: &[Waypoint], locations: &[Point3<f64>]) -> f64 {
            let mut inside = self.inside_count(pose, locations);
            if self.check_path {
                // The last waypoints approach from outside, the first one is the grasp itself
                inside += path
                    .iter()
                    .skip(1)
                    .map(|waypoint| self.inside_count(&waypoint.frame, locations))
                    .sum::<usize>();
            }
            (-self.penalty * inside as f64).exp()
        }
    }
}
