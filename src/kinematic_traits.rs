//! Manipulator abstraction consumed by the grasp core.

extern crate nalgebra as na;

use crate::error::{GraspError, GraspResult};
use na::Isometry3;

/// Pose is used a pose of the end effector. It contains both Cartesian position and rotation quaternion
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Arm configuration, six joint angles in radians.
pub type Joints = [f64; 6];

/// One waypoint of a configuration space path, with its end effector frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub joints: Joints,

    /// End effector frame reached at this waypoint.
    pub frame: Pose,

    /// Cumulative distance from the first waypoint, as measured by the metric the path
    /// was created with.
    pub distance: f64,
}

/// Path template or candidate trajectory.
pub type Path = Vec<Waypoint>;

/// Kinematic abstraction of the arm and hand.
pub trait Manipulator: Send + Sync {
    /// End effector frame for the given configuration, base and tool included.
    fn forward(&self, joints: &Joints) -> Pose;

    /// Frame of the manipulator base in the world.
    fn base_frame(&self) -> Pose;

    /// Create path template from the recorded waypoints. Each waypoint receives its forward
    /// kinematics frame and the cumulative `distance` between consecutive frames.
    fn create_path(
        &self,
        waypoints: &[Joints],
        distance: &dyn Fn(&Pose, &Pose) -> f64,
    ) -> GraspResult<Path> {
        if waypoints.len() < 2 {
            return Err(GraspError::Precondition(format!(
                "path template requires at least 2 waypoints, {} given",
                waypoints.len()
            )));
        }
        let mut path: Path = Vec::with_capacity(waypoints.len());
        for joints in waypoints {
            let frame = self.forward(joints);
            let travelled = match path.last() {
                Some(previous) => previous.distance + distance(&previous.frame, &frame),
                None => 0.0,
            };
            if !travelled.is_finite() {
                return Err(GraspError::Precondition(
                    "path distance metric returned non finite value".into(),
                ));
            }
            path.push(Waypoint {
                joints: *joints,
                frame,
                distance: travelled,
            });
        }
        Ok(path)
    }

    /// Move all waypoint frames by `trn` (applied on the left, in world coordinates).
    /// Joint values are kept as hints for the inverse kinematics of the executor.
    fn transform_path(&self, path: &[Waypoint], trn: &Pose) -> Path {
        path.iter()
            .map(|waypoint| Waypoint {
                frame: trn * waypoint.frame,
                ..*waypoint
            })
            .collect()
    }
}

/// Linear scan over `count` candidates, returning the index and the value of the smallest
/// one. Ties keep the earliest candidate. None if `count` is zero.
pub fn find<T, F>(count: usize, mut evaluator: F) -> Option<(usize, T)>
where
    T: PartialOrd,
    F: FnMut(usize) -> T,
{
    let mut best: Option<(usize, T)> = None;
    for index in 0..count {
        let value = evaluator(index);
        let better = match &best {
            Some((_, current)) => value < *current,
            None => true,
        };
        if better {
            best = Some((index, value));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    /// Moves along x by the first joint only
    struct Slider;

    impl Manipulator for Slider {
        fn forward(&self, joints: &Joints) -> Pose {
            Pose::from_parts(Translation3::new(joints[0], 0.0, 0.0), UnitQuaternion::identity())
        }

        fn base_frame(&self) -> Pose {
            Pose::identity()
        }
    }

    fn lin(a: &Pose, b: &Pose) -> f64 {
        (a.translation.vector - b.translation.vector).norm()
    }

    #[test]
    fn test_create_path_distances() {
        let waypoints = [[0.0; 6], [0.5, 0.0, 0.0, 0.0, 0.0, 0.0], [1.5, 0.0, 0.0, 0.0, 0.0, 0.0]];
        let path = Slider.create_path(&waypoints, &lin).expect("path");
        assert_eq!(path.len(), 3);
        assert_eq!(path[0].distance, 0.0);
        assert!((path[1].distance - 0.5).abs() < 1e-12);
        assert!((path[2].distance - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_create_path_too_short() {
        let result = Slider.create_path(&[[0.0; 6]], &lin);
        assert!(matches!(result, Err(GraspError::Precondition(_))));
    }

    #[test]
    fn test_transform_path() {
        let waypoints = [[0.0; 6], [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]];
        let path = Slider.create_path(&waypoints, &lin).unwrap();
        let trn = Pose::from_parts(Translation3::new(0.0, 2.0, 0.0), UnitQuaternion::identity());
        let moved = Slider.transform_path(&path, &trn);
        assert_eq!(moved[1].frame.translation.vector.y, 2.0);
        assert_eq!(moved[1].joints, path[1].joints);
        assert_eq!(moved[1].distance, path[1].distance);
    }

    #[test]
    fn test_find() {
        let values = [3.0, 1.0, 2.0, 1.0];
        assert_eq!(find(values.len(), |i| values[i]), Some((1, 1.0)));
        assert_eq!(find(0, |i| values[i]), None);
    }
}
