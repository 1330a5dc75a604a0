//! Helper functions

use crate::kinematic_traits::{Joints, Pose};
use crate::solution::Solution;
use nalgebra::{Isometry3, UnitQuaternion};

/// Allows to specify joint values in degrees (converts to radians)
pub fn as_radians(degrees: [i32; 6]) -> Joints {
    std::array::from_fn(|i| (degrees[i] as f64).to_radians())
}

/// Print joint values, converting radians to degrees.
pub fn dump_joints(joints: &Joints) {
    let mut row_str = String::new();
    for joint_idx in 0..6 {
        let computed = joints[joint_idx];
        row_str.push_str(&format!("{:5.2} ", computed.to_degrees()));
    }
    println!("[{}]", row_str.trim_end());
}

pub fn dump_pose(isometry: &Isometry3<f64>) {
    let translation = isometry.translation.vector;
    let rotation: UnitQuaternion<f64> = isometry.rotation;

    println!(
        "x: {:.5}, y: {:.5}, z: {:.5},  quat: {:.5},{:.5},{:.5},{:.5}",
        translation.x, translation.y, translation.z, rotation.i, rotation.j, rotation.k, rotation.w
    );
}

/// Print type, likelihood break down and the optimized pose of the solution.
pub fn dump_solution(index: usize, solution: &Solution) {
    let l = &solution.likelihood;
    println!(
        "#{:03} {} (query {}): L={:.6e} contact={:.6e} pose={:.6e} collision={:.4}, {} waypoints",
        index,
        solution.type_name,
        solution.query_index,
        l.likelihood,
        l.contact,
        l.pose,
        l.collision,
        solution.path.len()
    );
    dump_pose(&solution.pose);
}

pub fn assert_pose_eq(ta: &Pose, tb: &Pose, distance_tolerance: f64, angular_tolerance: f64) -> bool {
    fn bad(ta: &Pose, tb: &Pose) {
        dump_pose(ta);
        dump_pose(tb);
    }

    let translation_distance = (ta.translation.vector - tb.translation.vector).norm();
    let angular_distance = ta.rotation.angle_to(&tb.rotation);

    if translation_distance.abs() > distance_tolerance {
        bad(ta, tb);
        panic!("Poses have too different translations");
    }

    if angular_distance.abs() > angular_tolerance {
        bad(ta, tb);
        panic!("Poses have too different angles");
    }
    true
}
