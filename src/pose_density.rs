//! End effector pose density along a demonstrated approach.
//!
//! The first two waypoints of a demonstration, contact and approach, are mapped into the
//! query object frame. Kernels are placed on the line through both frames (linear in position,
//! geodesic in orientation), centred at the segment midpoint and spread on either side by
//! `path_dist`. Kernels further from the midpoint weigh exponentially less.

use crate::error::{GraspError, GraspResult};
use crate::kinematic_traits::{Joints, Manipulator, Pose};
use crate::pose::{Kernel, RBDist, pose_distance};
use crate::sample_set::normalize;
use nalgebra::{Translation3, UnitQuaternion};
use std::collections::BTreeMap;

/// Frame distance components below this make the density undefined.
pub const FRAME_DIST_EPS: f64 = 1e-7;

/// Pose density parameters of one training type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseDensityParams {
    /// Kernel standard deviation.
    pub std_dev: RBDist,
    /// Requested number of kernels, at least 3 are always created.
    pub kernels: usize,
    /// How far kernels spread on either side of the segment midpoint, metres.
    pub path_dist: f64,
    /// Exponential decay of the kernel weight with the normalized offset.
    pub path_dist_std_dev: f64,
}

impl Default for PoseDensityParams {
    fn default() -> Self {
        Self {
            std_dev: RBDist::new(0.005, 0.02),
            kernels: 21,
            path_dist: 0.05,
            path_dist_std_dev: 1.0,
        }
    }
}

/// Pose density parameters by training type, must contain "Any".
pub type PoseDensityRegistry = BTreeMap<String, PoseDensityParams>;

/// Built pose density of one training type.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseKernelDensity {
    /// Contact frame in the query object frame.
    pub contact: Pose,
    /// Approach frame in the query object frame.
    pub approach: Pose,
    pub kernels: Vec<Kernel>,
}

impl PoseKernelDensity {
    /// Build the density from the first two waypoints of `trajectory`, moved by `trn`
    /// (query frame times inverse model frame).
    pub fn create(
        manipulator: &dyn Manipulator,
        trajectory: &[Joints],
        trn: &Pose,
        params: &PoseDensityParams,
        dist_max: f64,
    ) -> GraspResult<Self> {
        if trajectory.len() < 2 {
            return Err(GraspError::Precondition(format!(
                "pose density requires contact and approach waypoints, {} given",
                trajectory.len()
            )));
        }
        let cov = params.std_dev.squared();
        if !cov.is_positive() {
            return Err(GraspError::Precondition(format!(
                "pose density standard deviation must be positive, got {:?}",
                params.std_dev
            )));
        }

        let contact = trn * manipulator.forward(&trajectory[0]);
        let approach = trn * manipulator.forward(&trajectory[1]);

        let frame_dist = pose_distance(&contact, &approach);
        if frame_dist.lin < FRAME_DIST_EPS || frame_dist.ang < FRAME_DIST_EPS {
            return Err(GraspError::DegenerateTrajectory {
                lin: frame_dist.lin,
                ang: frame_dist.ang,
            });
        }

        let range = (params.kernels / 2).max(1) as i64;
        let extent = params.path_dist / frame_dist.lin;
        let mut kernels = Vec::with_capacity(2 * range as usize + 1);
        for i in -range..=range {
            let t = i as f64 / range as f64;
            let s = 0.5 + t * extent;
            let weight = (-t.abs() * params.path_dist_std_dev).exp();
            kernels.push(Kernel::new(interpolate(&contact, &approach, s), cov, dist_max, weight));
        }
        normalize(&mut kernels)?;

        Ok(Self {
            contact,
            approach,
            kernels,
        })
    }
}

/// Pose at `s` along the line through `a` (s = 0) and `b` (s = 1). Values outside [0, 1]
/// extrapolate, in orientation along the same geodesic.
pub fn interpolate(a: &Pose, b: &Pose, s: f64) -> Pose {
    let position = a.translation.vector + (b.translation.vector - a.translation.vector) * s;
    let delta = a.rotation.inverse() * b.rotation;
    let rotation = a.rotation * UnitQuaternion::from_scaled_axis(delta.scaled_axis() * s);
    Pose::from_parts(Translation3::from(position), rotation)
}
