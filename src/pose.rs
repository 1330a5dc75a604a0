//! Rigid body poses with diagonal covariance, and the kernels built from them.
//!
//! A kernel is one weighted sample of a pose density. Density is evaluated with the
//! normalized squared distance
//!
//! `d = cov_inv.lin * |p - q|² + cov_inv.ang * (1 - |<qa, qb>|)`
//!
//! contributing `weight * exp(-d)` while `d` stays below `dist_max`, and nothing beyond.

use crate::kinematic_traits::Pose;
use std::ops::{Add, Mul};

/// Paired linear and angular quantity. Serves as distance between two poses and as
/// diagonal covariance (variances) of a pose kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RBDist {
    pub lin: f64,
    pub ang: f64,
}

impl RBDist {
    pub const fn new(lin: f64, ang: f64) -> Self {
        Self { lin, ang }
    }

    /// Both components finite and strictly positive, as required from variances.
    pub fn is_positive(&self) -> bool {
        self.lin.is_finite() && self.ang.is_finite() && self.lin > 0.0 && self.ang > 0.0
    }

    pub fn sqrt(&self) -> Self {
        Self::new(self.lin.sqrt(), self.ang.sqrt())
    }

    /// Component-wise square, converts standard deviation into variance.
    pub fn squared(&self) -> Self {
        Self::new(self.lin * self.lin, self.ang * self.ang)
    }

    /// Component-wise reciprocal, converts covariance into inverse covariance.
    pub fn inverse(&self) -> Self {
        Self::new(1.0 / self.lin, 1.0 / self.ang)
    }
}

impl Add for RBDist {
    type Output = RBDist;

    fn add(self, rhs: RBDist) -> RBDist {
        RBDist::new(self.lin + rhs.lin, self.ang + rhs.ang)
    }
}

impl Mul<f64> for RBDist {
    type Output = RBDist;

    fn mul(self, rhs: f64) -> RBDist {
        RBDist::new(self.lin * rhs, self.ang * rhs)
    }
}

/// Linear distance is Euclidean, angular is `1 - |<qa, qb>|` (zero for the same orientation,
/// one for orientations 180 degrees apart).
pub fn pose_distance(a: &Pose, b: &Pose) -> RBDist {
    let lin = (a.translation.vector - b.translation.vector).norm();
    let dot = a.rotation.coords.dot(&b.rotation.coords).abs().min(1.0);
    RBDist::new(lin, 1.0 - dot)
}

/// Weighted pose with diagonal covariance, one component of a mixture density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel {
    pub pose: Pose,
    /// Diagonal covariance (variances)
    pub cov: RBDist,
    pub cov_inv: RBDist,
    /// Normalized distance beyond that the kernel does not contribute.
    pub dist_max: f64,
    /// Mixture weight, sums to one after normalization.
    pub weight: f64,
    /// Cumulative weight, set by normalization.
    pub cdf: f64,
}

impl Kernel {
    /// Kernel with covariance `cov` (must be positive, see [`RBDist::is_positive`]).
    pub fn new(pose: Pose, cov: RBDist, dist_max: f64, weight: f64) -> Self {
        Self {
            pose,
            cov,
            cov_inv: cov.inverse(),
            dist_max,
            weight,
            cdf: 0.0,
        }
    }

    /// Standard deviation of the linear and angular components.
    pub fn std_dev(&self) -> RBDist {
        self.cov.sqrt()
    }

    /// Normalized squared distance to `pose`.
    pub fn distance(&self, pose: &Pose) -> f64 {
        let d = pose_distance(&self.pose, pose);
        self.cov_inv.lin * d.lin * d.lin + self.cov_inv.ang * d.ang
    }

    /// Weighted, unnormalized density contribution at `pose`.
    pub fn density(&self, pose: &Pose) -> f64 {
        let d = self.distance(pose);
        if d < self.dist_max {
            self.weight * (-d).exp()
        } else {
            0.0
        }
    }
}

/// Density of the kernel mixture at `pose`.
pub fn mixture_density(kernels: &[Kernel], pose: &Pose) -> f64 {
    kernels.iter().map(|kernel| kernel.density(pose)).sum()
}
