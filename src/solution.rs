//! Query densities and candidate solutions, the collections a session owns.

use crate::kinematic_traits::{Path, Pose};
use crate::pose::{Kernel, mixture_density};
use crate::sample_set::Weighted;
use nalgebra::Point3;
use std::cmp::Ordering;

/// Query density of one training type: where the grasp contacts are expected on the perceived
/// object (`object`) and where the end effector should travel along the approach (`pose`).
#[derive(Debug, Clone, PartialEq)]
pub struct Density {
    pub type_name: String,
    /// Contact frames in the query object frame, normalized.
    pub object: Vec<Kernel>,
    /// End effector poses along the interpolated contact to approach path, normalized.
    pub pose: Vec<Kernel>,
    /// Path template, waypoints relative to `frame`.
    pub path: Path,
    /// Object locations expressed in `origin`.
    pub locations: Vec<Point3<f64>>,
    /// End effector frame `locations` are expressed in.
    pub origin: Pose,
    /// End effector frame at contact time.
    pub frame: Pose,
    pub weight: f64,
    pub cdf: f64,
}

impl Density {
    /// Object locations in world coordinates.
    pub fn world_locations(&self) -> Vec<Point3<f64>> {
        self.locations.iter().map(|p| self.origin * p).collect()
    }

    /// Density of the contact kernels at `pose`.
    pub fn contact_density(&self, pose: &Pose) -> f64 {
        mixture_density(&self.object, pose)
    }

    /// Density of the approach kernels at `pose`.
    pub fn pose_density(&self, pose: &Pose) -> f64 {
        mixture_density(&self.pose, pose)
    }
}

impl Weighted for Density {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    fn cdf(&self) -> f64 {
        self.cdf
    }

    fn set_cdf(&mut self, cdf: f64) {
        self.cdf = cdf;
    }
}

/// Likelihood break down of a solution. Larger is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Likelihood {
    pub contact: f64,
    pub pose: f64,
    pub collision: f64,
    /// contact * pose * collision, `f64::NEG_INFINITY` until all terms are valid.
    pub likelihood: f64,
}

impl Likelihood {
    pub const UNDEFINED: Likelihood = Likelihood {
        contact: 0.0,
        pose: 0.0,
        collision: 0.0,
        likelihood: f64::NEG_INFINITY,
    };

    /// Combine the terms, None if any of them is negative or not finite.
    pub fn new(contact: f64, pose: f64, collision: f64) -> Option<Self> {
        fn valid(x: f64) -> bool {
            x.is_finite() && x >= 0.0
        }
        if !(valid(contact) && valid(pose) && valid(collision)) {
            return None;
        }
        Some(Self {
            contact,
            pose,
            collision,
            likelihood: contact * pose * collision,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.likelihood.is_finite()
    }
}

impl Default for Likelihood {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

/// One candidate grasp.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub type_name: String,
    /// Index of the density this solution was sampled from
    pub query_index: usize,
    /// Optimized end effector pose
    pub pose: Pose,
    /// Candidate trajectory, template moved into `pose`
    pub path: Path,
    pub likelihood: Likelihood,
}

impl Solution {
    /// Ranking order: ascending query index, then descending likelihood.
    pub fn rank_cmp(&self, other: &Solution) -> Ordering {
        self.query_index.cmp(&other.query_index).then_with(|| {
            other
                .likelihood
                .likelihood
                .total_cmp(&self.likelihood.likelihood)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_likelihood_validity() {
        let l = Likelihood::new(0.5, 0.4, 1.0).expect("valid");
        assert!((l.likelihood - 0.2).abs() < 1e-12);
        assert!(l.is_valid());

        assert!(Likelihood::new(-0.1, 0.4, 1.0).is_none());
        assert!(Likelihood::new(0.5, f64::NAN, 1.0).is_none());
        assert!(Likelihood::new(0.5, 0.4, f64::INFINITY).is_none());
        assert!(!Likelihood::UNDEFINED.is_valid());
        assert_eq!(Likelihood::default(), Likelihood::UNDEFINED);
    }

    fn solution(query_index: usize, likelihood: f64) -> Solution {
        Solution {
            type_name: "any".into(),
            query_index,
            pose: Pose::identity(),
            path: vec![],
            likelihood: Likelihood {
                likelihood,
                ..Likelihood::UNDEFINED
            },
        }
    }

    #[test]
    fn test_rank_cmp() {
        assert_eq!(solution(0, 0.1).rank_cmp(&solution(1, 0.9)), Ordering::Less);
        assert_eq!(solution(0, 0.9).rank_cmp(&solution(0, 0.1)), Ordering::Less);
        assert_eq!(
            solution(0, f64::NEG_INFINITY).rank_cmp(&solution(0, 0.0)),
            Ordering::Greater
        );
    }
}
