//! Grasp query engine for pick-and-place manipulation
//!
//! Given recorded grasp demonstrations (training data) and a perceived object, this crate builds
//! per training type probabilistic models of where to grasp (query densities), samples and refines
//! candidate grasp trajectories by parallel simulated annealing, ranks them and selects one
//! trajectory for execution.
//!
//! # Features
//!
//! - Weighted sample sets with cumulative distribution and binary search sampling.
//! - Pose kernel densities over rigid body poses, with a paired linear/angular distance.
//! - Query densities combining a contact density on the perceived object with an end effector
//!   pose density along the demonstrated approach.
//! - Deterministic parallel solution generation: results depend on the seed only, not on
//!   the number of threads.
//! - Ranking with per density cluster cap, trajectory selection preferring collision free
//!   candidates.
//! - Query methods, pose density parameters and the collision term are injected, not global.
//! - Optional YAML configuration (`allow_filesystem`) and box gripper clearance check
//!   (`collisions`, uses parry3d).
//!
//! # Pipeline
//!
//! ```text
//! TrainingStore + ObjectShape (model, query) + ObjectFeatures
//!     -> QueryBuilder::create_query           Vec<Density>
//!     -> SolutionOptimizer::generate_solutions Vec<Solution>
//!     -> SolutionRanker::sort_solutions
//!     -> SolutionRanker::select_trajectory     (index, TrajectoryScore)
//! ```
//!
//! [`session::GraspPipeline`] runs these steps over a [`session::Session`]. The library logs
//! through `tracing` and never installs a subscriber.

pub mod error;

#[path = "utils/utils.rs"]
pub mod utils;
pub mod kinematic_traits;
pub mod kinematics_impl;

pub mod pose;
pub mod sample_set;

pub mod training;
pub mod solution;

pub mod query_method;
pub mod pose_density;
pub mod query;

pub mod collision;
pub mod optimizer;
pub mod ranker;

pub mod config;
pub mod session;

#[cfg(test)]
mod tests;
