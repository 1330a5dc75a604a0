//! Ranking of generated solutions and selection of the trajectory to execute.

use crate::error::{GraspError, GraspResult};
use crate::kinematic_traits::find;
use crate::solution::Solution;
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankerConfig {
    /// Maximal number of solutions kept per query density.
    pub cluster_size: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self { cluster_size: 10 }
    }
}

/// Quality of a candidate trajectory as reported by the evaluator of
/// [`SolutionRanker::select_trajectory`]. Collision free scores are always better than
/// colliding ones, otherwise smaller `lin + ang` is better. A NaN error ranks after every
/// number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryScore {
    pub lin: f64,
    pub ang: f64,
    pub collides: bool,
}

impl TrajectoryScore {
    pub fn new(lin: f64, ang: f64, collides: bool) -> Self {
        Self { lin, ang, collides }
    }

    pub fn error(&self) -> f64 {
        self.lin + self.ang
    }
}

impl PartialOrd for TrajectoryScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.collides.cmp(&other.collides) {
            Ordering::Equal => Some(match (self.error().is_nan(), other.error().is_nan()) {
                (false, false) => self.error().total_cmp(&other.error()),
                (a, b) => a.cmp(&b),
            }),
            ordering => Some(ordering),
        }
    }
}

/// Notified of every candidate before it is evaluated, typically to display it.
pub trait CandidateObserver {
    fn candidate(&mut self, index: usize, solution: &Solution);
}

/// Nobody is watching.
impl CandidateObserver for () {
    fn candidate(&mut self, _index: usize, _solution: &Solution) {}
}

pub struct SolutionRanker {
    pub config: RankerConfig,
}

impl SolutionRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    /// Sort by query index ascending and likelihood descending, then keep at most
    /// `cluster_size` solutions of every query index.
    pub fn sort_solutions(&self, solutions: &mut Vec<Solution>) -> GraspResult<()> {
        if solutions.is_empty() {
            return Err(GraspError::EmptySolutions);
        }
        let before = solutions.len();
        solutions.sort_by(Solution::rank_cmp);

        let cluster_size = self.config.cluster_size;
        let mut group: Option<usize> = None;
        let mut in_group = 0;
        solutions.retain(|solution| {
            if group != Some(solution.query_index) {
                group = Some(solution.query_index);
                in_group = 0;
            }
            in_group += 1;
            in_group <= cluster_size
        });

        info!("Sorted {} solutions, {} kept", before, solutions.len());
        Ok(())
    }

    /// Evaluate every solution and return the index and score of the best one.
    pub fn select_trajectory<F>(
        &self,
        solutions: &[Solution],
        observer: &mut dyn CandidateObserver,
        mut evaluator: F,
    ) -> GraspResult<(usize, TrajectoryScore)>
    where
        F: FnMut(usize, &Solution) -> TrajectoryScore,
    {
        if solutions.is_empty() {
            return Err(GraspError::EmptySolutions);
        }
        let (index, score) = find(solutions.len(), |index| {
            let solution = &solutions[index];
            observer.candidate(index, solution);
            let score = evaluator(index, solution);
            debug!(
                "trajectory {}: {} lin={:.6} ang={:.6} collides={}",
                index, solution.type_name, score.lin, score.ang, score.collides
            );
            score
        })
        .ok_or(GraspError::EmptySolutions)?;

        info!(
            "Selected trajectory {} of {} ({}), error {:.6}{}",
            index,
            solutions.len(),
            solutions[index].type_name,
            score.error(),
            if score.collides { ", colliding" } else { "" }
        );
        Ok((index, score))
    }
}
