//! Session data and the pipeline operating on it.
//!
//! A [`Session`] owns the training data, the object shapes and every collection produced
//! from them. [`GraspPipeline`] runs the steps of a grasp query against a session: create the
//! query densities, generate solutions, sort them and select one trajectory. Each step replaces
//! the affected collection as a whole and leaves the session untouched on failure.

use crate::collision::{CollisionModel, NoCollision};
use crate::config::GraspConfig;
use crate::error::GraspResult;
use crate::kinematic_traits::{Manipulator, Path, Pose};
use crate::optimizer::{OptimizerStats, SolutionOptimizer};
use crate::pose::pose_distance;
use crate::query::QueryBuilder;
use crate::query_method::{ContactQuery, QueryRegistry};
use crate::ranker::{CandidateObserver, SolutionRanker, TrajectoryScore};
use crate::solution::{Density, Solution};
use crate::training::{ObjectFeatures, ObjectShape, TrainingStore, trajectory_name};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub training: TrainingStore,
    /// Object shape the training data refers to
    pub model: Option<ObjectShape>,
    /// Perceived object shape
    pub query: Option<ObjectShape>,
    pub densities: Vec<Density>,
    pub solutions: Vec<Solution>,
    /// Selected trajectories by published name
    pub trajectories: BTreeMap<String, Path>,
}

impl Session {
    pub fn new(training: TrainingStore, model: ObjectShape) -> Self {
        Self {
            training,
            model: Some(model),
            ..Default::default()
        }
    }

    /// Forget densities, solutions and published trajectories.
    pub fn clear_query(&mut self) {
        self.densities.clear();
        self.solutions.clear();
        self.trajectories.clear();
    }
}

pub struct GraspPipeline {
    pub config: GraspConfig,
    pub manipulator: Arc<dyn Manipulator>,
    pub builder: QueryBuilder,
    pub optimizer: SolutionOptimizer,
    pub ranker: SolutionRanker,
    pub collision: Box<dyn CollisionModel>,
}

impl GraspPipeline {
    /// Pipeline with contact queries from the configuration and collision checking disabled.
    pub fn new(config: GraspConfig, manipulator: Arc<dyn Manipulator>) -> GraspResult<Self> {
        let queries = ContactQuery::registry(&config.contact_queries);
        Self::with_parts(config, manipulator, queries, Box::new(NoCollision))
    }

    pub fn with_parts(
        config: GraspConfig,
        manipulator: Arc<dyn Manipulator>,
        queries: QueryRegistry,
        collision: Box<dyn CollisionModel>,
    ) -> GraspResult<Self> {
        config.validate()?;
        let builder = QueryBuilder::new(
            manipulator.clone(),
            queries,
            config.pose_densities.clone(),
            config.dist_max,
        );
        Ok(Self {
            optimizer: SolutionOptimizer::new(config.optimizer),
            ranker: SolutionRanker::new(config.ranker),
            config,
            manipulator,
            builder,
            collision,
        })
    }

    /// Build the query densities of the perceived object. Previous solutions and published
    /// trajectories are discarded.
    pub fn create_query(
        &mut self,
        session: &mut Session,
        features: &ObjectFeatures,
        end_effector: &Pose,
    ) -> GraspResult<()> {
        let densities = self.builder.create_query(
            &session.training,
            session.model.as_ref(),
            session.query.as_ref(),
            features,
            end_effector,
        )?;
        session.densities = densities;
        session.solutions.clear();
        session.trajectories.clear();
        Ok(())
    }

    pub fn generate_solutions(&self, session: &mut Session) -> GraspResult<OptimizerStats> {
        let generation =
            self.optimizer
                .generate_solutions(&session.densities, self.manipulator.as_ref(), self.collision.as_ref())?;
        session.solutions = generation.solutions;
        session.trajectories.clear();
        Ok(generation.stats)
    }

    pub fn sort_solutions(&self, session: &mut Session) -> GraspResult<()> {
        self.ranker.sort_solutions(&mut session.solutions)
    }

    /// Select the best solution and publish its path under "<prefix>-<type>".
    pub fn select_trajectory<F>(
        &self,
        session: &mut Session,
        observer: &mut dyn CandidateObserver,
        evaluator: F,
    ) -> GraspResult<(usize, TrajectoryScore)>
    where
        F: FnMut(usize, &Solution) -> TrajectoryScore,
    {
        let (index, score) = self.ranker.select_trajectory(&session.solutions, observer, evaluator)?;
        let solution = &session.solutions[index];
        let name = trajectory_name(&self.config.trajectory_prefix, &solution.type_name);
        info!("Publishing {} with {} waypoints", name, solution.path.len());
        session.trajectories.insert(name, solution.path.clone());
        Ok((index, score))
    }

    /// Distance from `from` to the start of the approach of `solution` (the last waypoint),
    /// colliding if the collision model gives less than one half.
    pub fn reach_score(&self, session: &Session, solution: &Solution, from: &Pose) -> TrajectoryScore {
        let start = solution.path.last().map(|w| w.frame).unwrap_or(solution.pose);
        let distance = pose_distance(from, &start);
        let locations = session
            .densities
            .get(solution.query_index)
            .map(|density| density.world_locations())
            .unwrap_or_default();
        let collision = self.collision.evaluate(&solution.pose, &solution.path, &locations);
        TrajectoryScore::new(distance.lin, distance.ang, collision < 0.5)
    }
}
