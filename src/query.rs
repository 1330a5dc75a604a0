//! Query densities for the perceived object, one per training type.

use crate::error::{GraspError, GraspResult};
use crate::kinematic_traits::{Manipulator, Pose};
use crate::pose::{Kernel, pose_distance};
use crate::pose_density::{PoseDensityParams, PoseDensityRegistry, PoseKernelDensity};
use crate::query_method::{ID_ANY, QueryMethod, QueryRegistry};
use crate::sample_set::normalize;
use crate::solution::Density;
use crate::training::{ObjectFeatures, ObjectShape, TrainingStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds query densities. Registries are injected, each type falls back to [`ID_ANY`].
pub struct QueryBuilder {
    pub manipulator: Arc<dyn Manipulator>,
    queries: QueryRegistry,
    pose_densities: PoseDensityRegistry,
    /// Normalized kernel cut off of the pose densities.
    pub dist_max: f64,
}

impl QueryBuilder {
    pub fn new(
        manipulator: Arc<dyn Manipulator>,
        queries: QueryRegistry,
        pose_densities: PoseDensityRegistry,
        dist_max: f64,
    ) -> Self {
        Self {
            manipulator,
            queries,
            pose_densities,
            dist_max,
        }
    }

    /// Create query densities for every training type. Types that fail are logged and skipped.
    /// The returned densities are normalized against each other.
    ///
    /// * `model` - object shape the training data refers to
    /// * `query` - perceived object shape
    /// * `features` - perceived features, world coordinates
    /// * `end_effector` - current end effector frame, object locations are expressed in it
    pub fn create_query(
        &mut self,
        training: &TrainingStore,
        model: Option<&ObjectShape>,
        query: Option<&ObjectShape>,
        features: &ObjectFeatures,
        end_effector: &Pose,
    ) -> GraspResult<Vec<Density>> {
        if training.is_empty() {
            return Err(GraspError::Precondition("no training data".into()));
        }
        let model = model
            .filter(|shape| shape.is_known())
            .ok_or_else(|| GraspError::Precondition("unknown model object shape".into()))?;
        let query = query
            .filter(|shape| shape.is_known())
            .ok_or_else(|| GraspError::Precondition("unknown query object shape".into()))?;
        if !self.queries.contains_key(ID_ANY) {
            return Err(GraspError::Precondition(format!("no default query method \"{}\"", ID_ANY)));
        }
        if !self.pose_densities.contains_key(ID_ANY) {
            return Err(GraspError::Precondition(format!(
                "no default pose density parameters \"{}\"",
                ID_ANY
            )));
        }

        // model object coordinates to query object coordinates
        let trn = query.frame * model.frame.inverse();
        let trn_inv = trn.inverse();
        let model_features = ObjectFeatures::new(features.points.iter().map(|p| trn_inv * p).collect());
        let origin_inv = end_effector.inverse();

        let mut densities = Vec::new();
        let types: Vec<String> = training.types().map(|t| t.to_string()).collect();
        for type_name in &types {
            match self.create_density(training, type_name, &trn, &model_features, end_effector, &origin_inv) {
                Ok(density) => {
                    debug!(
                        "{}: {} object kernels, {} pose kernels, weight {:.4}",
                        type_name,
                        density.object.len(),
                        density.pose.len(),
                        density.weight
                    );
                    densities.push(density);
                }
                Err(err) => warn!("{}: skipped, {}", type_name, err),
            }
        }

        if densities.is_empty() {
            return Err(GraspError::NoQuery);
        }
        normalize(&mut densities).map_err(|_| GraspError::NoQuery)?;
        info!("Created {} query densities from {} training types", densities.len(), types.len());
        Ok(densities)
    }

    fn create_density(
        &mut self,
        training: &TrainingStore,
        type_name: &str,
        trn: &Pose,
        features: &ObjectFeatures,
        origin: &Pose,
        origin_inv: &Pose,
    ) -> GraspResult<Density> {
        let data = training.get(type_name);
        let params: PoseDensityParams = *self
            .pose_densities
            .get(type_name)
            .or_else(|| self.pose_densities.get(ID_ANY))
            .ok_or_else(|| GraspError::Invariant("default pose density parameters vanished".into()))?;

        let query = self.query_method(type_name)?;
        query.clear();
        if !query.create(data, features)? {
            return Err(GraspError::Precondition(format!("query method rejected {}", type_name)));
        }
        let weight = query.weight();
        let mut object: Vec<Kernel> = query
            .poses()
            .iter()
            .map(|kernel| Kernel {
                pose: trn * kernel.pose,
                ..*kernel
            })
            .collect();
        normalize(&mut object)?;

        let trajectory = training
            .trajectory(type_name)
            .filter(|waypoints| waypoints.len() >= 2)
            .ok_or_else(|| {
                GraspError::Precondition(format!("{} has no trajectory with at least 2 waypoints", type_name))
            })?;
        let pose = PoseKernelDensity::create(self.manipulator.as_ref(), trajectory, trn, &params, self.dist_max)?;

        let cov_inv = params.std_dev.squared().inverse();
        let distance = move |a: &Pose, b: &Pose| {
            let d = pose_distance(a, b);
            cov_inv.lin * d.lin * d.lin + cov_inv.ang * d.ang
        };
        let template = self.manipulator.create_path(trajectory, &distance)?;
        // Template in query coordinates, starting at the contact frame
        let frame = pose.contact;
        let to_contact = frame * template[0].frame.inverse();
        let path = self.manipulator.transform_path(&template, &to_contact);

        let locations = data
            .iter()
            .flat_map(|d| d.locations.iter())
            .map(|p| origin_inv * (trn * p))
            .collect();

        Ok(Density {
            type_name: type_name.to_string(),
            object,
            pose: pose.kernels,
            path,
            locations,
            origin: *origin,
            frame,
            weight,
            cdf: 0.0,
        })
    }

    fn query_method(&mut self, type_name: &str) -> GraspResult<&mut Box<dyn QueryMethod>> {
        let key = if self.queries.contains_key(type_name) {
            type_name
        } else {
            ID_ANY
        };
        self.queries
            .get_mut(key)
            .ok_or_else(|| GraspError::Invariant("default query method vanished".into()))
    }
}
