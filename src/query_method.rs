//! Query methods fit the contact model of one training type to the perceived object and
//! return the resulting contact frame density.
//!
//! The builder looks the method up by training type, falling back to [`ID_ANY`].

use crate::error::{GraspError, GraspResult};
use crate::pose::{Kernel, RBDist};
use crate::training::{ObjectFeatures, TrainingData};
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Catch-all registry key.
pub const ID_ANY: &str = "Any";

/// Contact model fitting for one training type.
pub trait QueryMethod: Send {
    /// Forget the previous fit.
    fn clear(&mut self);

    /// Fit the recorded contacts against the perceived features. Both are in model object
    /// coordinates. Returns false if nothing usable could be fitted.
    fn create(&mut self, training: &[TrainingData], features: &ObjectFeatures) -> GraspResult<bool>;

    /// Fitted contact frame kernels, model object coordinates.
    fn poses(&self) -> &[Kernel];

    /// Confidence of the fit, the prior weight of the resulting query density.
    fn weight(&self) -> f64;
}

/// Query methods by training type.
pub type QueryRegistry = BTreeMap<String, Box<dyn QueryMethod>>;

/// Parameters of [`ContactQuery`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactQueryParams {
    /// Standard deviation of the contact kernels.
    pub std_dev: RBDist,
    /// Distance scale at that a contact loses support of the perceived features, metres.
    pub feature_std_dev: f64,
    /// Normalized kernel cut off.
    pub dist_max: f64,
}

impl Default for ContactQueryParams {
    fn default() -> Self {
        Self {
            std_dev: RBDist::new(0.01, 0.05),
            feature_std_dev: 0.01,
            dist_max: 10.0,
        }
    }
}

/// Every recorded contact frame becomes a kernel. The kernel weight is the contact weight
/// times its support `exp(-d² / 2σ²)`, `d` being the distance to the nearest perceived
/// feature point. The fit confidence is the mean support.
pub struct ContactQuery {
    pub params: ContactQueryParams,
    poses: Vec<Kernel>,
    weight: f64,
}

impl ContactQuery {
    pub fn new(params: ContactQueryParams) -> Self {
        Self {
            params,
            poses: Vec::new(),
            weight: 0.0,
        }
    }

    /// Registry with one contact query per configured type.
    pub fn registry(params: &BTreeMap<String, ContactQueryParams>) -> QueryRegistry {
        params
            .iter()
            .map(|(type_name, p)| (type_name.clone(), Box::new(ContactQuery::new(*p)) as Box<dyn QueryMethod>))
            .collect()
    }

    fn feature_tree(features: &ObjectFeatures) -> GraspResult<KdTree<f64, usize, [f64; 3]>> {
        let mut tree = KdTree::with_capacity(3, features.points.len().max(1));
        for (index, p) in features.points.iter().enumerate() {
            tree.add([p.x, p.y, p.z], index)
                .map_err(|e| GraspError::Precondition(format!("invalid feature point {}: {:?}", index, e)))?;
        }
        Ok(tree)
    }
}

impl QueryMethod for ContactQuery {
    fn clear(&mut self) {
        self.poses.clear();
        self.weight = 0.0;
    }

    fn create(&mut self, training: &[TrainingData], features: &ObjectFeatures) -> GraspResult<bool> {
        if features.points.is_empty() {
            return Err(GraspError::Precondition("no perceived object features".into()));
        }
        let tree = Self::feature_tree(features)?;
        let cov = self.params.std_dev.squared();
        let variance = 2.0 * self.params.feature_std_dev * self.params.feature_std_dev;
        let dist_max = self.params.dist_max;

        let contacts: Vec<_> = training.iter().flat_map(|data| data.contacts.iter()).collect();
        if contacts.is_empty() {
            return Ok(false);
        }

        let supported: Vec<(Kernel, f64)> = contacts
            .par_iter()
            .map(|contact| {
                let p = contact.frame.translation.vector;
                let nearest = tree
                    .nearest(&[p.x, p.y, p.z], 1, &squared_euclidean)
                    .ok()
                    .and_then(|found| found.first().map(|(d2, _)| *d2))
                    .unwrap_or(f64::INFINITY);
                let support = (-nearest / variance).exp();
                let kernel = Kernel::new(contact.frame, cov, dist_max, contact.weight * support);
                (kernel, support)
            })
            .collect();

        let total_support: f64 = supported.iter().map(|(_, support)| support).sum();
        self.weight = total_support / supported.len() as f64;
        self.poses = supported
            .into_iter()
            .map(|(kernel, _)| kernel)
            .filter(|kernel| kernel.weight > 0.0)
            .collect();

        Ok(!self.poses.is_empty() && self.weight > 0.0)
    }

    fn poses(&self) -> &[Kernel] {
        &self.poses
    }

    fn weight(&self) -> f64 {
        self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematic_traits::Pose;
    use crate::training::Contact;
    use nalgebra::{Point3, Translation3, UnitQuaternion};

    fn contact_at(x: f64, weight: f64) -> Contact {
        Contact::new(Pose::from_parts(Translation3::new(x, 0.0, 0.0), UnitQuaternion::identity()), weight)
    }

    fn demo(contacts: Vec<Contact>) -> TrainingData {
        TrainingData {
            state: [0.0; 6],
            contacts,
            frame: Pose::identity(),
            locations: vec![],
        }
    }

    #[test]
    fn test_supported_contacts_weigh_more() {
        let mut query = ContactQuery::new(ContactQueryParams::default());
        let features = ObjectFeatures::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.001, 0.0, 0.0)]);
        let training = [demo(vec![contact_at(0.0, 1.0), contact_at(0.02, 1.0)])];

        assert!(query.create(&training, &features).unwrap());
        let poses = query.poses();
        assert_eq!(poses.len(), 2);
        assert!(poses[0].weight > poses[1].weight);
        assert!(query.weight() > 0.0 && query.weight() <= 1.0);
    }

    #[test]
    fn test_unsupported_contacts_are_dropped() {
        let mut query = ContactQuery::new(ContactQueryParams::default());
        let features = ObjectFeatures::new(vec![Point3::new(0.0, 0.0, 0.0)]);
        // 10 m away, support underflows to zero
        let training = [demo(vec![contact_at(10.0, 1.0)])];
        assert!(!query.create(&training, &features).unwrap());
        assert!(query.poses().is_empty());
    }

    #[test]
    fn test_no_contacts_and_clear() {
        let mut query = ContactQuery::new(ContactQueryParams::default());
        let features = ObjectFeatures::new(vec![Point3::origin()]);
        assert!(query.create(&[demo(vec![contact_at(0.0, 1.0)])], &features).unwrap());
        query.clear();
        assert!(query.poses().is_empty());
        assert_eq!(query.weight(), 0.0);
        assert!(!query.create(&[demo(vec![])], &features).unwrap());
    }

    #[test]
    fn test_no_features() {
        let mut query = ContactQuery::new(ContactQueryParams::default());
        let result = query.create(&[demo(vec![contact_at(0.0, 1.0)])], &ObjectFeatures::default());
        assert!(matches!(result, Err(GraspError::Precondition(_))));
    }

    #[test]
    fn test_registry() {
        let mut params = BTreeMap::new();
        params.insert(ID_ANY.to_string(), ContactQueryParams::default());
        params.insert("pinch".to_string(), ContactQueryParams::default());
        let registry = ContactQuery::registry(&params);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains_key(ID_ANY));
    }
}
