#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use nalgebra::{Point3, Translation3, UnitQuaternion};

    use crate::error::{ErrorKind, GraspError};
    use crate::kinematic_traits::{Manipulator, Pose};
    use crate::pose_density::{PoseDensityParams, PoseDensityRegistry};
    use crate::query::QueryBuilder;
    use crate::query_method::{ContactQuery, ContactQueryParams, ID_ANY, QueryRegistry};
    use crate::tests::test_utils::{self, APPROACH, CONTACT};
    use crate::training::{ObjectFeatures, ObjectShape, TrainingStore};
    use crate::utils::assert_pose_eq;

    fn queries() -> QueryRegistry {
        ContactQuery::registry(&BTreeMap::from([(ID_ANY.to_string(), ContactQueryParams::default())]))
    }

    fn pose_densities() -> PoseDensityRegistry {
        BTreeMap::from([(ID_ANY.to_string(), PoseDensityParams::default())])
    }

    fn builder() -> QueryBuilder {
        QueryBuilder::new(test_utils::gantry(), queries(), pose_densities(), 10.0)
    }

    fn end_effector() -> Pose {
        Pose::from_parts(Translation3::new(0.3, 0.0, 0.5), UnitQuaternion::identity())
    }

    #[test]
    fn test_create_query_single_type() {
        let training = test_utils::training(&["pinch"]);
        let densities = builder()
            .create_query(
                &training,
                Some(&test_utils::model_shape()),
                Some(&test_utils::query_shape()),
                &test_utils::perceived_features(),
                &end_effector(),
            )
            .expect("query");

        assert_eq!(densities.len(), 1);
        let density = &densities[0];
        assert_eq!(density.type_name, "pinch");
        assert_eq!(density.weight, 1.0);
        assert_eq!(density.cdf, 1.0);
        assert_eq!(density.object.len(), 2);
        assert_eq!(density.pose.len(), 2 * (PoseDensityParams::default().kernels / 2) + 1);

        // Contact frame moved together with the object
        let expected = test_utils::query_frame() * test_utils::Gantry.forward(&CONTACT);
        assert_pose_eq(&density.frame, &expected, 1e-9, 1e-9);
        assert_eq!(density.path.len(), 2);
        assert_pose_eq(&density.path[0].frame, &density.frame, 1e-9, 1e-9);
        let approach = test_utils::query_frame() * test_utils::Gantry.forward(&APPROACH);
        assert_pose_eq(&density.path[1].frame, &approach, 1e-9, 1e-9);

        // The contact pose itself is likely under both densities
        assert!(density.contact_density(&density.frame) > 0.0);
        assert!(density.pose_density(&density.frame) > 0.0);

        // Locations expressed in the end effector frame map back to the moved object
        let world = density.world_locations();
        assert_eq!(world.len(), density.locations.len());
        let first = test_utils::query_frame() * test_utils::top_face()[0];
        assert!((world[0] - first).norm() < 1e-9);
    }

    #[test]
    fn test_densities_compete() {
        let training = test_utils::training(&["pinch", "power"]);
        let densities = builder()
            .create_query(
                &training,
                Some(&test_utils::model_shape()),
                Some(&test_utils::query_shape()),
                &test_utils::perceived_features(),
                &end_effector(),
            )
            .unwrap();
        assert_eq!(densities.len(), 2);
        let total: f64 = densities.iter().map(|d| d.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(densities[0].cdf <= densities[1].cdf);
        assert_eq!(densities[1].cdf, 1.0);
    }

    #[test]
    fn test_create_query_idempotent() {
        let training = test_utils::training(&["pinch", "power"]);
        let mut builder = builder();
        let mut run = || {
            builder
                .create_query(
                    &training,
                    Some(&test_utils::model_shape()),
                    Some(&test_utils::query_shape()),
                    &test_utils::perceived_features(),
                    &end_effector(),
                )
                .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.object.len(), b.object.len());
            assert_eq!(a.pose.len(), b.pose.len());
            assert_eq!(a.weight, b.weight);
            let weights = |d: &crate::solution::Density| d.object.iter().map(|k| k.weight).collect::<Vec<_>>();
            assert_eq!(weights(a), weights(b));
        }
    }

    #[test]
    fn test_preconditions() {
        let training = test_utils::training(&["pinch"]);
        let model = test_utils::model_shape();
        let query = test_utils::query_shape();
        let features = test_utils::perceived_features();
        let ee = end_effector();

        let result = builder().create_query(&TrainingStore::new(), Some(&model), Some(&query), &features, &ee);
        assert!(matches!(result, Err(GraspError::Precondition(_))));

        let result = builder().create_query(&training, None, Some(&query), &features, &ee);
        assert!(matches!(result, Err(GraspError::Precondition(_))));

        let unknown = ObjectShape::new(vec![], Pose::identity());
        let result = builder().create_query(&training, Some(&model), Some(&unknown), &features, &ee);
        assert!(matches!(result, Err(GraspError::Precondition(_))));

        let mut no_default = QueryBuilder::new(test_utils::gantry(), QueryRegistry::new(), pose_densities(), 10.0);
        let result = no_default.create_query(&training, Some(&model), Some(&query), &features, &ee);
        assert!(matches!(result, Err(GraspError::Precondition(_))));

        let mut no_pose_default = QueryBuilder::new(test_utils::gantry(), queries(), BTreeMap::new(), 10.0);
        let result = no_pose_default.create_query(&training, Some(&model), Some(&query), &features, &ee);
        assert!(matches!(result, Err(GraspError::Precondition(_))));
    }

    #[test]
    fn test_no_features_means_no_query() {
        let training = test_utils::training(&["pinch"]);
        let result = builder().create_query(
            &training,
            Some(&test_utils::model_shape()),
            Some(&test_utils::query_shape()),
            &ObjectFeatures::default(),
            &end_effector(),
        );
        assert!(matches!(result, Err(GraspError::NoQuery)));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_degenerate_type_is_skipped() {
        // Both waypoints map to the same Cartesian pose
        let mut training = test_utils::training(&["pinch"]);
        training.set_trajectory("pinch", vec![CONTACT, CONTACT]);
        let result = builder().create_query(
            &training,
            Some(&test_utils::model_shape()),
            Some(&test_utils::query_shape()),
            &test_utils::perceived_features(),
            &end_effector(),
        );
        assert!(matches!(result, Err(GraspError::NoQuery)));

        // Another healthy type survives
        let mut training = test_utils::training(&["pinch", "power"]);
        training.set_trajectory("pinch", vec![CONTACT, CONTACT]);
        let densities = builder()
            .create_query(
                &training,
                Some(&test_utils::model_shape()),
                Some(&test_utils::query_shape()),
                &test_utils::perceived_features(),
                &end_effector(),
            )
            .unwrap();
        assert_eq!(densities.len(), 1);
        assert_eq!(densities[0].type_name, "power");
        assert_eq!(densities[0].weight, 1.0);
    }

    #[test]
    fn test_missing_trajectory_is_skipped() {
        let mut training = test_utils::training(&["pinch", "power"]);
        training.set_trajectory("power", vec![APPROACH]);
        let densities = builder()
            .create_query(
                &training,
                Some(&test_utils::model_shape()),
                Some(&test_utils::query_shape()),
                &test_utils::perceived_features(),
                &end_effector(),
            )
            .unwrap();
        assert_eq!(densities.len(), 1);
        assert_eq!(densities[0].type_name, "pinch");
    }

    #[test]
    fn test_type_specific_parameters() {
        let training = test_utils::training(&["pinch", "power"]);
        let mut params = pose_densities();
        params.insert(
            "power".to_string(),
            PoseDensityParams {
                kernels: 4,
                ..Default::default()
            },
        );
        let mut builder = QueryBuilder::new(test_utils::gantry(), queries(), params, 10.0);
        let densities = builder
            .create_query(
                &training,
                Some(&test_utils::model_shape()),
                Some(&test_utils::query_shape()),
                &test_utils::perceived_features(),
                &end_effector(),
            )
            .unwrap();
        assert_eq!(densities[0].pose.len(), 21);
        assert_eq!(densities[1].pose.len(), 5);
    }

    #[test]
    fn test_far_features_give_no_support() {
        let training = test_utils::training(&["pinch"]);
        let far = ObjectFeatures::new(vec![Point3::new(100.0, 0.0, 0.0)]);
        let result = builder().create_query(
            &training,
            Some(&test_utils::model_shape()),
            Some(&test_utils::query_shape()),
            &far,
            &end_effector(),
        );
        assert!(matches!(result, Err(GraspError::NoQuery)));
    }
}
