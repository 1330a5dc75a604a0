#[cfg(test)]
#[cfg(feature = "allow_filesystem")]
mod tests {
    use crate::config::GraspConfig;
    use crate::error::{ErrorKind, GraspError};
    use crate::pose::RBDist;
    use crate::pose_density::PoseDensityParams;
    use crate::query_method::{ContactQueryParams, ID_ANY};

    const READ_ERROR: &str = "Failed to load configuration from file";

    #[test]
    fn test_config_from_yaml() {
        let filename = "src/tests/data/pacman.yaml";
        let loaded = GraspConfig::from_yaml_file(filename).expect(READ_ERROR);

        assert_eq!(loaded.trajectory_prefix, "grasp");
        assert_eq!(loaded.dist_max, 8.0);

        let o = &loaded.optimizer;
        assert_eq!(o.runs, 500);
        assert_eq!(o.steps, 50);
        assert_eq!(o.sa_temp, 0.05);
        assert_eq!(o.step_size, RBDist::new(0.5, 0.8));
        assert_eq!(o.energy, 0.02);
        assert_eq!(o.seed, 1234);
        assert_eq!(o.max_attempts, 200);
        assert_eq!(o.threads, 4);
        assert_eq!(loaded.ranker.cluster_size, 8);

        // Type specific entries start from the defaults, not from "Any"
        let pinch = loaded.pose_densities["pinch"];
        assert_eq!(pinch.kernels, 11);
        assert_eq!(pinch.path_dist, 0.03);
        assert_eq!(pinch.std_dev, PoseDensityParams::default().std_dev);
        assert_eq!(loaded.pose_densities[ID_ANY], PoseDensityParams::default());

        let power = loaded.contact_queries["power"];
        assert_eq!(power.feature_std_dev, 0.02);
        assert_eq!(power.dist_max, ContactQueryParams::default().dist_max);
        // Integer accepted where a real is expected
        assert_eq!(loaded.contact_queries[ID_ANY].dist_max, 10.0);
    }

    #[test]
    fn test_missing_file() {
        let result = GraspConfig::from_yaml_file("src/tests/data/does_not_exist.yaml");
        match result {
            Err(err @ GraspError::Io(_)) => assert_eq!(err.kind(), ErrorKind::Config),
            other => panic!("IO error expected, got {:?}", other),
        }
    }

    #[test]
    fn test_written_config_reads_back() {
        let loaded = GraspConfig::from_yaml_file("src/tests/data/pacman.yaml").expect(READ_ERROR);
        let yaml = loaded.to_yaml();
        println!("Reading:\n{}", yaml);
        assert_eq!(GraspConfig::from_yaml_str(&yaml).expect(READ_ERROR), loaded);
    }
}
