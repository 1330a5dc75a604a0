//! Configuration of the grasp core, optionally read from YAML.
//!
//! ```yaml
//! trajectory_prefix: trajectory
//! dist_max: 10.0
//! optimizer:
//!   runs: 1000
//!   steps: 100
//!   sa_temp: 0.1
//!   step_size: { lin: 1.0, ang: 1.0 }
//!   energy: 0.01
//!   seed: 24301
//!   max_attempts: 1000
//!   threads: 0
//! ranker:
//!   cluster_size: 10
//! pose_densities:
//!   Any: { std_dev: { lin: 0.005, ang: 0.02 }, kernels: 21, path_dist: 0.05, path_dist_std_dev: 1.0 }
//! contact_queries:
//!   Any: { std_dev: { lin: 0.01, ang: 0.05 }, feature_std_dev: 0.01, dist_max: 10.0 }
//! ```
//! Every key is optional, missing ones keep their defaults.

use crate::error::{GraspError, GraspResult};
use crate::optimizer::OptimizerConfig;
use crate::pose::RBDist;
use crate::pose_density::PoseDensityParams;
use crate::query_method::{ContactQueryParams, ID_ANY};
use crate::ranker::RankerConfig;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct GraspConfig {
    /// Selected trajectories are published as "<prefix>-<type>".
    pub trajectory_prefix: String,
    /// Normalized kernel cut off.
    pub dist_max: f64,
    pub optimizer: OptimizerConfig,
    pub ranker: RankerConfig,
    pub pose_densities: BTreeMap<String, PoseDensityParams>,
    pub contact_queries: BTreeMap<String, ContactQueryParams>,
}

impl Default for GraspConfig {
    fn default() -> Self {
        Self {
            trajectory_prefix: "trajectory".to_string(),
            dist_max: 10.0,
            optimizer: OptimizerConfig::default(),
            ranker: RankerConfig::default(),
            pose_densities: BTreeMap::from([(ID_ANY.to_string(), PoseDensityParams::default())]),
            contact_queries: BTreeMap::from([(ID_ANY.to_string(), ContactQueryParams::default())]),
        }
    }
}

fn invalid<T>(message: String) -> GraspResult<T> {
    Err(GraspError::Config(message))
}

fn check_positive(name: &str, value: f64) -> GraspResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return invalid(format!("{} must be finite and positive (got {})", name, value));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> GraspResult<()> {
    if !(value.is_finite() && value >= 0.0) {
        return invalid(format!("{} must be finite and non-negative (got {})", name, value));
    }
    Ok(())
}

fn check_rbdist(name: &str, value: &RBDist) -> GraspResult<()> {
    check_positive(&format!("{}.lin", name), value.lin)?;
    check_positive(&format!("{}.ang", name), value.ang)
}

impl GraspConfig {
    /// Check ranges and required registry entries.
    pub fn validate(&self) -> GraspResult<()> {
        if self.trajectory_prefix.is_empty() {
            return invalid("trajectory_prefix must not be empty".into());
        }
        check_positive("dist_max", self.dist_max)?;

        let o = &self.optimizer;
        if o.runs == 0 {
            return invalid("optimizer.runs must be positive".into());
        }
        if o.max_attempts == 0 {
            return invalid("optimizer.max_attempts must be positive".into());
        }
        check_positive("optimizer.sa_temp", o.sa_temp)?;
        check_positive("optimizer.energy", o.energy)?;
        check_rbdist("optimizer.step_size", &o.step_size)?;

        if self.ranker.cluster_size == 0 {
            return invalid("ranker.cluster_size must be positive".into());
        }

        if !self.pose_densities.contains_key(ID_ANY) {
            return invalid(format!("pose_densities must contain \"{}\"", ID_ANY));
        }
        for (type_name, p) in &self.pose_densities {
            check_rbdist(&format!("pose_densities.{}.std_dev", type_name), &p.std_dev)?;
            check_non_negative(&format!("pose_densities.{}.path_dist", type_name), p.path_dist)?;
            check_non_negative(
                &format!("pose_densities.{}.path_dist_std_dev", type_name),
                p.path_dist_std_dev,
            )?;
        }

        if !self.contact_queries.contains_key(ID_ANY) {
            return invalid(format!("contact_queries must contain \"{}\"", ID_ANY));
        }
        for (type_name, p) in &self.contact_queries {
            check_rbdist(&format!("contact_queries.{}.std_dev", type_name), &p.std_dev)?;
            check_positive(&format!("contact_queries.{}.feature_std_dev", type_name), p.feature_std_dev)?;
            check_positive(&format!("contact_queries.{}.dist_max", type_name), p.dist_max)?;
        }
        Ok(())
    }

    /// Render as YAML in the format [`GraspConfig::from_yaml_str`] reads.
    pub fn to_yaml(&self) -> String {
        fn rb(d: &RBDist) -> String {
            format!("{{ lin: {:?}, ang: {:?} }}", d.lin, d.ang)
        }

        let o = &self.optimizer;
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = writeln!(out, "trajectory_prefix: {}", self.trajectory_prefix);
        let _ = writeln!(out, "dist_max: {:?}", self.dist_max);
        let _ = writeln!(out, "optimizer:");
        let _ = writeln!(out, "  runs: {}", o.runs);
        let _ = writeln!(out, "  steps: {}", o.steps);
        let _ = writeln!(out, "  sa_temp: {:?}", o.sa_temp);
        let _ = writeln!(out, "  step_size: {}", rb(&o.step_size));
        let _ = writeln!(out, "  energy: {:?}", o.energy);
        let _ = writeln!(out, "  seed: {}", o.seed);
        let _ = writeln!(out, "  max_attempts: {}", o.max_attempts);
        let _ = writeln!(out, "  threads: {}", o.threads);
        let _ = writeln!(out, "ranker:");
        let _ = writeln!(out, "  cluster_size: {}", self.ranker.cluster_size);
        let _ = writeln!(out, "pose_densities:");
        for (type_name, p) in &self.pose_densities {
            let _ = writeln!(
                out,
                "  {}: {{ std_dev: {}, kernels: {}, path_dist: {:?}, path_dist_std_dev: {:?} }}",
                type_name,
                rb(&p.std_dev),
                p.kernels,
                p.path_dist,
                p.path_dist_std_dev
            );
        }
        let _ = writeln!(out, "contact_queries:");
        for (type_name, p) in &self.contact_queries {
            let _ = writeln!(
                out,
                "  {}: {{ std_dev: {}, feature_std_dev: {:?}, dist_max: {:?} }}",
                type_name,
                rb(&p.std_dev),
                p.feature_std_dev,
                p.dist_max
            );
        }
        out
    }
}

#[cfg(feature = "allow_filesystem")]
mod yaml {
    use super::*;
    use std::path::Path;
    use yaml_rust2::{Yaml, YamlLoader};

    fn is_missing(node: &Yaml) -> bool {
        node.is_badvalue() || node.is_null()
    }

    fn real(node: &Yaml, name: &str, default: f64) -> GraspResult<f64> {
        match node {
            n if is_missing(n) => Ok(default),
            Yaml::Integer(value) => Ok(*value as f64),
            Yaml::Real(_) => node
                .as_f64()
                .ok_or_else(|| GraspError::Config(format!("{}: cannot parse number", name))),
            other => invalid(format!("{}: number expected, got {:?}", name, other)),
        }
    }

    fn integer(node: &Yaml, name: &str, default: usize) -> GraspResult<usize> {
        match node {
            n if is_missing(n) => Ok(default),
            Yaml::Integer(value) if *value >= 0 => Ok(*value as usize),
            other => invalid(format!("{}: non-negative integer expected, got {:?}", name, other)),
        }
    }

    /// Seeds span the whole `u64` range. Values above `i64::MAX` are not YAML integers to the
    /// loader and arrive as real scalars carrying their source text.
    fn seed(node: &Yaml, name: &str, default: u64) -> GraspResult<u64> {
        match node {
            n if is_missing(n) => Ok(default),
            Yaml::Integer(value) if *value >= 0 => Ok(*value as u64),
            Yaml::Real(text) | Yaml::String(text) => text
                .parse::<u64>()
                .map_err(|_| GraspError::Config(format!("{}: unsigned integer expected, got {}", name, text))),
            other => invalid(format!("{}: unsigned integer expected, got {:?}", name, other)),
        }
    }

    fn string(node: &Yaml, name: &str, default: &str) -> GraspResult<String> {
        match node {
            n if is_missing(n) => Ok(default.to_string()),
            Yaml::String(value) => Ok(value.clone()),
            other => invalid(format!("{}: string expected, got {:?}", name, other)),
        }
    }

    fn rbdist(node: &Yaml, name: &str, default: RBDist) -> GraspResult<RBDist> {
        if is_missing(node) {
            return Ok(default);
        }
        Ok(RBDist::new(
            real(&node["lin"], &format!("{}.lin", name), default.lin)?,
            real(&node["ang"], &format!("{}.ang", name), default.ang)?,
        ))
    }

    /// Entries of a map keyed by training type, each parsed from its own defaults.
    fn registry<T: Clone>(
        node: &Yaml,
        name: &str,
        defaults: &BTreeMap<String, T>,
        parse: impl Fn(&Yaml, &str, T) -> GraspResult<T>,
        fallback: T,
    ) -> GraspResult<BTreeMap<String, T>> {
        let mut result = defaults.clone();
        if is_missing(node) {
            return Ok(result);
        }
        let hash = node
            .as_hash()
            .ok_or_else(|| GraspError::Config(format!("{}: map expected", name)))?;
        for (key, value) in hash.iter() {
            let type_name = key
                .as_str()
                .ok_or_else(|| GraspError::Config(format!("{}: type names must be strings", name)))?;
            let base = defaults.get(type_name).cloned().unwrap_or_else(|| fallback.clone());
            let parsed = parse(value, &format!("{}.{}", name, type_name), base)?;
            result.insert(type_name.to_string(), parsed);
        }
        Ok(result)
    }

    fn pose_density(node: &Yaml, name: &str, d: PoseDensityParams) -> GraspResult<PoseDensityParams> {
        Ok(PoseDensityParams {
            std_dev: rbdist(&node["std_dev"], &format!("{}.std_dev", name), d.std_dev)?,
            kernels: integer(&node["kernels"], &format!("{}.kernels", name), d.kernels)?,
            path_dist: real(&node["path_dist"], &format!("{}.path_dist", name), d.path_dist)?,
            path_dist_std_dev: real(
                &node["path_dist_std_dev"],
                &format!("{}.path_dist_std_dev", name),
                d.path_dist_std_dev,
            )?,
        })
    }

    fn contact_query(node: &Yaml, name: &str, d: ContactQueryParams) -> GraspResult<ContactQueryParams> {
        Ok(ContactQueryParams {
            std_dev: rbdist(&node["std_dev"], &format!("{}.std_dev", name), d.std_dev)?,
            feature_std_dev: real(
                &node["feature_std_dev"],
                &format!("{}.feature_std_dev", name),
                d.feature_std_dev,
            )?,
            dist_max: real(&node["dist_max"], &format!("{}.dist_max", name), d.dist_max)?,
        })
    }

    impl GraspConfig {
        /// Read the configuration from a YAML file, see the module documentation for the format.
        pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> GraspResult<Self> {
            let contents = std::fs::read_to_string(path)?;
            Self::from_yaml_str(&contents)
        }

        pub fn from_yaml_str(contents: &str) -> GraspResult<Self> {
            let docs = YamlLoader::load_from_str(contents)
                .map_err(|e| GraspError::Config(format!("YAML syntax: {}", e)))?;
            let defaults = GraspConfig::default();
            let doc = match docs.first() {
                Some(doc) if !is_missing(doc) => doc,
                _ => return Ok(defaults),
            };
            if doc.as_hash().is_none() {
                return invalid("top level YAML node must be a map".into());
            }

            let o = &doc["optimizer"];
            let od = defaults.optimizer;
            let optimizer = OptimizerConfig {
                runs: integer(&o["runs"], "optimizer.runs", od.runs)?,
                steps: integer(&o["steps"], "optimizer.steps", od.steps)?,
                sa_temp: real(&o["sa_temp"], "optimizer.sa_temp", od.sa_temp)?,
                step_size: rbdist(&o["step_size"], "optimizer.step_size", od.step_size)?,
                energy: real(&o["energy"], "optimizer.energy", od.energy)?,
                seed: seed(&o["seed"], "optimizer.seed", od.seed)?,
                max_attempts: integer(&o["max_attempts"], "optimizer.max_attempts", od.max_attempts)?,
                threads: integer(&o["threads"], "optimizer.threads", od.threads)?,
            };

            let config = GraspConfig {
                trajectory_prefix: string(
                    &doc["trajectory_prefix"],
                    "trajectory_prefix",
                    &defaults.trajectory_prefix,
                )?,
                dist_max: real(&doc["dist_max"], "dist_max", defaults.dist_max)?,
                optimizer,
                ranker: RankerConfig {
                    cluster_size: integer(
                        &doc["ranker"]["cluster_size"],
                        "ranker.cluster_size",
                        defaults.ranker.cluster_size,
                    )?,
                },
                pose_densities: registry(
                    &doc["pose_densities"],
                    "pose_densities",
                    &defaults.pose_densities,
                    pose_density,
                    PoseDensityParams::default(),
                )?,
                contact_queries: registry(
                    &doc["contact_queries"],
                    "contact_queries",
                    &defaults.contact_queries,
                    contact_query,
                    ContactQueryParams::default(),
                )?,
            };
            config.validate()?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GraspConfig::default();
        config.validate().expect("default configuration");
        assert!(config.pose_densities.contains_key(ID_ANY));
        assert!(config.contact_queries.contains_key(ID_ANY));
    }

    #[test]
    fn test_validation() {
        let mut config = GraspConfig::default();
        config.optimizer.energy = 0.0;
        assert!(matches!(config.validate(), Err(GraspError::Config(_))));

        let mut config = GraspConfig::default();
        config.pose_densities.clear();
        assert!(matches!(config.validate(), Err(GraspError::Config(_))));

        let mut config = GraspConfig::default();
        config.dist_max = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "allow_filesystem")]
    #[test]
    fn test_yaml_partial() {
        let config = GraspConfig::from_yaml_str(
            "optimizer:\n  runs: 20\n  sa_temp: 0.5\nranker:\n  cluster_size: 3\n",
        )
        .unwrap();
        assert_eq!(config.optimizer.runs, 20);
        assert_eq!(config.optimizer.sa_temp, 0.5);
        assert_eq!(config.optimizer.steps, OptimizerConfig::default().steps);
        assert_eq!(config.ranker.cluster_size, 3);
        assert_eq!(config.trajectory_prefix, "trajectory");
    }

    #[cfg(feature = "allow_filesystem")]
    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let config = GraspConfig::default();
        let parsed = GraspConfig::from_yaml_str(&config.to_yaml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[cfg(feature = "allow_filesystem")]
    #[test]
    fn test_yaml_round_trip_of_large_seed() {
        let mut config = GraspConfig::default();
        config.optimizer.seed = u64::MAX;
        let parsed = GraspConfig::from_yaml_str(&config.to_yaml()).unwrap();
        assert_eq!(parsed.optimizer.seed, u64::MAX);

        let negative = GraspConfig::from_yaml_str("optimizer:\n  seed: -1\n");
        assert!(matches!(negative, Err(GraspError::Config(_))));
        let fraction = GraspConfig::from_yaml_str("optimizer:\n  seed: 1.5\n");
        assert!(matches!(fraction, Err(GraspError::Config(_))));
    }

    #[cfg(feature = "allow_filesystem")]
    #[test]
    fn test_yaml_errors() {
        let wrong_type = GraspConfig::from_yaml_str("optimizer:\n  runs: many\n");
        assert!(matches!(wrong_type, Err(GraspError::Config(_))));

        let negative = GraspConfig::from_yaml_str("optimizer:\n  steps: -3\n");
        assert!(matches!(negative, Err(GraspError::Config(_))));

        let out_of_range = GraspConfig::from_yaml_str("optimizer:\n  energy: 0\n");
        assert!(matches!(out_of_range, Err(GraspError::Config(_))));

        let syntax = GraspConfig::from_yaml_str("optimizer: [");
        assert!(matches!(syntax, Err(GraspError::Config(_))));
    }

    #[cfg(feature = "allow_filesystem")]
    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(GraspConfig::from_yaml_str("").unwrap(), GraspConfig::default());
    }
}
