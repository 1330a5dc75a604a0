//! Training store: recorded grasp demonstrations grouped by training type, and the object
//! shapes the demonstrations and the current query refer to.

use crate::kinematic_traits::{Joints, Pose};
use nalgebra::Point3;
use std::collections::BTreeMap;

/// One recorded end effector contact frame, in the coordinates where the model object
/// was observed during training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub frame: Pose,
    pub weight: f64,
}

impl Contact {
    pub fn new(frame: Pose, weight: f64) -> Self {
        Self { frame, weight }
    }
}

/// One recorded demonstration of a successful grasp.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    /// Robot state at the moment of grasp
    pub state: Joints,
    pub contacts: Vec<Contact>,
    /// Model object frame when recorded
    pub frame: Pose,
    /// Object surface samples near the contacts
    pub locations: Vec<Point3<f64>>,
}

/// Known object shape: vertices and the object frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectShape {
    pub vertices: Vec<Point3<f64>>,
    pub frame: Pose,
}

impl ObjectShape {
    pub fn new(vertices: Vec<Point3<f64>>, frame: Pose) -> Self {
        Self { vertices, frame }
    }

    /// The shape is only usable if there is something to look at.
    pub fn is_known(&self) -> bool {
        !self.vertices.is_empty()
    }
}

/// Perceived features of the query object, world coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectFeatures {
    pub points: Vec<Point3<f64>>,
}

impl ObjectFeatures {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }
}

/// Multimap from training type to demonstrations, plus one demonstrated trajectory per type.
/// Types are iterated in lexicographic order, demonstrations of the same type in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TrainingStore {
    entries: BTreeMap<String, Vec<TrainingData>>,
    trajectories: BTreeMap<String, Vec<Joints>>,
}

impl TrainingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_name: &str, data: TrainingData) {
        self.entries.entry(type_name.to_string()).or_default().push(data);
    }

    /// Demonstrated waypoints for the type, contact waypoint first, approach second.
    pub fn set_trajectory(&mut self, type_name: &str, waypoints: Vec<Joints>) {
        self.trajectories.insert(type_name.to_string(), waypoints);
    }

    /// Distinct training types.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn get(&self, type_name: &str) -> &[TrainingData] {
        self.entries.get(type_name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn trajectory(&self, type_name: &str) -> Option<&[Joints]> {
        self.trajectories.get(type_name).map(|v| v.as_slice())
    }

    pub fn remove(&mut self, type_name: &str) {
        self.entries.remove(type_name);
        self.trajectories.remove(type_name);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|v| v.is_empty())
    }

    /// Total number of demonstrations over all types.
    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }
}

/// Key under that the trajectory of the given training type is published, "prefix-type".
pub fn trajectory_name(prefix: &str, type_name: &str) -> String {
    format!("{}-{}", prefix, type_name)
}
