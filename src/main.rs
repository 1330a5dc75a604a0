use std::sync::Arc;

use nalgebra::{Point3, Translation3, UnitQuaternion, Vector3};
use pacman_grasp::config::GraspConfig;
use pacman_grasp::kinematic_traits::{Joints, Manipulator, Pose};
use pacman_grasp::kinematics_impl::SerialArm;
use pacman_grasp::optimizer::OptimizerConfig;
use pacman_grasp::session::{GraspPipeline, Session};
use pacman_grasp::training::{Contact, ObjectFeatures, ObjectShape, TrainingData, TrainingStore};
use pacman_grasp::utils::{as_radians, dump_joints, dump_pose, dump_solution};

/// Points of a 10 cm box top face centred at `centre`, 1 cm grid.
fn top_face(centre: &Point3<f64>) -> Vec<Point3<f64>> {
    let mut points = Vec::new();
    for i in -5..=5 {
        for j in -5..=5 {
            points.push(centre + Vector3::new(i as f64 * 0.01, j as f64 * 0.01, 0.0));
        }
    }
    points
}

/// Usage example: one demonstrated top grasp, object moved, new grasp trajectory selected.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let arm = Arc::new(SerialArm::kuka_lwr());
    let contact_joints: Joints = as_radians([0, 46, 0, -80, 0, 52]);
    let approach_joints: Joints = as_radians([0, 34, 0, -74, 0, 63]);
    println!("Demonstrated contact and approach joints:");
    dump_joints(&contact_joints);
    dump_joints(&approach_joints);

    let contact = arm.forward(&contact_joints);
    println!("Contact frame:");
    dump_pose(&contact);

    // Model object sits right under the hand at contact time
    let top = Point3::from(contact.translation.vector);
    let face = top_face(&top);
    let model = ObjectShape::new(face.clone(), Pose::identity());

    let mut training = TrainingStore::new();
    training.insert(
        "top",
        TrainingData {
            state: contact_joints,
            contacts: vec![Contact::new(contact, 1.0)],
            frame: model.frame,
            locations: face.iter().step_by(10).cloned().collect(),
        },
    );
    training.set_trajectory("top", vec![contact_joints, approach_joints]);

    // The object was moved a bit and turned
    let moved = Pose::from_parts(
        Translation3::new(0.04, -0.03, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.1),
    );
    let query = ObjectShape::new(face.iter().map(|p| moved * p).collect(), moved);
    let features = ObjectFeatures::new(query.vertices.clone());

    let config = GraspConfig {
        optimizer: OptimizerConfig {
            runs: 200,
            steps: 50,
            ..Default::default()
        },
        ..Default::default()
    };
    #[cfg(feature = "allow_filesystem")]
    {
        // Same format GraspConfig::from_yaml_file reads
        println!("Configuration:\n{}", config.to_yaml());
    }

    let mut pipeline = GraspPipeline::new(config, arm.clone())?;
    let mut session = Session::new(training, model);
    session.query = Some(query);

    let end_effector = arm.forward(&approach_joints);
    pipeline.create_query(&mut session, &features, &end_effector)?;
    let stats = pipeline.generate_solutions(&mut session)?;
    println!(
        "Accepted greedy {}, annealed {}, rejected {}",
        stats.accept_greedy, stats.accept_sa, stats.rejected
    );
    pipeline.sort_solutions(&mut session)?;
    for (i, solution) in session.solutions.iter().enumerate() {
        dump_solution(i, solution);
    }

    let scores: Vec<_> = session
        .solutions
        .iter()
        .map(|s| pipeline.reach_score(&session, s, &end_effector))
        .collect();
    let (index, score) = pipeline.select_trajectory(&mut session, &mut (), |i, _| scores[i])?;
    println!(
        "Selected #{:03}: lin {:.4} m, ang {:.6}, collides: {}",
        index, score.lin, score.ang, score.collides
    );
    for (name, path) in &session.trajectories {
        println!("{}: {} waypoints, approach starts at", name, path.len());
        if let Some(last) = path.last() {
            dump_pose(&last.frame);
        }
    }
    Ok(())
}
