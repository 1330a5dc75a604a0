//! Solution generation: parallel simulated annealing over sampled query densities.
//!
//! Every output slot is optimized independently: a query density and one of its pose kernels
//! are sampled, then the kernel pose is refined by simulated annealing with a linear cooling
//! schedule. Temperature starts at 1 and ends at `sa_temp`; perturbation step sizes and the
//! Boltzmann energy scale with it.
//!
//! Slots are claimed from a shared atomic cursor by a fixed number of workers. Each slot has
//! its own random generator seeded from the configured seed and the slot index, so results do
//! not depend on which worker picks which slot.

use crate::collision::CollisionModel;
use crate::error::{GraspError, GraspResult};
use crate::kinematic_traits::{Manipulator, Path, Pose};
use crate::pose::RBDist;
use crate::sample_set::{sample, sample_index};
use crate::solution::{Density, Likelihood, Solution};
use nalgebra::{Point3, Translation3, Unit, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal, UnitSphere};
use std::f64::consts::PI;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Simulated annealing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    /// Number of solutions to generate.
    pub runs: usize,
    /// Annealing steps per solution, not counting initialization.
    pub steps: usize,
    /// Final temperature.
    pub sa_temp: f64,
    /// Perturbation step size relative to the kernel standard deviation.
    pub step_size: RBDist,
    /// Boltzmann energy at temperature 1.
    pub energy: f64,
    pub seed: u64,
    /// Invalid candidates allowed in a row before the run is abandoned.
    pub max_attempts: usize,
    /// Worker threads, 0 uses available parallelism.
    pub threads: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            runs: 1000,
            steps: 100,
            sa_temp: 0.1,
            step_size: RBDist::new(1.0, 1.0),
            energy: 0.01,
            seed: 0x5eed,
            max_attempts: 1000,
            threads: 0,
        }
    }
}

/// Acceptance counters of one generation, diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizerStats {
    /// Accepted as strictly better
    pub accept_greedy: usize,
    /// Accepted by the Metropolis criterion despite being worse
    pub accept_sa: usize,
    pub rejected: usize,
    /// Invalid candidates redrawn
    pub resampled: usize,
}

/// Output of [`SolutionOptimizer::generate_solutions`].
#[derive(Debug, Clone)]
pub struct Generation {
    /// Exactly `runs` solutions, in slot order.
    pub solutions: Vec<Solution>,
    pub stats: OptimizerStats,
}

#[derive(Default)]
struct Counters {
    accept_greedy: AtomicUsize,
    accept_sa: AtomicUsize,
    rejected: AtomicUsize,
    resampled: AtomicUsize,
}

impl Counters {
    fn stats(&self) -> OptimizerStats {
        OptimizerStats {
            accept_greedy: self.accept_greedy.load(Ordering::Relaxed),
            accept_sa: self.accept_sa.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            resampled: self.resampled.load(Ordering::Relaxed),
        }
    }
}

/// Everything one slot needs, shared read only between workers.
struct Job<'a> {
    densities: &'a [Density],
    manipulator: &'a dyn Manipulator,
    collision: &'a dyn CollisionModel,
    counters: &'a Counters,
}

pub struct SolutionOptimizer {
    pub config: OptimizerConfig,
}

impl SolutionOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Generate `runs` solutions from the given densities. Fails as a whole if any slot fails.
    pub fn generate_solutions(
        &self,
        densities: &[Density],
        manipulator: &dyn Manipulator,
        collision: &dyn CollisionModel,
    ) -> GraspResult<Generation> {
        if densities.is_empty() {
            return Err(GraspError::NoDensity);
        }
        let runs = self.config.runs;
        if runs == 0 {
            return Err(GraspError::Precondition("number of runs must be positive".into()));
        }

        let threads = match self.config.threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
        .min(runs);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| GraspError::Invariant(format!("cannot create worker pool: {}", e)))?;

        let counters = Counters::default();
        let job = Job {
            densities,
            manipulator,
            collision,
            counters: &counters,
        };
        let slots: Vec<OnceLock<GraspResult<Solution>>> = (0..runs).map(|_| OnceLock::new()).collect();
        let cursor = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);

        let started = Instant::now();
        pool.scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|_| {
                    loop {
                        let slot = cursor.fetch_add(1, Ordering::Relaxed);
                        if slot >= runs || abort.load(Ordering::Relaxed) {
                            break;
                        }
                        let result = self.optimize(slot, &job);
                        if result.is_err() {
                            abort.store(true, Ordering::Relaxed);
                        }
                        // Each slot is claimed exactly once
                        let _ = slots[slot].set(result);
                    }
                });
            }
        });

        let mut solutions = Vec::with_capacity(runs);
        for (slot, cell) in slots.into_iter().enumerate() {
            match cell.into_inner() {
                Some(Ok(solution)) => solutions.push(solution),
                Some(Err(err)) => return Err(err),
                None if abort.load(Ordering::Relaxed) => continue,
                None => return Err(GraspError::Invariant(format!("slot {} was never processed", slot))),
            }
        }
        if solutions.len() != runs {
            // Only after abort; the failing slot may have a higher index than skipped ones
            return Err(GraspError::Invariant("generation aborted".into()));
        }

        let stats = counters.stats();
        info!(
            "Generated {} solutions on {} threads in {:?}, accepted greedy {}, annealed {}, rejected {}, resampled {}",
            runs,
            threads,
            started.elapsed(),
            stats.accept_greedy,
            stats.accept_sa,
            stats.rejected,
            stats.resampled
        );
        Ok(Generation { solutions, stats })
    }

    /// Random generator seed of the given slot.
    pub fn slot_seed(seed: u64, slot: usize) -> u64 {
        seed ^ (slot as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    fn optimize(&self, slot: usize, job: &Job) -> GraspResult<Solution> {
        let config = &self.config;
        let mut rng = StdRng::seed_from_u64(Self::slot_seed(config.seed, slot));

        let query_index = sample_index(job.densities, &mut rng)
            .map_err(|e| GraspError::Sampling(format!("query density: {}", e)))?;
        let density = &job.densities[query_index];
        let kernel = *sample(&density.pose, &mut rng)
            .map_err(|e| GraspError::Sampling(format!("pose kernel of {}: {}", density.type_name, e)))?;
        let std_dev = kernel.std_dev();
        let locations = density.world_locations();

        // Initialization: kernel pose verbatim, always accepted
        let mut pose = kernel.pose;
        let mut path = Self::candidate_path(job.manipulator, density, &pose);
        let mut likelihood = Self::evaluate(job.collision, density, &pose, &path, &locations).ok_or_else(|| {
            GraspError::Invariant(format!("solution {} has invalid initial likelihood", slot))
        })?;

        let steps = config.steps;
        for s in 1..=steps {
            let f = (steps - s) as f64 / steps as f64;
            let temperature = (1.0 - f) * config.sa_temp + f;

            let mut attempts = 0;
            let (next_pose, next_path, next_likelihood) = loop {
                if attempts >= config.max_attempts {
                    return Err(GraspError::GenerationStalled { slot, attempts });
                }
                attempts += 1;
                let candidate = self.perturb(&pose, &std_dev, temperature, &mut rng);
                let candidate_path = Self::candidate_path(job.manipulator, density, &candidate);
                match Self::evaluate(job.collision, density, &candidate, &candidate_path, &locations) {
                    Some(l) => break (candidate, candidate_path, l),
                    None => {
                        job.counters.resampled.fetch_add(1, Ordering::Relaxed);
                    }
                }
            };

            let accept = if next_likelihood.likelihood > likelihood.likelihood {
                job.counters.accept_greedy.fetch_add(1, Ordering::Relaxed);
                true
            } else {
                let energy = config.energy * temperature;
                let probability = ((next_likelihood.likelihood - likelihood.likelihood) / energy).exp();
                if rng.gen_range(0.0..1.0) < probability {
                    job.counters.accept_sa.fetch_add(1, Ordering::Relaxed);
                    true
                } else {
                    job.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    false
                }
            };
            if accept {
                pose = next_pose;
                path = next_path;
                likelihood = next_likelihood;
            }
        }

        debug!(
            "solution {}: {} (query {}), L={:.6e}",
            slot, density.type_name, query_index, likelihood.likelihood
        );
        Ok(Solution {
            type_name: density.type_name.clone(),
            query_index,
            pose,
            path,
            likelihood,
        })
    }

    /// Random displacement of `pose`: direction uniform on the sphere, half normal magnitude.
    /// Rotation composed in the local frame, angle bounded by half a turn.
    fn perturb(&self, pose: &Pose, std_dev: &RBDist, temperature: f64, rng: &mut StdRng) -> Pose {
        let step = self.config.step_size;

        let direction: [f64; 3] = UnitSphere.sample(rng);
        let magnitude: f64 = StandardNormal.sample(rng);
        let displacement =
            Vector3::from(direction) * (magnitude.abs() * step.lin * std_dev.lin * temperature);

        let axis: [f64; 3] = UnitSphere.sample(rng);
        let angle: f64 = StandardNormal.sample(rng);
        let angle = (angle.abs() * step.ang * std_dev.ang * temperature).min(PI);
        let rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(Vector3::from(axis)), angle);

        Pose::from_parts(
            Translation3::from(pose.translation.vector + displacement),
            pose.rotation * rotation,
        )
    }

    fn candidate_path(manipulator: &dyn Manipulator, density: &Density, pose: &Pose) -> Path {
        manipulator.transform_path(&density.path, &(pose * density.frame.inverse()))
    }

    fn evaluate(
        collision: &dyn CollisionModel,
        density: &Density,
        pose: &Pose,
        path: &Path,
        locations: &[Point3<f64>],
    ) -> Option<Likelihood> {
        Likelihood::new(
            density.contact_density(pose),
            density.pose_density(pose),
            collision.evaluate(pose, path, locations),
        )
    }
}
