//! Error handling for grasp query, solution generation and selection

use thiserror::Error;

/// Coarse classification of [`GraspError`], letting callers tell failures they can
/// fix by supplying more data from failures that indicate a logic bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required input is missing. Supply it and call again.
    Precondition,
    /// Training data is numerically degenerate. The affected training type is skipped.
    Degenerate,
    /// Should never happen if preconditions were met.
    Invariant,
    /// Configuration could not be read or is out of range.
    Config,
}

/// Unified error of the grasp core.
#[derive(Debug, Error)]
pub enum GraspError {
    /// Missing or empty required input data.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Contact and approach waypoints map to (almost) the same Cartesian pose.
    #[error("degenerate trajectory: frame distance lin={lin:.3e}, ang={ang:.3e}")]
    DegenerateTrajectory { lin: f64, ang: f64 },

    /// Weights could not be normalized: no items, or total weight not positive.
    #[error("cannot normalize empty or zero weight sequence")]
    EmptyInput,

    /// Sampling from an empty sequence.
    #[error("cannot sample from an empty sequence")]
    EmptySet,

    /// No solutions to sort or select from.
    #[error("no solutions available")]
    EmptySolutions,

    /// Sampling failed inside an optimization run.
    #[error("sampling error: {0}")]
    Sampling(String),

    /// No training type produced a usable query density.
    #[error("unable to create any query density")]
    NoQuery,

    /// Solutions were requested before any query density exists.
    #[error("no query densities, create query first")]
    NoDensity,

    /// The rejection loop of an annealing step did not produce a valid candidate.
    #[error("solution {slot} stalled after {attempts} invalid candidates")]
    GenerationStalled { slot: usize, attempts: usize },

    /// Internal invariant violated.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Configuration value is missing, mistyped or out of range.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraspError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraspError::Precondition(_) | GraspError::NoQuery | GraspError::NoDensity => {
                ErrorKind::Precondition
            }
            GraspError::DegenerateTrajectory { .. } => ErrorKind::Degenerate,
            GraspError::EmptyInput
            | GraspError::EmptySet
            | GraspError::EmptySolutions
            | GraspError::Sampling(_)
            | GraspError::GenerationStalled { .. }
            | GraspError::Invariant(_) => ErrorKind::Invariant,
            GraspError::Config(_) | GraspError::Io(_) => ErrorKind::Config,
        }
    }

    /// True if the caller can recover by supplying missing data or skipping a training type.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Precondition | ErrorKind::Degenerate)
    }
}

/// Result type of the grasp core.
pub type GraspResult<T> = Result<T, GraspError>;
