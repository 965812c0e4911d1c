//! Document ingestion pipeline state machine.
//!
//! The server reports ingestion progress as bare step names. The machine here
//! is a pure function of the latest observed step: progress moves forward
//! monotonically, stale observations are ignored, and `error` absorbs from
//! any state.

use serde::{Deserialize, Serialize};

/// Ingestion pipeline step, ordered by pipeline position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    #[default]
    Idle,
    Extract,
    Clean,
    Chunk,
    Embed,
    Index,
    Complete,
    /// Absorbing sink: reachable from any non-terminal state.
    Error,
}

impl PipelineStep {
    /// Fixed position in the pipeline ordering. `Error` sorts last so the
    /// max-by-position rule in [`advance`] can never leave it.
    pub fn position(self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Extract => 1,
            Self::Clean => 2,
            Self::Chunk => 3,
            Self::Embed => 4,
            Self::Index => 5,
            Self::Complete => 6,
            Self::Error => 7,
        }
    }

    /// Whether no further step observation can change the machine.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Parse a server-reported step name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "idle" => Some(Self::Idle),
            "extract" => Some(Self::Extract),
            "clean" => Some(Self::Clean),
            "chunk" => Some(Self::Chunk),
            "embed" => Some(Self::Embed),
            "index" => Some(Self::Index),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// All steps that render as rows in the expanded progress view.
    pub fn visible_steps() -> [Self; 5] {
        [
            Self::Extract,
            Self::Clean,
            Self::Chunk,
            Self::Embed,
            Self::Index,
        ]
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Extract => write!(f, "extract"),
            Self::Clean => write!(f, "clean"),
            Self::Chunk => write!(f, "chunk"),
            Self::Embed => write!(f, "embed"),
            Self::Index => write!(f, "index"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Advance the machine given the latest observed step.
///
/// `Error` wins unconditionally. Otherwise the observation is taken only if
/// it does not regress the pipeline position, which guards the visible
/// progress against out-of-order delivery.
pub fn advance(current: PipelineStep, observed: PipelineStep) -> PipelineStep {
    if observed == PipelineStep::Error {
        return PipelineStep::Error;
    }
    if observed.position() >= current.position() {
        observed
    } else {
        current
    }
}

/// Display status of a single step row relative to the machine's current
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Active,
    Pending,
}

/// Status of `step` when the machine is at `current`.
///
/// `Idle`, `Complete`, and `Error` states render a collapsed summary row
/// instead; callers only ask for per-step status in the expanded view.
pub fn step_status(step: PipelineStep, current: PipelineStep) -> StepStatus {
    use std::cmp::Ordering;
    match step.position().cmp(&current.position()) {
        Ordering::Less => StepStatus::Done,
        Ordering::Equal => StepStatus::Active,
        Ordering::Greater => StepStatus::Pending,
    }
}
