//! Error taxonomy.
//!
//! Two distinct failure families exist in a constraint-based exploration:
//!
//! - [`ModelError`] — malformed or missing input data, detected while the
//!   model is built, before any search starts. Fatal.
//! - [`Conflict`] — a propagator proved the current partial assignment
//!   inconsistent. Recovered locally by backtracking; it only surfaces to
//!   the caller when the whole tree is exhausted without a solution.
//!
//! A conflict is ordinary search data, not an error in the `std::error`
//! sense, so it is a plain enum rather than a `thiserror` type. Every
//! variant carries the offending variable/processor/entity id for
//! diagnostics.

use crate::store::VarId;
use thiserror::Error;

/// Fatal input error raised while constructing a [`DseModel`](crate::model::DseModel).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// No WCET entry for an entity on a processor mode it may be mapped to.
    #[error("missing WCET for entity {entity} on processor {processor} mode {mode}")]
    MissingWcet {
        entity: usize,
        processor: usize,
        mode: usize,
    },

    /// A channel references an actor index outside the application graph.
    #[error("channel {channel} references undefined actor {actor}")]
    UndefinedActor { channel: usize, actor: usize },

    /// Application boundaries do not cover the actor index space.
    #[error("application boundaries are inconsistent: {reason}")]
    InvalidApplications { reason: String },

    /// A periodic task with a non-positive period or deadline.
    #[error("task {task} has invalid timing: period {period}, deadline {deadline}")]
    InvalidTask {
        task: usize,
        period: i64,
        deadline: i64,
    },

    /// The platform has no processors or a processor has no modes.
    #[error("invalid platform: {reason}")]
    InvalidPlatform { reason: String },

    /// A presolver hint names an entity or processor that does not exist.
    #[error("presolver hint out of range: entity {entity}, processor {processor}")]
    InvalidHint { entity: usize, processor: usize },

    /// Contradictory presolver hints left an entity with no processor.
    #[error("presolver hints leave entity {entity} with an empty processor domain")]
    UnsatisfiableHints { entity: usize },
}

/// Why a propagator failed the current branch.
///
/// All variants are handled identically by the search engine (backtrack);
/// the distinction exists for logging and post-mortem diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// A domain shrink removed the last value of a variable.
    EmptyDomain { var: VarId },

    /// A task set on a processor fails both the utilization-bound and the
    /// time-demand test.
    Unschedulable { processor: usize, task: usize },

    /// The MSAG contains a cycle with positive delay and zero tokens: the
    /// candidate schedule can never make progress.
    Deadlock { node: usize },

    /// A fully assigned successor chain does not visit every element
    /// exactly once.
    BrokenChain { var: VarId },
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::EmptyDomain { var } => write!(f, "empty domain for variable {var:?}"),
            Conflict::Unschedulable { processor, task } => {
                write!(f, "task {task} unschedulable on processor {processor}")
            }
            Conflict::Deadlock { node } => write!(f, "zero-token cycle through MSAG node {node}"),
            Conflict::BrokenChain { var } => {
                write!(f, "successor chain through variable {var:?} is not a tour")
            }
        }
    }
}
