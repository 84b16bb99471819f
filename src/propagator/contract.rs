//! The [`Propagator`] trait and its supporting types.

use crate::error::Conflict;
use crate::store::{DomainEvent, DomainStore, VarId};

/// Which domain changes wake a propagator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Any change to the domain.
    Any,
    /// Only changes that move the minimum or maximum (includes assignment).
    Bounds,
    /// Only assignment to a single value.
    Assigned,
}

impl EventKind {
    /// Whether a concrete [`DomainEvent`] matches this subscription kind.
    pub fn matches(self, event: DomainEvent) -> bool {
        match self {
            EventKind::Any => true,
            EventKind::Bounds => event >= DomainEvent::Bounds,
            EventKind::Assigned => event == DomainEvent::Assigned,
        }
    }
}

/// One (variable, event-kind) subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub var: VarId,
    pub event: EventKind,
}

impl Subscription {
    pub fn new(var: VarId, event: EventKind) -> Self {
        Self { var, event }
    }
}

/// Relative cost of running a propagator once.
///
/// The propagation loop drains cheap propagators before expensive ones so
/// that a conflict detectable by a linear check never pays for a full
/// graph analysis first. The fail/not-fail outcome does not depend on
/// this ordering; only the work done to reach it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PropCost {
    /// Linear in the number of subscribed variables.
    Linear,
    /// Low-degree polynomial (e.g. per-processor response-time analysis).
    Quadratic,
    /// Global graph analysis (e.g. cycle-ratio computation).
    Crazy,
}

/// Result of one `propagate()` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The remaining domains admit no solution; abandon the branch.
    Failed(Conflict),
    /// The propagator's invariant holds for the current domains and no
    /// further pruning is possible until a subscribed variable changes.
    Fixpoint,
    /// The invariant can never again be violated (typically all inputs
    /// assigned); the propagator need not be invoked again in this
    /// subtree or any subtree below it.
    Subsumed,
}

/// An incremental constraint-checking and domain-pruning unit.
///
/// Object-safe; the search engine stores propagators as
/// `Vec<Box<dyn Propagator>>` and clones them together with the domain
/// store at every choice point via [`Propagator::boxed_clone`].
pub trait Propagator {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// The variables this propagator reads, with the event kind that
    /// should wake it. Called once at registration.
    fn subscriptions(&self) -> Vec<Subscription>;

    /// Variables this propagator may shrink that it does not subscribe
    /// to (derived outputs such as period bounds). Called once at
    /// registration; used for auditing, not scheduling.
    fn outputs(&self) -> Vec<VarId> {
        Vec::new()
    }

    /// Re-checks the invariant against the current domains.
    fn propagate(&mut self, store: &mut DomainStore) -> Propagation;

    /// Relative cost estimate used to order the propagation queue.
    fn cost(&self) -> PropCost;

    /// Clones the propagator for a child search node.
    fn boxed_clone(&self) -> Box<dyn Propagator>;
}

impl Clone for Box<dyn Propagator> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}
