//! The domain store.

use super::domain::{Domain, Shrink};
use crate::error::Conflict;

/// Index of a decision variable in a [`DomainStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// What happened to a variable's domain, from the point of view of a
/// subscriber.
///
/// Events are ordered by strength: `Assigned` implies `Bounds` implies
/// `Changed`. A propagator subscribed to `Bounds` is woken by `Bounds`
/// and `Assigned` events, one subscribed to `Changed` by all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DomainEvent {
    /// Some value was removed from the interior of the domain.
    Changed,
    /// The minimum or maximum moved.
    Bounds,
    /// The domain became a singleton.
    Assigned,
}

/// Owns, per decision variable, the set of admissible values.
///
/// All shrinks are monotonic within a search node; the only way to undo
/// them is to restore a previously cloned store — there is no undo log.
/// Changes are recorded in an internal event log which the propagation
/// loop drains to wake subscribed propagators.
///
/// # Examples
///
/// ```
/// use mapdse::store::{Domain, DomainStore};
///
/// let mut store = DomainStore::new();
/// let x = store.new_var(Domain::range(0, 3));
/// store.assign(x, 2).unwrap();
/// assert_eq!(store.value(x), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DomainStore {
    domains: Vec<Domain>,
    log: Vec<(VarId, DomainEvent)>,
}

impl DomainStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable with the given initial domain.
    pub fn new_var(&mut self, domain: Domain) -> VarId {
        self.domains.push(domain);
        VarId(self.domains.len() - 1)
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.domains.len()
    }

    /// The domain of `var`.
    pub fn domain(&self, var: VarId) -> &Domain {
        &self.domains[var.0]
    }

    /// Smallest admissible value of `var`.
    pub fn min(&self, var: VarId) -> i64 {
        self.domains[var.0].min()
    }

    /// Largest admissible value of `var`.
    pub fn max(&self, var: VarId) -> i64 {
        self.domains[var.0].max()
    }

    /// Whether `var` is assigned (singleton domain).
    pub fn is_assigned(&self, var: VarId) -> bool {
        self.domains[var.0].is_assigned()
    }

    /// The assigned value of `var`, if any.
    pub fn value(&self, var: VarId) -> Option<i64> {
        self.domains[var.0].value()
    }

    /// Whether every variable in `vars` is assigned.
    pub fn all_assigned(&self, vars: &[VarId]) -> bool {
        vars.iter().all(|&v| self.is_assigned(v))
    }

    /// Assigns `var` to `value`. Returns whether the domain changed.
    pub fn assign(&mut self, var: VarId, value: i64) -> Result<bool, Conflict> {
        let outcome = self.domains[var.0].assign(value);
        self.record(var, outcome)
    }

    /// Removes `value` from the domain of `var`.
    pub fn remove(&mut self, var: VarId, value: i64) -> Result<bool, Conflict> {
        let outcome = self.domains[var.0].remove(value);
        self.record(var, outcome)
    }

    /// Raises the lower bound of `var` to at least `bound`.
    pub fn tighten_min(&mut self, var: VarId, bound: i64) -> Result<bool, Conflict> {
        let outcome = self.domains[var.0].tighten_min(bound);
        self.record(var, outcome)
    }

    /// Lowers the upper bound of `var` to at most `bound`.
    pub fn tighten_max(&mut self, var: VarId, bound: i64) -> Result<bool, Conflict> {
        let outcome = self.domains[var.0].tighten_max(bound);
        self.record(var, outcome)
    }

    /// Keeps only the values of `var` satisfying `pred`.
    pub fn retain(&mut self, var: VarId, pred: impl Fn(i64) -> bool) -> Result<bool, Conflict> {
        let before_min = self.domains[var.0].min();
        let before_max = self.domains[var.0].max();
        let outcome = self.domains[var.0].retain(pred);
        // retain only reports Shrunk/Assigned; upgrade to a bounds event
        // when an endpoint went away so bounds subscribers wake up.
        match outcome {
            Shrink::Shrunk
                if self.domains[var.0].min() == before_min
                    && self.domains[var.0].max() == before_max =>
            {
                self.log.push((var, DomainEvent::Changed));
                Ok(true)
            }
            other => self.record(var, other),
        }
    }

    /// Drains the pending change events.
    pub fn take_events(&mut self) -> Vec<(VarId, DomainEvent)> {
        std::mem::take(&mut self.log)
    }

    /// Whether change events are pending.
    pub fn has_events(&self) -> bool {
        !self.log.is_empty()
    }

    /// Snapshot of all assigned values; unassigned variables yield their
    /// current minimum.
    pub fn snapshot_mins(&self) -> Vec<i64> {
        self.domains.iter().map(|d| d.min()).collect()
    }

    fn record(&mut self, var: VarId, outcome: Shrink) -> Result<bool, Conflict> {
        match outcome {
            Shrink::Unchanged => Ok(false),
            Shrink::Shrunk => {
                self.log.push((var, DomainEvent::Bounds));
                Ok(true)
            }
            Shrink::Assigned => {
                self.log.push((var, DomainEvent::Assigned));
                Ok(true)
            }
            Shrink::Empty => Err(Conflict::EmptyDomain { var }),
        }
    }
}
