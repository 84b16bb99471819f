//! Depth-first branch-and-bound over a domain store.

use std::collections::BTreeSet;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::config::{SearchConfig, ValueHeuristic};
use crate::error::Conflict;
use crate::propagator::{PropCost, Propagation, Propagator, Subscription};
use crate::store::{DomainStore, VarId};

/// Counters accumulated over one exploration.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchStats {
    /// Search nodes entered (fixpoints computed).
    pub nodes: u64,
    /// Branches abandoned on a conflict.
    pub failures: u64,
    /// Solutions found (including non-improving ones under no objective).
    pub solutions: u64,
    pub elapsed_ms: u64,
}

/// Result of one exploration.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Store of the best solution found.
    pub best: Option<DomainStore>,
    /// Objective value of `best`, when an objective was given.
    pub best_objective: Option<i64>,
    pub stats: SearchStats,
    /// The stop predicate tripped before the tree was exhausted, so a
    /// better solution may exist.
    pub time_limited: bool,
}

/// One propagation-and-branching state of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Propagate the current node to fixpoint.
    Active,
    /// Choose a variable and value, clone, descend.
    Branching,
    /// Abandon the current node, resume the deepest open choice point.
    Backtrack,
    /// Tree exhausted or stop predicate tripped.
    Terminal,
}

/// An open choice point: the parent fixpoint plus untried values.
struct Frame {
    store: DomainStore,
    props: Vec<Box<dyn Propagator>>,
    subsumed: Vec<bool>,
    var: VarId,
    values: Vec<i64>,
    next_value: usize,
    /// Incumbent generation the stored fixpoint was computed under.
    seen_best: u64,
}

/// The current node being propagated or branched on.
struct Node {
    store: DomainStore,
    props: Vec<Box<dyn Propagator>>,
    subsumed: Vec<bool>,
    seen_best: u64,
}

/// Depth-first branch-and-bound with clone-on-branch.
///
/// Propagators are drained to fixpoint cheapest cost bucket first; the
/// fail/not-fail outcome is order-independent, the ordering only avoids
/// paying for a graph analysis when a linear check already fails the
/// node. On each improving solution the objective upper bound is
/// tightened, and nodes restored from older choice points re-apply the
/// newest bound before propagating.
pub struct SearchEngine {
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Explores assignments of `branch_vars`, minimizing `objective` if
    /// one is given, otherwise collecting the last solution found.
    pub fn minimize(
        &self,
        store: DomainStore,
        props: Vec<Box<dyn Propagator>>,
        branch_vars: Vec<VarId>,
        objective: Option<VarId>,
    ) -> SearchOutcome {
        let started = Instant::now();
        let subscriptions: Vec<Vec<Subscription>> =
            props.iter().map(|p| p.subscriptions()).collect();
        let mut rng = match self.config.value_heuristic {
            ValueHeuristic::Random { seed } => Some(StdRng::seed_from_u64(seed)),
            ValueHeuristic::MinValue => None,
        };

        let mut stats = SearchStats::default();
        let mut time_limited = false;
        let mut best: Option<DomainStore> = None;
        let mut best_objective: Option<i64> = None;
        // bumped on every improving solution; nodes carrying an older
        // generation re-tighten before propagating
        let mut incumbent_gen: u64 = 0;

        let mut stack: Vec<Frame> = Vec::new();
        let subsumed = vec![false; props.len()];
        let mut node = Some(Node {
            store,
            props,
            subsumed,
            seen_best: 0,
        });
        let mut state = State::Active;

        loop {
            match state {
                State::Active => {
                    // stop predicate, polled only at node boundaries so
                    // a store is never abandoned mid-propagation
                    stats.nodes += 1;
                    let over_time = self
                        .config
                        .time_limit_ms
                        .is_some_and(|ms| started.elapsed().as_millis() as u64 >= ms);
                    let over_nodes = self.config.node_limit.is_some_and(|n| stats.nodes > n);
                    if over_time || over_nodes {
                        time_limited = true;
                        state = State::Terminal;
                        continue;
                    }

                    let n = node.as_mut().expect("active state always has a node");
                    if n.seen_best < incumbent_gen {
                        n.seen_best = incumbent_gen;
                        let (Some(obj), Some(bound)) = (objective, best_objective) else {
                            unreachable!("incumbent generation moved without an objective")
                        };
                        if n.store.tighten_max(obj, bound - 1).is_err() {
                            stats.failures += 1;
                            state = State::Backtrack;
                            continue;
                        }
                    }

                    match propagate_to_fixpoint(
                        &mut n.store,
                        &mut n.props,
                        &mut n.subsumed,
                        &subscriptions,
                    ) {
                        Err(conflict) => {
                            log::trace!("node failed: {conflict}");
                            stats.failures += 1;
                            state = State::Backtrack;
                        }
                        Ok(()) => {
                            if branch_vars.iter().all(|&v| n.store.is_assigned(v)) {
                                stats.solutions += 1;
                                let obj_val = objective.map(|o| n.store.min(o));
                                let improved = match (obj_val, best_objective) {
                                    (Some(new), Some(old)) => new < old,
                                    _ => true,
                                };
                                if improved {
                                    if let Some(new) = obj_val {
                                        log::debug!(
                                            "solution {} with objective {new}",
                                            stats.solutions
                                        );
                                        best_objective = Some(new);
                                        incumbent_gen += 1;
                                    }
                                    best = Some(n.store.clone());
                                }
                                state = if self.config.stop_after_first {
                                    State::Terminal
                                } else {
                                    State::Backtrack
                                };
                            } else {
                                state = State::Branching;
                            }
                        }
                    }
                }

                State::Branching => {
                    let n = node.take().expect("branching state always has a node");
                    let var = branch_vars
                        .iter()
                        .copied()
                        .find(|&v| !n.store.is_assigned(v))
                        .expect("branching only on incomplete assignments");
                    let mut values: Vec<i64> = n.store.domain(var).iter().collect();
                    if let Some(rng) = rng.as_mut() {
                        values.shuffle(rng);
                    }
                    stack.push(Frame {
                        store: n.store,
                        props: n.props,
                        subsumed: n.subsumed,
                        var,
                        values,
                        next_value: 0,
                        seen_best: n.seen_best,
                    });
                    state = State::Backtrack; // falls through to descend
                }

                State::Backtrack => match stack.last_mut() {
                    None => state = State::Terminal,
                    Some(frame) if frame.next_value >= frame.values.len() => {
                        stack.pop();
                    }
                    Some(frame) => {
                        let value = frame.values[frame.next_value];
                        frame.next_value += 1;
                        let mut child = Node {
                            store: frame.store.clone(),
                            props: frame.props.clone(),
                            subsumed: frame.subsumed.clone(),
                            seen_best: frame.seen_best,
                        };
                        match child.store.assign(frame.var, value) {
                            Err(_) => {
                                // value already pruned by a newer bound
                                stats.failures += 1;
                            }
                            Ok(_) => {
                                node = Some(child);
                                state = State::Active;
                            }
                        }
                    }
                },

                State::Terminal => break,
            }
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        log::debug!(
            "search done: {} nodes, {} failures, {} solutions{}",
            stats.nodes,
            stats.failures,
            stats.solutions,
            if time_limited { " (budget hit)" } else { "" }
        );
        SearchOutcome {
            best,
            best_objective,
            stats,
            time_limited,
        }
    }
}

/// Runs subscribed propagators until none has pending work.
///
/// The pending set is ordered `(cost, index)`, so all `Linear`
/// propagators drain before any `Quadratic` one and so on. Every event
/// drained from the store wakes the propagators whose subscription
/// matches it; subsumed ones are never re-queued.
fn propagate_to_fixpoint(
    store: &mut DomainStore,
    props: &mut [Box<dyn Propagator>],
    subsumed: &mut [bool],
    subscriptions: &[Vec<Subscription>],
) -> Result<(), Conflict> {
    // events from the branching assignment are superseded by running
    // every live propagator once
    store.take_events();
    let mut pending: BTreeSet<(PropCost, usize)> = props
        .iter()
        .enumerate()
        .filter(|(i, _)| !subsumed[*i])
        .map(|(i, p)| (p.cost(), i))
        .collect();

    while let Some(&(cost, i)) = pending.iter().next() {
        pending.remove(&(cost, i));
        match props[i].propagate(store) {
            Propagation::Failed(conflict) => return Err(conflict),
            Propagation::Subsumed => {
                subsumed[i] = true;
            }
            Propagation::Fixpoint => {}
        }
        for (var, event) in store.take_events() {
            for (j, subs) in subscriptions.iter().enumerate() {
                if subsumed[j] {
                    continue;
                }
                if subs
                    .iter()
                    .any(|s| s.var == var && s.event.matches(event))
                {
                    pending.insert((props[j].cost(), j));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagator::{EventKind, Subscription};
    use crate::store::Domain;

    /// Test propagator: `sum = x + y`, bounds-consistent.
    #[derive(Clone)]
    struct Sum {
        x: VarId,
        y: VarId,
        sum: VarId,
    }

    impl Propagator for Sum {
        fn name(&self) -> &str {
            "sum"
        }

        fn subscriptions(&self) -> Vec<Subscription> {
            vec![
                Subscription::new(self.x, EventKind::Bounds),
                Subscription::new(self.y, EventKind::Bounds),
                Subscription::new(self.sum, EventKind::Bounds),
            ]
        }

        fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
            let run = (|| -> Result<(), Conflict> {
                store.tighten_min(self.sum, store.min(self.x) + store.min(self.y))?;
                store.tighten_max(self.sum, store.max(self.x) + store.max(self.y))?;
                store.tighten_max(self.x, store.max(self.sum) - store.min(self.y))?;
                store.tighten_max(self.y, store.max(self.sum) - store.min(self.x))?;
                Ok(())
            })();
            match run {
                Err(c) => Propagation::Failed(c),
                Ok(()) => {
                    if store.is_assigned(self.x) && store.is_assigned(self.y) {
                        Propagation::Subsumed
                    } else {
                        Propagation::Fixpoint
                    }
                }
            }
        }

        fn cost(&self) -> PropCost {
            PropCost::Linear
        }

        fn boxed_clone(&self) -> Box<dyn Propagator> {
            Box::new(self.clone())
        }
    }

    /// Test propagator: `x != y` once both are assigned.
    #[derive(Clone)]
    struct NotEqual {
        x: VarId,
        y: VarId,
    }

    impl Propagator for NotEqual {
        fn name(&self) -> &str {
            "not_equal"
        }

        fn subscriptions(&self) -> Vec<Subscription> {
            vec![
                Subscription::new(self.x, EventKind::Assigned),
                Subscription::new(self.y, EventKind::Assigned),
            ]
        }

        fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
            if let Some(v) = store.value(self.x) {
                if store.domain(self.y).contains(v) {
                    if let Err(c) = store.remove(self.y, v) {
                        return Propagation::Failed(c);
                    }
                }
            }
            if let Some(v) = store.value(self.y) {
                if store.domain(self.x).contains(v) {
                    if let Err(c) = store.remove(self.x, v) {
                        return Propagation::Failed(c);
                    }
                }
            }
            if store.is_assigned(self.x) && store.is_assigned(self.y) {
                Propagation::Subsumed
            } else {
                Propagation::Fixpoint
            }
        }

        fn cost(&self) -> PropCost {
            PropCost::Linear
        }

        fn boxed_clone(&self) -> Box<dyn Propagator> {
            Box::new(self.clone())
        }
    }

    /// `x, y` in 0..3 with `x != y`, minimize `x + y`.
    fn sum_problem() -> (DomainStore, Vec<Box<dyn Propagator>>, Vec<VarId>, VarId) {
        let mut store = DomainStore::new();
        let x = store.new_var(Domain::range(0, 3));
        let y = store.new_var(Domain::range(0, 3));
        let sum = store.new_var(Domain::range(0, 6));
        let props: Vec<Box<dyn Propagator>> = vec![
            Box::new(Sum { x, y, sum }),
            Box::new(NotEqual { x, y }),
        ];
        (store, props, vec![x, y], sum)
    }

    #[test]
    fn test_minimize_finds_optimum() {
        let (store, props, branch, sum) = sum_problem();
        let engine = SearchEngine::new(SearchConfig::default());
        let outcome = engine.minimize(store, props, branch.clone(), Some(sum));
        assert_eq!(outcome.best_objective, Some(1));
        assert!(!outcome.time_limited);
        let best = outcome.best.unwrap();
        let (x, y) = (best.value(branch[0]), best.value(branch[1]));
        assert!(matches!((x, y), (Some(0), Some(1)) | (Some(1), Some(0))));
    }

    #[test]
    fn test_stop_after_first_returns_one_solution() {
        let (store, props, branch, sum) = sum_problem();
        let engine = SearchEngine::new(SearchConfig::first_solution());
        let outcome = engine.minimize(store, props, branch, Some(sum));
        assert_eq!(outcome.stats.solutions, 1);
        assert!(outcome.best.is_some());
    }

    #[test]
    fn test_infeasible_exhausts_with_no_solution() {
        let mut store = DomainStore::new();
        let x = store.new_var(Domain::range(0, 1));
        let y = store.new_var(Domain::range(0, 1));
        let sum = store.new_var(Domain::singleton(5));
        let props: Vec<Box<dyn Propagator>> = vec![Box::new(Sum { x, y, sum })];
        let engine = SearchEngine::new(SearchConfig::default());
        let outcome = engine.minimize(store, props, vec![x, y], Some(sum));
        assert!(outcome.best.is_none());
        assert!(!outcome.time_limited);
        assert!(outcome.stats.failures > 0);
    }

    #[test]
    fn test_node_limit_reports_time_limited() {
        let (store, props, branch, sum) = sum_problem();
        let engine = SearchEngine::new(SearchConfig::default().with_node_limit(1));
        let outcome = engine.minimize(store, props, branch, Some(sum));
        assert!(outcome.time_limited);
    }

    #[test]
    fn test_random_heuristic_is_reproducible() {
        let run = |seed| {
            let (store, props, branch, sum) = sum_problem();
            let engine = SearchEngine::new(
                SearchConfig::default()
                    .with_value_heuristic(ValueHeuristic::Random { seed }),
            );
            let outcome = engine.minimize(store, props, branch, Some(sum));
            (outcome.best_objective, outcome.stats.nodes)
        };
        assert_eq!(run(7), run(7));
        // optimum is heuristic-independent
        assert_eq!(run(7).0, Some(1));
        assert_eq!(run(99).0, Some(1));
    }

    #[test]
    fn test_no_objective_collects_a_solution() {
        let (store, props, branch, _) = sum_problem();
        let engine = SearchEngine::new(SearchConfig::default());
        let outcome = engine.minimize(store, props, branch, None);
        assert!(outcome.best.is_some());
        assert!(outcome.best_objective.is_none());
        // every leaf with x != y is a solution
        assert_eq!(outcome.stats.solutions, 12);
    }
}
