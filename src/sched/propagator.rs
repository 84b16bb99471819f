//! The schedulability propagator.

use crate::error::Conflict;
use crate::model::WcetTable;
use crate::propagator::{EventKind, PropCost, Propagation, Propagator, Subscription};
use crate::store::{DomainStore, VarId};
use std::sync::Arc;

/// Immutable inputs of a [`SchedulabilityPropagator`].
///
/// Entity indices follow the global convention: `[0, n_actors)` are
/// dataflow firings, `[n_actors, n_actors + n_tasks)` are periodic tasks.
/// `periods`, `priorities` and `deadlines` use *local* task indices
/// (`global - n_actors`). Priority 0 is the highest.
#[derive(Debug, Clone)]
pub struct SchedParams {
    /// Number of dataflow firings preceding the tasks in the index space.
    pub n_actors: usize,
    /// Processor variable per entity (actors and tasks).
    pub proc: Vec<VarId>,
    /// Mode variable per processor.
    pub proc_mode: Vec<VarId>,
    /// WCET lookup `(entity, processor, mode)`.
    pub wcet: Arc<WcetTable>,
    /// Release period per task.
    pub periods: Vec<i64>,
    /// Rate-monotonic priority per task (0 is highest).
    pub priorities: Vec<i64>,
    /// Relative deadline per task.
    pub deadlines: Vec<i64>,
}

impl SchedParams {
    fn n_tasks(&self) -> usize {
        self.periods.len()
    }
}

/// Utilization-bound plus time-demand fixed-priority analysis.
///
/// Re-checked whenever a `proc` or `proc_mode` variable becomes assigned.
/// For every processor whose mode is decided, the tasks already assigned
/// to it are tested; a failure is final for the whole subtree (placing
/// further tasks can only increase demand), so the propagator fails the
/// branch immediately — the early-pruning contract.
///
/// Sound on partial assignments, exact on complete ones.
pub struct SchedulabilityPropagator {
    params: SchedParams,
}

impl SchedulabilityPropagator {
    pub fn new(params: SchedParams) -> Self {
        Self { params }
    }

    /// Tasks currently assigned to `proc_id`, as local task indices.
    fn tasks_on(&self, store: &DomainStore, proc_id: usize) -> Vec<usize> {
        (0..self.params.n_tasks())
            .filter(|&t| {
                store.value(self.params.proc[self.params.n_actors + t]) == Some(proc_id as i64)
            })
            .collect()
    }

    fn task_wcet(&self, store: &DomainStore, task: usize, proc_id: usize) -> i64 {
        let mode = store
            .value(self.params.proc_mode[proc_id])
            .expect("mode checked assigned") as usize;
        self.params
            .wcet
            .get(self.params.n_actors + task, proc_id, mode)
    }

    /// Liu & Layland utilization-bound test: `n * (2^(1/n) - 1)`.
    fn utilization_bound(&self, store: &DomainStore, proc_id: usize, tasks: &[usize]) -> bool {
        if tasks.is_empty() {
            return true;
        }
        let utilization: f64 = tasks
            .iter()
            .map(|&t| self.task_wcet(store, t, proc_id) as f64 / self.params.deadlines[t] as f64)
            .sum();
        let n = tasks.len() as f64;
        utilization <= n * (2f64.powf(1.0 / n) - 1.0)
    }

    /// Level-i workload at time `t`: own WCET plus interference from all
    /// higher-priority tasks on the same processor.
    fn workload(&self, store: &DomainStore, proc_id: usize, task: usize, t: i64) -> i64 {
        let mut w = self.task_wcet(store, task, proc_id);
        for other in self.tasks_on(store, proc_id) {
            if self.params.priorities[other] < self.params.priorities[task] {
                let releases = (t + self.params.periods[other] - 1) / self.params.periods[other];
                w += releases * self.task_wcet(store, other, proc_id);
            }
        }
        w
    }

    /// Exact time-demand test: task `i` is schedulable iff some
    /// `t <= deadline(i)` satisfies `W(i, t) <= t`.
    fn time_demand(&self, store: &DomainStore, proc_id: usize, tasks: &[usize]) -> Result<(), usize> {
        for &task in tasks {
            let ok = (1..=self.params.deadlines[task])
                .any(|t| self.workload(store, proc_id, task, t) <= t);
            if !ok {
                return Err(task);
            }
        }
        Ok(())
    }

    /// Runs both tests on every processor with an assigned mode.
    fn check(&self, store: &DomainStore) -> Result<(), Conflict> {
        for proc_id in 0..self.params.proc_mode.len() {
            if !store.is_assigned(self.params.proc_mode[proc_id]) {
                continue;
            }
            let tasks = self.tasks_on(store, proc_id);
            if self.utilization_bound(store, proc_id, &tasks) {
                continue;
            }
            if let Err(task) = self.time_demand(store, proc_id, &tasks) {
                log::debug!(
                    "schedulability: task {} fails on processor {}",
                    self.params.n_actors + task,
                    proc_id
                );
                return Err(Conflict::Unschedulable {
                    processor: proc_id,
                    task: self.params.n_actors + task,
                });
            }
        }
        Ok(())
    }
}

impl Propagator for SchedulabilityPropagator {
    fn name(&self) -> &str {
        "schedulability"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let n = self.params.n_actors;
        self.params.proc[n..]
            .iter()
            .chain(self.params.proc_mode.iter())
            .map(|&v| Subscription::new(v, EventKind::Assigned))
            .collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        match self.check(store) {
            Err(conflict) => Propagation::Failed(conflict),
            Ok(()) => {
                let task_procs = &self.params.proc[self.params.n_actors..];
                if store.all_assigned(task_procs) && store.all_assigned(&self.params.proc_mode) {
                    Propagation::Subsumed
                } else {
                    Propagation::Fixpoint
                }
            }
        }
    }

    fn cost(&self) -> PropCost {
        PropCost::Quadratic
    }

    fn boxed_clone(&self) -> Box<dyn Propagator> {
        Box::new(Self {
            params: self.params.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{simulate_fixed_priority, SimTask};
    use crate::store::Domain;

    /// One processor, one mode, `n` tasks with the given (period, wcet);
    /// deadlines equal periods, priorities rate-monotonic.
    fn setup(tasks: &[(i64, i64)]) -> (DomainStore, SchedulabilityPropagator) {
        let n_tasks = tasks.len();
        let mut store = DomainStore::new();
        let proc: Vec<VarId> = (0..n_tasks)
            .map(|_| store.new_var(Domain::singleton(0)))
            .collect();
        let proc_mode = vec![store.new_var(Domain::singleton(0))];

        let mut wcet = WcetTable::new(n_tasks, 1, 1);
        for (t, &(_, c)) in tasks.iter().enumerate() {
            wcet.set(t, 0, 0, c);
        }

        let mut order: Vec<usize> = (0..n_tasks).collect();
        order.sort_by_key(|&t| tasks[t].0);
        let mut priorities = vec![0i64; n_tasks];
        for (rank, &t) in order.iter().enumerate() {
            priorities[t] = rank as i64;
        }

        let params = SchedParams {
            n_actors: 0,
            proc,
            proc_mode,
            wcet: Arc::new(wcet),
            periods: tasks.iter().map(|&(p, _)| p).collect(),
            priorities,
            deadlines: tasks.iter().map(|&(p, _)| p).collect(),
        };
        (store, SchedulabilityPropagator::new(params))
    }

    #[test]
    fn test_utilization_below_bound_accepts() {
        // utilization 0.5 <= 0.828 for n=2: no time-demand needed
        let (mut store, mut p) = setup(&[(10, 3), (20, 4)]);
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
    }

    #[test]
    fn test_time_demand_accepts_above_bound() {
        // harmonic set at 100% utilization: bound fails, time-demand passes
        let (mut store, mut p) = setup(&[(4, 2), (8, 4)]);
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
    }

    #[test]
    fn test_overload_fails() {
        let (mut store, mut p) = setup(&[(4, 3), (8, 4)]);
        match p.propagate(&mut store) {
            Propagation::Failed(Conflict::Unschedulable { processor, .. }) => {
                assert_eq!(processor, 0)
            }
            other => panic!("expected unschedulable, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_mapping_prunes_early() {
        // two tasks assigned, a third still open: the assigned pair
        // already overloads the processor, so the branch must fail now
        let mut store = DomainStore::new();
        let proc = vec![
            store.new_var(Domain::singleton(0)),
            store.new_var(Domain::singleton(0)),
            store.new_var(Domain::range(0, 1)),
        ];
        let proc_mode = vec![
            store.new_var(Domain::singleton(0)),
            store.new_var(Domain::singleton(0)),
        ];
        let mut wcet = WcetTable::new(3, 2, 1);
        for t in 0..3 {
            for p in 0..2 {
                wcet.set(t, p, 0, [3, 4, 1][t]);
            }
        }
        let params = SchedParams {
            n_actors: 0,
            proc,
            proc_mode,
            wcet: Arc::new(wcet),
            periods: vec![4, 8, 100],
            priorities: vec![0, 1, 2],
            deadlines: vec![4, 8, 100],
        };
        let mut p = SchedulabilityPropagator::new(params);
        assert!(matches!(p.propagate(&mut store), Propagation::Failed(_)));
    }

    #[test]
    fn test_unassigned_mode_is_skipped() {
        let mut store = DomainStore::new();
        let proc = vec![store.new_var(Domain::singleton(0))];
        let proc_mode = vec![store.new_var(Domain::range(0, 1))];
        let mut wcet = WcetTable::new(1, 1, 2);
        wcet.set(0, 0, 0, 100);
        wcet.set(0, 0, 1, 100);
        let params = SchedParams {
            n_actors: 0,
            proc,
            proc_mode,
            wcet: Arc::new(wcet),
            periods: vec![10],
            priorities: vec![0],
            deadlines: vec![10],
        };
        // wildly overloaded, but the mode is open: no verdict yet
        let mut p = SchedulabilityPropagator::new(params);
        assert_eq!(p.propagate(&mut store), Propagation::Fixpoint);
    }

    #[test]
    fn test_idempotent_reinvocation() {
        let (mut store, mut p) = setup(&[(10, 3), (20, 4)]);
        store.take_events();
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
        assert!(!store.has_events());
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
        assert!(!store.has_events());
    }

    // ---- agreement with forward simulation ----

    #[test]
    fn test_agrees_with_simulation() {
        let candidates: &[&[(i64, i64)]] = &[
            &[(10, 3), (20, 4)],
            &[(4, 2), (8, 4)],
            &[(4, 3), (8, 4)],
            &[(5, 1), (10, 2), (20, 8)],
            &[(3, 1), (6, 2), (12, 4)],
            &[(6, 2), (8, 3), (12, 3)],
        ];
        for &set in candidates {
            let (mut store, mut p) = setup(set);
            let verdict = !matches!(p.propagate(&mut store), Propagation::Failed(_));

            let mut order: Vec<usize> = (0..set.len()).collect();
            order.sort_by_key(|&t| set[t].0);
            let sim_tasks: Vec<SimTask> = set
                .iter()
                .enumerate()
                .map(|(t, &(period, wcet))| SimTask {
                    period,
                    deadline: period,
                    wcet,
                    priority: order.iter().position(|&x| x == t).unwrap() as i64,
                })
                .collect();
            assert_eq!(
                verdict,
                simulate_fixed_priority(&sim_tasks),
                "analysis and simulation disagree on {set:?}"
            );
        }
    }
}
