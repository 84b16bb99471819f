//! Successor-chain propagators.
//!
//! The order variables are permutation-encoded: `next` forms disjoint
//! cycles, one per processor, each closed through that processor's extra
//! slot; `send_next` forms one cycle through the interconnect head slot;
//! `rec_next` forms one linear chain per destination, closed by the
//! shared end-of-chain sentinel. Three propagators keep these shapes:
//! value-consistent distinctness, processor coherence along decided
//! `next` edges, and a complete-walk validation once a chain is fully
//! assigned.

use crate::error::Conflict;
use crate::propagator::{EventKind, PropCost, Propagation, Propagator, Subscription};
use crate::store::{DomainStore, VarId};

/// Value-consistent alldifferent: an assigned value is removed from every
/// sibling domain, cascading until stable.
#[derive(Debug, Clone)]
pub struct DistinctPropagator {
    vars: Vec<VarId>,
}

impl DistinctPropagator {
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }
}

impl Propagator for DistinctPropagator {
    fn name(&self) -> &str {
        "distinct"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.vars
            .iter()
            .map(|&v| Subscription::new(v, EventKind::Assigned))
            .collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..self.vars.len() {
                let Some(v) = store.value(self.vars[i]) else {
                    continue;
                };
                for (j, &other) in self.vars.iter().enumerate() {
                    if j == i || !store.domain(other).contains(v) {
                        continue;
                    }
                    match store.remove(other, v) {
                        Err(conflict) => return Propagation::Failed(conflict),
                        Ok(did) => changed |= did,
                    }
                }
            }
        }
        if store.all_assigned(&self.vars) {
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

/// Keeps `proc` and `next` coherent and validates the firing order.
///
/// A decided edge `next[i] = j` between actors forces `proc[i]` and
/// `proc[j]` onto their common processors; an edge into a processor slot
/// pins the actor to that processor. Once every `next` is assigned the
/// per-processor cycles are walked and must visit every actor exactly
/// once, on the processor the cycle belongs to.
#[derive(Debug, Clone)]
pub struct ScheduleOrderingPropagator {
    n_actors: usize,
    /// Processor variable per actor.
    proc: Vec<VarId>,
    /// Successor variable per actor plus one slot per processor.
    next: Vec<VarId>,
}

impl ScheduleOrderingPropagator {
    pub fn new(n_actors: usize, proc: Vec<VarId>, next: Vec<VarId>) -> Self {
        debug_assert_eq!(proc.len(), n_actors);
        debug_assert!(next.len() > n_actors);
        Self {
            n_actors,
            proc,
            next,
        }
    }

    fn n_procs(&self) -> usize {
        self.next.len() - self.n_actors
    }

    fn prune(&self, store: &mut DomainStore) -> Result<(), Conflict> {
        let n = self.n_actors;

        // decided edges pin or intersect processor domains
        for i in 0..n {
            let Some(j) = store.value(self.next[i]) else {
                continue;
            };
            let j = j as usize;
            if j < n {
                let keep: Vec<i64> = store.domain(self.proc[i]).iter().collect();
                store.retain(self.proc[j], |v| keep.contains(&v))?;
                let keep: Vec<i64> = store.domain(self.proc[j]).iter().collect();
                store.retain(self.proc[i], |v| keep.contains(&v))?;
            } else {
                store.assign(self.proc[i], (j - n) as i64)?;
            }
        }
        for p in 0..self.n_procs() {
            if let Some(j) = store.value(self.next[n + p]) {
                let j = j as usize;
                if j < n {
                    store.assign(self.proc[j], p as i64)?;
                }
            }
        }

        // successor candidates must be processor-compatible
        let proc_doms: Vec<Vec<i64>> = (0..n)
            .map(|i| store.domain(self.proc[i]).iter().collect())
            .collect();
        for i in 0..n {
            let mine = proc_doms[i].clone();
            store.retain(self.next[i], |v| {
                let v = v as usize;
                if v < n {
                    proc_doms[v].iter().any(|p| mine.contains(p))
                } else {
                    mine.contains(&((v - n) as i64))
                }
            })?;
        }
        for p in 0..self.n_procs() {
            store.retain(self.next[n + p], |v| {
                let v = v as usize;
                v >= n || proc_doms[v].contains(&(p as i64))
            })?;
        }
        Ok(())
    }

    /// Walks every processor cycle of a fully assigned `next`.
    fn validate(&self, store: &DomainStore) -> Result<(), Conflict> {
        let n = self.n_actors;
        let mut visited = vec![false; n];
        for p in 0..self.n_procs() {
            let slot = n + p;
            let mut cur = store.value(self.next[slot]).unwrap_or(slot as i64) as usize;
            let mut steps = 0;
            while cur < n {
                if visited[cur] || store.value(self.proc[cur]) != Some(p as i64) {
                    return Err(Conflict::BrokenChain { var: self.next[cur] });
                }
                visited[cur] = true;
                cur = store.value(self.next[cur]).unwrap_or(0) as usize;
                steps += 1;
                if steps > n {
                    return Err(Conflict::BrokenChain { var: self.next[slot] });
                }
            }
            // the chain must close on its own processor slot
            if cur != slot {
                return Err(Conflict::BrokenChain { var: self.next[slot] });
            }
        }
        if let Some(missed) = visited.iter().position(|&v| !v) {
            return Err(Conflict::BrokenChain {
                var: self.next[missed],
            });
        }
        Ok(())
    }
}

impl Propagator for ScheduleOrderingPropagator {
    fn name(&self) -> &str {
        "schedule_ordering"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.next
            .iter()
            .map(|&v| Subscription::new(v, EventKind::Assigned))
            .chain(
                self.proc
                    .iter()
                    .map(|&v| Subscription::new(v, EventKind::Any)),
            )
            .collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        if let Err(conflict) = self.prune(store) {
            return Propagation::Failed(conflict);
        }
        if store.all_assigned(&self.next) && store.all_assigned(&self.proc) {
            match self.validate(store) {
                Err(conflict) => Propagation::Failed(conflict),
                Ok(()) => Propagation::Subsumed,
            }
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

/// Validates the interconnect message order once fully assigned.
///
/// The send chain must visit every channel exactly once, starting at the
/// head slot and ending back at the sentinel; the receive chains must
/// partition each destination's channels into one linear chain each.
#[derive(Debug, Clone)]
pub struct MessageOrderingPropagator {
    ch_dst: Vec<usize>,
    send_next: Vec<VarId>,
    rec_next: Vec<VarId>,
}

impl MessageOrderingPropagator {
    pub fn new(ch_dst: Vec<usize>, send_next: Vec<VarId>, rec_next: Vec<VarId>) -> Self {
        debug_assert_eq!(send_next.len(), ch_dst.len() + 1);
        debug_assert_eq!(rec_next.len(), ch_dst.len());
        Self {
            ch_dst,
            send_next,
            rec_next,
        }
    }

    fn n_channels(&self) -> usize {
        self.ch_dst.len()
    }

    fn validate(&self, store: &DomainStore) -> Result<(), Conflict> {
        let n_ch = self.n_channels();

        // send chain: head slot -> every channel once -> sentinel
        let mut visited = vec![false; n_ch];
        let mut cur = store.value(self.send_next[n_ch]).unwrap_or(n_ch as i64) as usize;
        while cur < n_ch {
            if visited[cur] {
                return Err(Conflict::BrokenChain {
                    var: self.send_next[cur],
                });
            }
            visited[cur] = true;
            cur = store.value(self.send_next[cur]).unwrap_or(0) as usize;
        }
        if let Some(missed) = visited.iter().position(|&v| !v) {
            return Err(Conflict::BrokenChain {
                var: self.send_next[missed],
            });
        }

        // receive chains: per destination, one linear chain over exactly
        // its own channels
        let mut pointed_at = vec![false; n_ch];
        for c in 0..n_ch {
            let v = store.value(self.rec_next[c]).unwrap_or(0) as usize;
            if v < n_ch {
                if self.ch_dst[v] != self.ch_dst[c] || pointed_at[v] {
                    return Err(Conflict::BrokenChain {
                        var: self.rec_next[c],
                    });
                }
                pointed_at[v] = true;
            }
        }
        // exactly one head per destination follows from counting: every
        // non-head is pointed at once, chains are linear, so each
        // destination with k channels has k-1 pointed-at ones
        for dst in self.ch_dst.iter().copied() {
            let members: Vec<usize> = (0..n_ch).filter(|&c| self.ch_dst[c] == dst).collect();
            let heads = members.iter().filter(|&&c| !pointed_at[c]).count();
            if heads != 1 {
                return Err(Conflict::BrokenChain {
                    var: self.rec_next[members[0]],
                });
            }
        }
        Ok(())
    }
}

impl Propagator for MessageOrderingPropagator {
    fn name(&self) -> &str {
        "message_ordering"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.send_next
            .iter()
            .chain(self.rec_next.iter())
            .map(|&v| Subscription::new(v, EventKind::Assigned))
            .collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        if store.all_assigned(&self.send_next) && store.all_assigned(&self.rec_next) {
            match self.validate(store) {
                Err(conflict) => Propagation::Failed(conflict),
                Ok(()) => Propagation::Subsumed,
            }
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

/// Forces data precedence into the static firing order.
///
/// A zero-token channel decided local means its destination consumes
/// within the same schedule iteration, so the source must fire earlier
/// in its processor's chain. The throughput graph drops the direct
/// dependency edge for exactly these channels, counting on this rule.
#[derive(Debug, Clone)]
pub struct DataPrecedencePropagator {
    n_actors: usize,
    ch_src: Vec<usize>,
    ch_dst: Vec<usize>,
    tok: Vec<i64>,
    send_time: Vec<VarId>,
    next: Vec<VarId>,
}

impl DataPrecedencePropagator {
    pub fn new(
        n_actors: usize,
        ch_src: Vec<usize>,
        ch_dst: Vec<usize>,
        tok: Vec<i64>,
        send_time: Vec<VarId>,
        next: Vec<VarId>,
    ) -> Self {
        Self {
            n_actors,
            ch_src,
            ch_dst,
            tok,
            send_time,
            next,
        }
    }

    /// Position of every actor in its processor chain, or `None` while
    /// some `next` is unassigned.
    fn positions(&self, store: &DomainStore) -> Option<Vec<usize>> {
        let n = self.n_actors;
        let mut pos = vec![usize::MAX; n];
        for slot in n..self.next.len() {
            let mut cur = store.value(self.next[slot])? as usize;
            let mut rank = 0;
            while cur < n && pos[cur] == usize::MAX {
                pos[cur] = rank;
                rank += 1;
                cur = store.value(self.next[cur])? as usize;
            }
        }
        Some(pos)
    }
}

impl Propagator for DataPrecedencePropagator {
    fn name(&self) -> &str {
        "data_precedence"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.next
            .iter()
            .chain(self.send_time.iter())
            .map(|&v| Subscription::new(v, EventKind::Assigned))
            .collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        // a zero-token local channel may never make the destination the
        // source's direct predecessor
        for c in 0..self.ch_src.len() {
            if self.tok[c] == 0
                && store.value(self.send_time[c]) == Some(0)
                && store.value(self.next[self.ch_dst[c]]) == Some(self.ch_src[c] as i64)
            {
                return Propagation::Failed(Conflict::BrokenChain {
                    var: self.next[self.ch_src[c]],
                });
            }
        }

        let Some(pos) = self.positions(store) else {
            return Propagation::Fixpoint;
        };
        for c in 0..self.ch_src.len() {
            if self.tok[c] > 0 || store.value(self.send_time[c]) != Some(0) {
                continue;
            }
            let (src, dst) = (self.ch_src[c], self.ch_dst[c]);
            if pos[src] == usize::MAX || pos[dst] == usize::MAX || pos[src] >= pos[dst] {
                return Propagation::Failed(Conflict::BrokenChain {
                    var: self.next[src],
                });
            }
        }
        if store.all_assigned(&self.next) && store.all_assigned(&self.send_time) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Domain;

    // ---- distinct ----

    #[test]
    fn test_distinct_cascades() {
        let mut store = DomainStore::new();
        let vars = vec![
            store.new_var(Domain::singleton(0)),
            store.new_var(Domain::range(0, 1)),
            store.new_var(Domain::range(0, 2)),
        ];
        let mut p = DistinctPropagator::new(vars.clone());
        // removing 0 assigns var1 to 1, which then strips var2 to 2
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
        assert_eq!(store.value(vars[1]), Some(1));
        assert_eq!(store.value(vars[2]), Some(2));
    }

    #[test]
    fn test_distinct_detects_duplicate() {
        let mut store = DomainStore::new();
        let vars = vec![
            store.new_var(Domain::singleton(3)),
            store.new_var(Domain::singleton(3)),
        ];
        let mut p = DistinctPropagator::new(vars);
        assert!(matches!(
            p.propagate(&mut store),
            Propagation::Failed(Conflict::EmptyDomain { .. })
        ));
    }

    // ---- schedule ordering ----

    /// Two actors, two processors; `next` has four slots.
    fn schedule_setup(
        store: &mut DomainStore,
        proc_doms: [Domain; 2],
        next_doms: [Domain; 4],
    ) -> ScheduleOrderingPropagator {
        let proc: Vec<VarId> = proc_doms.into_iter().map(|d| store.new_var(d)).collect();
        let next: Vec<VarId> = next_doms.into_iter().map(|d| store.new_var(d)).collect();
        ScheduleOrderingPropagator::new(2, proc, next)
    }

    #[test]
    fn test_edge_into_slot_pins_processor() {
        let mut store = DomainStore::new();
        let p = schedule_setup(
            &mut store,
            [Domain::range(0, 1), Domain::range(0, 1)],
            [
                Domain::singleton(3), // actor 0 last on processor 1
                Domain::range(0, 3),
                Domain::range(0, 3),
                Domain::range(0, 3),
            ],
        );
        let proc0 = p.proc[0];
        let mut p = p;
        assert_eq!(p.propagate(&mut store), Propagation::Fixpoint);
        assert_eq!(store.value(proc0), Some(1));
    }

    #[test]
    fn test_actor_edge_intersects_processors() {
        let mut store = DomainStore::new();
        let p = schedule_setup(
            &mut store,
            [Domain::singleton(0), Domain::range(0, 1)],
            [
                Domain::singleton(1), // 0 -> 1: same processor
                Domain::range(0, 3),
                Domain::range(0, 3),
                Domain::range(0, 3),
            ],
        );
        let proc1 = p.proc[1];
        let mut p = p;
        assert_eq!(p.propagate(&mut store), Propagation::Fixpoint);
        assert_eq!(store.value(proc1), Some(0));
    }

    #[test]
    fn test_complete_walk_accepts_valid_tour() {
        let mut store = DomainStore::new();
        // both actors on processor 0, order 0 then 1; processor 1 idle
        let mut p = schedule_setup(
            &mut store,
            [Domain::singleton(0), Domain::singleton(0)],
            [
                Domain::singleton(1),
                Domain::singleton(2),
                Domain::singleton(0),
                Domain::singleton(3),
            ],
        );
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
    }

    #[test]
    fn test_complete_walk_rejects_orphan_cycle() {
        let mut store = DomainStore::new();
        // actors point at each other, no processor slot in the cycle
        let mut p = schedule_setup(
            &mut store,
            [Domain::singleton(0), Domain::singleton(0)],
            [
                Domain::singleton(1),
                Domain::singleton(0),
                Domain::singleton(2),
                Domain::singleton(3),
            ],
        );
        assert!(matches!(
            p.propagate(&mut store),
            Propagation::Failed(Conflict::BrokenChain { .. })
        ));
    }

    // ---- message ordering ----

    #[test]
    fn test_send_chain_must_cover_all_channels() {
        let mut store = DomainStore::new();
        // two channels to distinct destinations; head -> 0 -> sentinel
        // leaves channel 1 unvisited
        let send_next = vec![
            store.new_var(Domain::singleton(2)),
            store.new_var(Domain::singleton(2)),
            store.new_var(Domain::singleton(0)),
        ];
        let rec_next = vec![
            store.new_var(Domain::singleton(2)),
            store.new_var(Domain::singleton(2)),
        ];
        let mut p = MessageOrderingPropagator::new(vec![1, 0], send_next, rec_next);
        assert!(matches!(
            p.propagate(&mut store),
            Propagation::Failed(Conflict::BrokenChain { .. })
        ));
    }

    #[test]
    fn test_valid_orders_subsume() {
        let mut store = DomainStore::new();
        // head -> 1 -> 0 -> sentinel; both receive chains trivial
        let send_next = vec![
            store.new_var(Domain::singleton(2)),
            store.new_var(Domain::singleton(0)),
            store.new_var(Domain::singleton(1)),
        ];
        let rec_next = vec![
            store.new_var(Domain::singleton(2)),
            store.new_var(Domain::singleton(2)),
        ];
        let mut p = MessageOrderingPropagator::new(vec![1, 0], send_next, rec_next);
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
    }

    // ---- data precedence ----

    /// One zero-token local channel 0 -> 1 on a single processor, with
    /// the complete order given as `next` values.
    fn precedence_setup(store: &mut DomainStore, next_vals: [i64; 3]) -> DataPrecedencePropagator {
        let send_time = vec![store.new_var(Domain::singleton(0))];
        let next = next_vals
            .into_iter()
            .map(|v| store.new_var(Domain::singleton(v)))
            .collect();
        DataPrecedencePropagator::new(2, vec![0], vec![1], vec![0], send_time, next)
    }

    #[test]
    fn test_source_before_destination_accepted() {
        let mut store = DomainStore::new();
        let mut p = precedence_setup(&mut store, [1, 2, 0]);
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
    }

    #[test]
    fn test_destination_before_source_rejected() {
        let mut store = DomainStore::new();
        let mut p = precedence_setup(&mut store, [2, 0, 1]);
        assert!(matches!(
            p.propagate(&mut store),
            Propagation::Failed(Conflict::BrokenChain { .. })
        ));
    }

    #[test]
    fn test_initial_tokens_lift_precedence() {
        let mut store = DomainStore::new();
        let send_time = vec![store.new_var(Domain::singleton(0))];
        let next = [2i64, 0, 1]
            .into_iter()
            .map(|v| store.new_var(Domain::singleton(v)))
            .collect();
        // one initial token decouples the iterations: order B, A is fine
        let mut p =
            DataPrecedencePropagator::new(2, vec![0], vec![1], vec![1], send_time, next);
        assert_eq!(p.propagate(&mut store), Propagation::Subsumed);
    }

    #[test]
    fn test_receive_chain_crossing_destinations_rejected() {
        let mut store = DomainStore::new();
        let send_next = vec![
            store.new_var(Domain::singleton(2)),
            store.new_var(Domain::singleton(0)),
            store.new_var(Domain::singleton(1)),
        ];
        // channel 0 (dst 1) points at channel 1 (dst 0)
        let rec_next = vec![
            store.new_var(Domain::singleton(1)),
            store.new_var(Domain::singleton(2)),
        ];
        let mut p = MessageOrderingPropagator::new(vec![1, 0], send_next, rec_next);
        assert!(matches!(
            p.propagate(&mut store),
            Propagation::Failed(Conflict::BrokenChain { .. })
        ));
    }
}
