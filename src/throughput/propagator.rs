//! The throughput propagator.

use super::mcr::{maximum_cycle_ratio, McrOutcome};
use super::msag::build_msag;
use super::sim::self_timed_execution;
use crate::error::Conflict;
use crate::model::WcetTable;
use crate::propagator::{EventKind, PropCost, Propagation, Propagator, Subscription};
use crate::store::{DomainStore, VarId};
use std::sync::Arc;

/// Immutable inputs of a [`ThroughputPropagator`].
///
/// Entity indices `[0, n_actors)` are dataflow firings; periodic tasks
/// follow and carry no application. `next` has `n_actors + n_procs`
/// slots: `next[i] = n_actors + p` marks firing `i` as last on processor
/// `p`, and slot `n_actors + p` names the processor's first firing (or
/// `n_actors` for an idle processor). `send_next` has one extra head
/// slot at index `n_channels`; `rec_next[c] = n_channels` ends a
/// destination's receive chain.
#[derive(Debug, Clone)]
pub struct ThroughputParams {
    pub n_actors: usize,
    pub n_procs: usize,
    /// Application of each actor (local index, `len == n_actors`).
    pub actor_app: Vec<usize>,
    pub n_apps: usize,
    /// Channel endpoints and initial tokens.
    pub ch_src: Vec<usize>,
    pub ch_dst: Vec<usize>,
    pub tok: Vec<i64>,
    /// Fixed receive cost per channel.
    pub recv_time: Vec<i64>,
    /// Processor variable per entity.
    pub proc: Vec<VarId>,
    /// Mode variable per processor.
    pub proc_mode: Vec<VarId>,
    /// WCET lookup `(entity, processor, mode)`.
    pub wcet: Arc<WcetTable>,
    pub next: Vec<VarId>,
    pub send_next: Vec<VarId>,
    pub rec_next: Vec<VarId>,
    pub block_time: Vec<VarId>,
    pub send_time: Vec<VarId>,
    pub send_buf: Vec<VarId>,
    pub rec_buf: Vec<VarId>,
    /// Output: steady-state period per application.
    pub period: Vec<VarId>,
    /// Output: first-iteration latency per application.
    pub latency: Vec<VarId>,
}

impl ThroughputParams {
    pub fn n_entities(&self) -> usize {
        self.proc.len()
    }

    pub fn n_channels(&self) -> usize {
        self.ch_src.len()
    }

    /// Application of entity `e`; periodic tasks have none.
    pub fn app_of(&self, e: usize) -> Option<usize> {
        if e < self.n_actors {
            Some(self.actor_app[e])
        } else {
            None
        }
    }

    /// Optimistic WCET of entity `e`: the minimum over every processor
    /// and mode still in its domains. Zero entries mark placements the
    /// entity cannot execute in and do not count.
    pub fn wcet_lb(&self, store: &DomainStore, e: usize) -> i64 {
        store
            .domain(self.proc[e])
            .iter()
            .flat_map(|p| {
                let p = p as usize;
                store
                    .domain(self.proc_mode[p])
                    .iter()
                    .map(move |m| self.wcet.get(e, p, m as usize))
            })
            .filter(|&w| w > 0)
            .min()
            .unwrap_or(0)
    }

    /// A channel is on the interconnect once its send time cannot be
    /// zero anymore; local and undecided channels both read as off.
    pub fn on_interconnect(&self, store: &DomainStore, c: usize) -> bool {
        store.min(self.send_time[c]) > 0
    }

    /// Follows the decided send order from `c` to the next interconnect
    /// channel, skipping channels that turned out local. Wrapping through
    /// the head slot crosses into the next graph iteration, hence one
    /// token on the resulting edge. `None` while the order is still open.
    pub fn next_interconnect_send(&self, store: &DomainStore, c: usize) -> Option<(usize, i64)> {
        let n_ch = self.n_channels();
        let mut tokens = 0i64;
        let mut cur = c;
        for _ in 0..=n_ch {
            let v = store.value(self.send_next[cur])? as usize;
            let nxt = if v == n_ch {
                tokens = 1;
                let head = store.value(self.send_next[n_ch])? as usize;
                if head == n_ch {
                    return None;
                }
                head
            } else {
                v
            };
            if nxt == c {
                return Some((c, tokens));
            }
            if self.on_interconnect(store, nxt) {
                return Some((nxt, tokens));
            }
            cur = nxt;
        }
        None
    }

    /// Follows the decided receive order from `c` to the next interconnect
    /// channel of the same destination. `None` once the chain ends (the
    /// destination firing itself comes next) or while it is open.
    pub fn next_receive(&self, store: &DomainStore, c: usize) -> Option<usize> {
        let n_ch = self.n_channels();
        let mut cur = c;
        for _ in 0..n_ch {
            let v = store.value(self.rec_next[cur])? as usize;
            if v >= n_ch || self.ch_dst[v] != self.ch_dst[c] {
                return None;
            }
            if self.on_interconnect(store, v) {
                return Some(v);
            }
            cur = v;
        }
        None
    }

    /// True once every variable the graph is built from is assigned; the
    /// cycle ratio is then exact rather than a lower bound.
    fn decided(&self, store: &DomainStore) -> bool {
        store.all_assigned(&self.proc[..self.n_actors])
            && store.all_assigned(&self.proc_mode)
            && store.all_assigned(&self.next)
            && store.all_assigned(&self.send_next)
            && store.all_assigned(&self.rec_next)
            && store.all_assigned(&self.block_time)
            && store.all_assigned(&self.send_time)
            && store.all_assigned(&self.send_buf)
            && store.all_assigned(&self.rec_buf)
    }
}

/// Period and latency propagation through MSAG cycle-ratio analysis.
///
/// On every call the graph is rebuilt from the current domains and the
/// maximum cycle ratio of each weakly-connected component bounds the
/// period of every application inside that component from below. On a
/// complete assignment the bound is exact, so periods are assigned and
/// latencies extracted from a self-timed execution.
pub struct ThroughputPropagator {
    params: ThroughputParams,
}

impl ThroughputPropagator {
    pub fn new(params: ThroughputParams) -> Self {
        Self { params }
    }
}

impl Propagator for ThroughputPropagator {
    fn name(&self) -> &str {
        "throughput"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let p = &self.params;
        let assigned = p.proc[..p.n_actors]
            .iter()
            .chain(p.proc_mode.iter())
            .chain(p.next.iter())
            .chain(p.send_next.iter())
            .chain(p.rec_next.iter())
            .map(|&v| Subscription::new(v, EventKind::Assigned));
        let bounds = p
            .block_time
            .iter()
            .chain(p.send_time.iter())
            .chain(p.send_buf.iter())
            .chain(p.rec_buf.iter())
            .map(|&v| Subscription::new(v, EventKind::Bounds));
        assigned.chain(bounds).collect()
    }

    fn outputs(&self) -> Vec<VarId> {
        self.params
            .period
            .iter()
            .chain(self.params.latency.iter())
            .copied()
            .collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        let p = &self.params;
        let g = build_msag(p, store);
        let complete = p.decided(store);

        for component in g.components() {
            let ratio = match maximum_cycle_ratio(&g, &component) {
                McrOutcome::Deadlock { node } => {
                    log::debug!("throughput: zero-token cycle through node {node}");
                    return Propagation::Failed(Conflict::Deadlock { node });
                }
                McrOutcome::Ratio(r) => r,
            };
            let bound = ratio.ceil();

            // the component couples the periods of every application in it
            let mut apps: Vec<usize> = component.iter().filter_map(|&v| g.nodes[v].app).collect();
            apps.sort_unstable();
            apps.dedup();
            for app in apps {
                let outcome = if complete {
                    store.assign(p.period[app], bound)
                } else {
                    store.tighten_min(p.period[app], bound)
                };
                if let Err(conflict) = outcome {
                    return Propagation::Failed(conflict);
                }
            }
        }

        if complete {
            let rounds = g.nodes.len().max(2);
            let run = match self_timed_execution(&g, rounds) {
                Ok(run) => run,
                Err(conflict) => return Propagation::Failed(conflict),
            };
            for app in 0..p.n_apps {
                if let Err(conflict) = store.assign(p.latency[app], run.latency(&g, app)) {
                    return Propagation::Failed(conflict);
                }
            }
            Propagation::Subsumed
        } else {
            Propagation::Fixpoint
        }
    }

    fn cost(&self) -> PropCost {
        PropCost::Crazy
    }

    fn boxed_clone(&self) -> Box<dyn Propagator> {
        Box::new(Self {
            params: self.params.clone(),
        })
    }
}
