//! Propagators linking the mapping to delays and platform resources.

use std::sync::Arc;

use super::system::WcetTable;
use crate::error::Conflict;
use crate::propagator::{EventKind, PropCost, Propagation, Propagator, Subscription};
use crate::store::{DomainStore, VarId};

/// Couples channel locality with the block/send delay variables.
///
/// Each delay domain starts as the two-valued set `{0, D}` where `D` is
/// the interconnect delay for the channel's token size: zero means local.
/// Deciding the endpoint processors decides the delays, and deciding a
/// delay constrains the endpoints right back (a local channel forces
/// co-mapping, an interconnect channel forbids it).
#[derive(Debug, Clone)]
pub struct ChannelDelayPropagator {
    ch_src: Vec<usize>,
    ch_dst: Vec<usize>,
    /// Processor variable per entity.
    proc: Vec<VarId>,
    block_time: Vec<VarId>,
    send_time: Vec<VarId>,
    /// Interconnect delay pair per channel.
    interconnect: Vec<(i64, i64)>,
}

impl ChannelDelayPropagator {
    pub fn new(
        ch_src: Vec<usize>,
        ch_dst: Vec<usize>,
        proc: Vec<VarId>,
        block_time: Vec<VarId>,
        send_time: Vec<VarId>,
        interconnect: Vec<(i64, i64)>,
    ) -> Self {
        Self {
            ch_src,
            ch_dst,
            proc,
            block_time,
            send_time,
            interconnect,
        }
    }

    fn prune(&self, store: &mut DomainStore) -> Result<(), Conflict> {
        for c in 0..self.ch_src.len() {
            let src = self.proc[self.ch_src[c]];
            let dst = self.proc[self.ch_dst[c]];
            let (block, send) = self.interconnect[c];

            match (store.value(src), store.value(dst)) {
                (Some(a), Some(b)) if a == b => {
                    store.assign(self.block_time[c], 0)?;
                    store.assign(self.send_time[c], 0)?;
                }
                (Some(_), Some(_)) => {
                    store.assign(self.block_time[c], block)?;
                    store.assign(self.send_time[c], send)?;
                }
                _ => {
                    // endpoints that share no processor cannot be local
                    let shared: Vec<i64> = store
                        .domain(src)
                        .iter()
                        .filter(|&p| store.domain(dst).contains(p))
                        .collect();
                    if shared.is_empty() {
                        store.tighten_min(self.block_time[c], block.min(send))?;
                        store.tighten_min(self.send_time[c], send)?;
                    }
                }
            }

            // decided delays constrain the endpoints back
            match store.value(self.send_time[c]) {
                Some(0) => {
                    let keep: Vec<i64> = store.domain(src).iter().collect();
                    store.retain(dst, |v| keep.contains(&v))?;
                    let keep: Vec<i64> = store.domain(dst).iter().collect();
                    store.retain(src, |v| keep.contains(&v))?;
                }
                Some(_) => {
                    if let Some(p) = store.value(src) {
                        store.remove(dst, p)?;
                    } else if let Some(p) = store.value(dst) {
                        store.remove(src, p)?;
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    fn decided(&self, store: &DomainStore) -> bool {
        self.ch_src
            .iter()
            .chain(self.ch_dst.iter())
            .all(|&e| store.is_assigned(self.proc[e]))
            && store.all_assigned(&self.block_time)
            && store.all_assigned(&self.send_time)
    }
}

impl Propagator for ChannelDelayPropagator {
    fn name(&self) -> &str {
        "channel_delay"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let endpoints = self
            .ch_src
            .iter()
            .chain(self.ch_dst.iter())
            .map(|&e| Subscription::new(self.proc[e], EventKind::Any));
        let delays = self
            .block_time
            .iter()
            .chain(self.send_time.iter())
            .map(|&v| Subscription::new(v, EventKind::Assigned));
        endpoints.chain(delays).collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        match self.prune(store) {
            Err(conflict) => Propagation::Failed(conflict),
            Ok(()) if self.decided(store) => Propagation::Subsumed,
            Ok(()) => Propagation::Fixpoint,
        }
    }

    fn cost(&self) -> PropCost {
        PropCost::Linear
    }

    fn boxed_clone(&self) -> Box<dyn Propagator> {
        Box::new(self.clone())
    }
}

/// Ties mode choices to the runnable entries of the WCET table.
///
/// A zero WCET entry marks a placement the entity cannot execute in.
/// Processors without any runnable mode are already filtered out of the
/// initial domains, but a processor may still carry modes in which some
/// entity mapped onto it cannot run. Assigning an entity to a processor
/// removes those modes from the processor's domain; conversely, an
/// entity loses every processor whose remaining modes all read zero.
#[derive(Debug, Clone)]
pub struct ModeFeasibilityPropagator {
    /// Processor variable per entity.
    proc: Vec<VarId>,
    proc_mode: Vec<VarId>,
    wcet: Arc<WcetTable>,
}

impl ModeFeasibilityPropagator {
    pub fn new(proc: Vec<VarId>, proc_mode: Vec<VarId>, wcet: Arc<WcetTable>) -> Self {
        Self {
            proc,
            proc_mode,
            wcet,
        }
    }

    fn prune(&self, store: &mut DomainStore) -> Result<(), Conflict> {
        for (e, &proc_var) in self.proc.iter().enumerate() {
            match store.value(proc_var) {
                Some(p) => {
                    let p = p as usize;
                    store.retain(self.proc_mode[p], |m| self.wcet.get(e, p, m as usize) > 0)?;
                }
                None => {
                    let runnable: Vec<i64> = store
                        .domain(proc_var)
                        .iter()
                        .filter(|&p| {
                            let p = p as usize;
                            store
                                .domain(self.proc_mode[p])
                                .iter()
                                .any(|m| self.wcet.get(e, p, m as usize) > 0)
                        })
                        .collect();
                    store.retain(proc_var, |p| runnable.contains(&p))?;
                }
            }
        }
        Ok(())
    }
}

impl Propagator for ModeFeasibilityPropagator {
    fn name(&self) -> &str {
        "mode_feasibility"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.proc
            .iter()
            .map(|&v| Subscription::new(v, EventKind::Assigned))
            .chain(
                self.proc_mode
                    .iter()
                    .map(|&v| Subscription::new(v, EventKind::Any)),
            )
            .collect()
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        match self.prune(store) {
            Err(conflict) => Propagation::Failed(conflict),
            Ok(()) => {
                if store.all_assigned(&self.proc) && store.all_assigned(&self.proc_mode) {
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

/// Bounds the processors-used and system-power objective variables.
///
/// A processor with an entity already assigned to it is definitely used;
/// one that no entity can still reach is definitely unused. Both counts
/// and the corresponding mode-power sums are pushed into the objective
/// variables so that branch-and-bound on power or processor count prunes
/// on partial mappings instead of only at solutions.
#[derive(Debug, Clone)]
pub struct ResourcePropagator {
    proc: Vec<VarId>,
    proc_mode: Vec<VarId>,
    /// Power per `(processor, mode)`.
    mode_power: Vec<Vec<i64>>,
    procs_used: VarId,
    sys_power: VarId,
}

impl ResourcePropagator {
    pub fn new(
        proc: Vec<VarId>,
        proc_mode: Vec<VarId>,
        mode_power: Vec<Vec<i64>>,
        procs_used: VarId,
        sys_power: VarId,
    ) -> Self {
        Self {
            proc,
            proc_mode,
            mode_power,
            procs_used,
            sys_power,
        }
    }

    fn prune(&self, store: &mut DomainStore) -> Result<(), Conflict> {
        let n_procs = self.proc_mode.len();
        let mut definite = vec![false; n_procs];
        let mut possible = vec![false; n_procs];
        for &v in &self.proc {
            if let Some(p) = store.value(v) {
                definite[p as usize] = true;
            }
            for p in store.domain(v).iter() {
                possible[p as usize] = true;
            }
        }

        let lb_used = definite.iter().filter(|&&d| d).count() as i64;
        let ub_used = possible.iter().filter(|&&d| d).count() as i64;
        store.tighten_min(self.procs_used, lb_used)?;
        store.tighten_max(self.procs_used, ub_used)?;

        let mut lb_power = 0i64;
        let mut ub_power = 0i64;
        for p in 0..n_procs {
            let powers = &self.mode_power[p];
            let dom_min = store
                .domain(self.proc_mode[p])
                .iter()
                .map(|m| powers[m as usize])
                .min()
                .unwrap_or(0);
            let dom_max = store
                .domain(self.proc_mode[p])
                .iter()
                .map(|m| powers[m as usize])
                .max()
                .unwrap_or(0);
            if definite[p] {
                lb_power += dom_min;
            }
            if possible[p] {
                ub_power += dom_max;
            }
        }
        store.tighten_min(self.sys_power, lb_power)?;
        store.tighten_max(self.sys_power, ub_power)?;

        if store.all_assigned(&self.proc) && store.all_assigned(&self.proc_mode) {
            store.assign(self.procs_used, lb_used)?;
            store.assign(self.sys_power, lb_power)?;
        }
        Ok(())
    }
}

impl Propagator for ResourcePropagator {
    fn name(&self) -> &str {
        "resource"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.proc
            .iter()
            .chain(self.proc_mode.iter())
            .map(|&v| Subscription::new(v, EventKind::Any))
            .collect()
    }

    fn outputs(&self) -> Vec<VarId> {
        vec![self.procs_used, self.sys_power]
    }

    fn propagate(&mut self, store: &mut DomainStore) -> Propagation {
        match self.prune(store) {
            Err(conflict) => Propagation::Failed(conflict),
            Ok(()) => {
                if store.all_assigned(&self.proc) && store.all_assigned(&self.proc_mode) {
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
